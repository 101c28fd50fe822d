use crate::client::{DbError, Result, Store};
use async_trait::async_trait;
use inkpost_common::model::{
    Id,
    auth::ResetTokenHash,
    password::PasswordHash,
    post::{Post, PostMarker},
    user::{Email, PasswordReset, User, UserMarker, Username},
};
use std::{
    collections::BTreeMap,
    sync::{Mutex, MutexGuard, PoisonError},
};
use time::UtcDateTime;

#[derive(Debug, Default)]
struct Documents {
    users: BTreeMap<Id<UserMarker>, User>,
    posts: BTreeMap<Id<PostMarker>, Post>,
}

/// [`Store`] that keeps every document in process memory. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: Mutex<Documents>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn documents(&self) -> MutexGuard<'_, Documents> {
        // Every write leaves the maps consistent, so a poisoned lock is still usable.
        self.documents.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Documents {
    fn find_user(&self, predicate: impl Fn(&User) -> bool) -> Option<User> {
        self.users.values().find(|user| predicate(user)).cloned()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>> {
        Ok(self.documents().users.get(&user_id).cloned())
    }

    async fn fetch_user_by_username(&self, username: &Username) -> Result<Option<User>> {
        Ok(self.documents().find_user(|user| &user.username == username))
    }

    async fn fetch_user_by_email(&self, email: &Email) -> Result<Option<User>> {
        Ok(self.documents().find_user(|user| &user.email == email))
    }

    async fn user_exists(&self, email: &Email, username: &Username) -> Result<bool> {
        Ok(self
            .documents()
            .find_user(|user| &user.email == email || &user.username == username)
            .is_some())
    }

    async fn create_user(&self, user: &User) -> Result<()> {
        let mut documents = self.documents();

        let taken = documents.users.values().any(|existing| {
            existing.id == user.id
                || existing.email == user.email
                || existing.username == user.username
        });
        if taken {
            return Err(DbError::Conflict);
        }

        documents.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn set_password_reset(
        &self,
        user_id: Id<UserMarker>,
        reset: &PasswordReset,
    ) -> Result<bool> {
        let mut documents = self.documents();
        let Some(user) = documents.users.get_mut(&user_id) else {
            return Ok(false);
        };

        user.password_reset = Some(reset.clone());
        Ok(true)
    }

    async fn reset_password(
        &self,
        token_hash: &ResetTokenHash,
        now: UtcDateTime,
        password_hash: &PasswordHash,
    ) -> Result<Option<User>> {
        let mut documents = self.documents();
        let Some(user) = documents
            .users
            .values_mut()
            .find(|user| user.reset_matches(token_hash, now))
        else {
            return Ok(None);
        };

        user.password_hash = password_hash.clone();
        user.password_reset = None;
        Ok(Some(user.clone()))
    }

    async fn update_password(
        &self,
        user_id: Id<UserMarker>,
        password_hash: &PasswordHash,
    ) -> Result<bool> {
        let mut documents = self.documents();
        let Some(user) = documents.users.get_mut(&user_id) else {
            return Ok(false);
        };

        user.password_hash = password_hash.clone();
        user.password_reset = None;
        Ok(true)
    }

    async fn fetch_posts(&self) -> Result<Vec<Post>> {
        Ok(self.documents().posts.values().cloned().collect())
    }

    async fn fetch_user_posts(&self, user_id: Id<UserMarker>) -> Result<Option<Vec<Post>>> {
        let documents = self.documents();
        if !documents.users.contains_key(&user_id) {
            return Ok(None);
        }

        let posts = documents
            .posts
            .values()
            .filter(|post| post.author_id == user_id)
            .cloned()
            .collect();
        Ok(Some(posts))
    }

    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        Ok(self.documents().posts.get(&post_id).cloned())
    }

    async fn create_post(&self, post: &Post) -> Result<()> {
        let mut documents = self.documents();
        if !documents.users.contains_key(&post.author_id) {
            return Err(DbError::MissingReference);
        }
        if documents.posts.contains_key(&post.id) {
            return Err(DbError::Conflict);
        }

        documents.posts.insert(post.id, post.clone());
        Ok(())
    }

    async fn save_post(&self, post: &Post) -> Result<bool> {
        let mut documents = self.documents();
        let Some(stored) = documents.posts.get_mut(&post.id) else {
            return Ok(false);
        };

        *stored = post.clone();
        Ok(true)
    }

    async fn delete_post(&self, post_id: Id<PostMarker>) -> Result<bool> {
        Ok(self.documents().posts.remove(&post_id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        client::{DbError, Store},
        memory::MemoryStore,
    };
    use inkpost_common::model::{
        Id,
        auth::{ResetToken, reset_expiry},
        password::{Password, PasswordHash},
        post::{Post, PostContent},
        user::{Email, PasswordReset, User, Username},
    };
    use time::{Duration, UtcDateTime};

    fn user(id: u64, email: &str, username: &str) -> User {
        let password = Password::new("password1".to_owned()).unwrap();

        User {
            id: Id::from(id),
            email: Email::new(email).unwrap(),
            username: Username::new(username).unwrap(),
            password_hash: PasswordHash::generate(&password).unwrap(),
            password_reset: None,
        }
    }

    fn post(id: u64, author: u64) -> Post {
        let content = PostContent {
            title: "T".to_owned(),
            content: "C".to_owned(),
        };
        Post::new(Id::from(id), Id::from(author), content).unwrap()
    }

    #[tokio::test]
    async fn duplicate_email_or_username_conflicts() {
        let store = MemoryStore::new();
        store.create_user(&user(1, "a@x.com", "a")).await.unwrap();

        let same_email = store.create_user(&user(2, "a@x.com", "b")).await;
        let same_username = store.create_user(&user(3, "b@x.com", "a")).await;

        assert!(matches!(same_email, Err(DbError::Conflict)));
        assert!(matches!(same_username, Err(DbError::Conflict)));
        assert!(store.fetch_user(Id::from(2)).await.unwrap().is_none());
        assert!(store.fetch_user(Id::from(3)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn users_are_found_by_email_and_username() {
        let store = MemoryStore::new();
        store.create_user(&user(1, "a@x.com", "a")).await.unwrap();

        let by_email = store
            .fetch_user_by_email(&Email::new("A@x.com").unwrap())
            .await
            .unwrap();
        let by_username = store
            .fetch_user_by_username(&Username::new("a").unwrap())
            .await
            .unwrap();

        assert_eq!(by_email.map(|user| user.id), Some(Id::from(1)));
        assert_eq!(by_username.map(|user| user.id), Some(Id::from(1)));
        assert!(
            store
                .user_exists(
                    &Email::new("other@x.com").unwrap(),
                    &Username::new("a").unwrap()
                )
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn reset_is_single_use_and_expires() {
        let store = MemoryStore::new();
        store.create_user(&user(1, "a@x.com", "a")).await.unwrap();

        let now = UtcDateTime::now();
        let token_hash = ResetToken::generate_random().hash().unwrap();
        let reset = PasswordReset {
            token_hash: token_hash.clone(),
            expires_at: reset_expiry(now),
        };
        assert!(store.set_password_reset(Id::from(1), &reset).await.unwrap());

        let new_password = Password::new("password2".to_owned()).unwrap();
        let new_hash = PasswordHash::generate(&new_password).unwrap();

        let expired = store
            .reset_password(&token_hash, now + Duration::minutes(11), &new_hash)
            .await
            .unwrap();
        assert!(expired.is_none());

        let reset_user = store
            .reset_password(&token_hash, now, &new_hash)
            .await
            .unwrap()
            .unwrap();
        assert!(reset_user.password_hash.verify("password2"));
        assert!(reset_user.password_reset.is_none());

        let reused = store
            .reset_password(&token_hash, now, &new_hash)
            .await
            .unwrap();
        assert!(reused.is_none());
    }

    #[tokio::test]
    async fn posts_need_an_existing_author() {
        let store = MemoryStore::new();

        let orphan = store.create_post(&post(10, 1)).await;
        assert!(matches!(orphan, Err(DbError::MissingReference)));

        store.create_user(&user(1, "a@x.com", "a")).await.unwrap();
        store.create_post(&post(10, 1)).await.unwrap();
        assert_eq!(store.fetch_posts().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn saved_post_replaces_document() {
        let store = MemoryStore::new();
        store.create_user(&user(1, "a@x.com", "a")).await.unwrap();
        store.create_post(&post(10, 1)).await.unwrap();

        let mut post = store.fetch_post(Id::from(10)).await.unwrap().unwrap();
        post.add_like(Id::from(11), Id::from(1)).unwrap();
        assert!(store.save_post(&post).await.unwrap());

        let stored = store.fetch_post(Id::from(10)).await.unwrap().unwrap();
        assert_eq!(stored.likes.len(), 1);

        assert!(store.delete_post(Id::from(10)).await.unwrap());
        assert!(!store.save_post(&post).await.unwrap());
        assert!(!store.delete_post(Id::from(10)).await.unwrap());
    }

    #[tokio::test]
    async fn user_posts_require_the_user() {
        let store = MemoryStore::new();
        assert!(store.fetch_user_posts(Id::from(1)).await.unwrap().is_none());

        store.create_user(&user(1, "a@x.com", "a")).await.unwrap();
        store.create_user(&user(2, "b@x.com", "b")).await.unwrap();
        store.create_post(&post(10, 1)).await.unwrap();
        store.create_post(&post(11, 2)).await.unwrap();

        let posts = store.fetch_user_posts(Id::from(1)).await.unwrap().unwrap();
        assert_eq!(posts.iter().map(|post| post.id).collect::<Vec<_>>(), [Id::from(10)]);
    }
}
