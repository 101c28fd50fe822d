use async_trait::async_trait;
use inkpost_common::model::{
    Id, ModelValidationError,
    auth::ResetTokenHash,
    password::PasswordHash,
    post::{Post, PostMarker},
    user::{Email, PasswordReset, User, UserMarker, Username},
};
use std::fmt::Debug;
use thiserror::Error;
use time::UtcDateTime;

pub type Result<T, E = DbError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("An object in the database was invalid: {0}")]
    Data(#[from] ModelValidationError),
    #[error("A unique field is already taken")]
    Conflict,
    #[error("A referenced document does not exist")]
    MissingReference,
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error("Running migrations failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

/// The document store behind the API: one user collection and one post collection, with
/// comments and likes embedded in their post.
#[async_trait]
pub trait Store: Send + Sync + Debug {
    async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>>;

    async fn fetch_user_by_username(&self, username: &Username) -> Result<Option<User>>;

    async fn fetch_user_by_email(&self, email: &Email) -> Result<Option<User>>;

    /// Whether some user already has `email` or `username`.
    async fn user_exists(&self, email: &Email, username: &Username) -> Result<bool>;

    /// Fails with [`DbError::Conflict`] if the email or username is taken.
    async fn create_user(&self, user: &User) -> Result<()>;

    /// Returns `false` if the user does not exist.
    async fn set_password_reset(
        &self,
        user_id: Id<UserMarker>,
        reset: &PasswordReset,
    ) -> Result<bool>;

    /// Atomically finds the user whose pending reset matches `token_hash` and has not expired
    /// at `now`, stores `password_hash` and clears the reset.
    async fn reset_password(
        &self,
        token_hash: &ResetTokenHash,
        now: UtcDateTime,
        password_hash: &PasswordHash,
    ) -> Result<Option<User>>;

    /// Stores `password_hash` and clears any pending reset. Returns `false` if the user does
    /// not exist.
    async fn update_password(
        &self,
        user_id: Id<UserMarker>,
        password_hash: &PasswordHash,
    ) -> Result<bool>;

    /// All posts, oldest first.
    async fn fetch_posts(&self) -> Result<Vec<Post>>;

    /// `None` if the user does not exist.
    async fn fetch_user_posts(&self, user_id: Id<UserMarker>) -> Result<Option<Vec<Post>>>;

    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>>;

    /// Fails with [`DbError::MissingReference`] if the author does not exist.
    async fn create_post(&self, post: &Post) -> Result<()>;

    /// Replaces the stored document. Returns `false` if the post no longer exists.
    async fn save_post(&self, post: &Post) -> Result<bool>;

    async fn delete_post(&self, post_id: Id<PostMarker>) -> Result<bool>;
}
