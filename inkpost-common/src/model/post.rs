use crate::model::{Id, user::UserMarker};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct PostMarker;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct CommentMarker;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct LikeMarker;

/// A post document. Comments and likes live inside it.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: Id<PostMarker>,
    pub title: String,
    pub content: String,
    pub author_id: Id<UserMarker>,
    #[serde(default)]
    pub likes: Vec<Like>,
    #[serde(default)]
    pub comments: Vec<Comment>,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: Id<CommentMarker>,
    pub text: String,
    pub author_id: Id<UserMarker>,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Like {
    pub id: Id<LikeMarker>,
    pub author_id: Id<UserMarker>,
}

/// The fields a client supplies when creating a post.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
pub struct PostContent {
    pub title: String,
    pub content: String,
}

/// A partial update; absent or blank fields are left unchanged.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
pub struct PostUpdate {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The field `{0}` must not be blank")]
pub struct BlankFieldError(pub &'static str);

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Error)]
#[error("User {0} already liked this post")]
pub struct AlreadyLikedError(pub Id<UserMarker>);

fn non_blank(field: &'static str, value: String) -> Result<String, BlankFieldError> {
    if value.trim().is_empty() {
        Err(BlankFieldError(field))
    } else {
        Ok(value)
    }
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

impl PostContent {
    pub fn validate(self) -> Result<Self, BlankFieldError> {
        Ok(Self {
            title: non_blank("title", self.title)?,
            content: non_blank("content", self.content)?,
        })
    }
}

impl Post {
    /// A new post without likes or comments.
    pub fn new(
        id: Id<PostMarker>,
        author_id: Id<UserMarker>,
        content: PostContent,
    ) -> Result<Self, BlankFieldError> {
        let PostContent { title, content } = content.validate()?;

        Ok(Self {
            id,
            title,
            content,
            author_id,
            likes: Vec::new(),
            comments: Vec::new(),
        })
    }

    pub fn apply_update(&mut self, update: PostUpdate) {
        if let Some(title) = present(update.title) {
            self.title = title;
        }
        if let Some(content) = present(update.content) {
            self.content = content;
        }
    }

    pub fn add_comment(
        &mut self,
        id: Id<CommentMarker>,
        author_id: Id<UserMarker>,
        text: String,
    ) -> Result<&Comment, BlankFieldError> {
        let text = non_blank("text", text)?;
        self.comments.push(Comment {
            id,
            text,
            author_id,
        });

        Ok(&self.comments[self.comments.len() - 1])
    }

    #[must_use]
    pub fn comment_position(&self, comment_id: Id<CommentMarker>) -> Option<usize> {
        self.comments
            .iter()
            .position(|comment| comment.id == comment_id)
    }

    /// Replaces the text of a comment unless `text` is absent or blank.
    pub fn edit_comment(&mut self, position: usize, text: Option<String>) -> Option<&Comment> {
        let comment = self.comments.get_mut(position)?;
        if let Some(text) = present(text) {
            comment.text = text;
        }

        Some(comment)
    }

    pub fn remove_comment(&mut self, position: usize) -> Option<Comment> {
        (position < self.comments.len()).then(|| self.comments.remove(position))
    }

    #[must_use]
    pub fn liked_by(&self, user_id: Id<UserMarker>) -> bool {
        self.likes.iter().any(|like| like.author_id == user_id)
    }

    /// Adds a like unless `author_id` already liked this post.
    pub fn add_like(
        &mut self,
        id: Id<LikeMarker>,
        author_id: Id<UserMarker>,
    ) -> Result<Like, AlreadyLikedError> {
        if self.liked_by(author_id) {
            return Err(AlreadyLikedError(author_id));
        }

        let like = Like { id, author_id };
        self.likes.push(like);

        Ok(like)
    }

    #[must_use]
    pub fn like_position(&self, like_id: Id<LikeMarker>) -> Option<usize> {
        self.likes.iter().position(|like| like.id == like_id)
    }

    pub fn remove_like(&mut self, position: usize) -> Option<Like> {
        (position < self.likes.len()).then(|| self.likes.remove(position))
    }
}

#[cfg(test)]
mod tests {
    use crate::model::{
        Id,
        post::{AlreadyLikedError, BlankFieldError, Post, PostContent, PostUpdate},
    };

    fn post() -> Post {
        Post::new(
            Id::from(1),
            Id::from(10),
            PostContent {
                title: "T".to_owned(),
                content: "C".to_owned(),
            },
        )
        .unwrap()
    }

    #[test]
    fn new_post_is_empty() {
        let post = post();

        assert_eq!(post.author_id, Id::from(10));
        assert!(post.likes.is_empty());
        assert!(post.comments.is_empty());
    }

    #[test]
    fn blank_fields_are_rejected() {
        let blank_title = PostContent {
            title: "  ".to_owned(),
            content: "C".to_owned(),
        };

        assert_eq!(
            Post::new(Id::from(1), Id::from(10), blank_title),
            Err(BlankFieldError("title"))
        );
        assert_eq!(
            post().add_comment(Id::from(2), Id::from(10), String::new()),
            Err(BlankFieldError("text"))
        );
    }

    #[test]
    fn update_skips_absent_and_blank_fields() {
        let mut post = post();
        post.apply_update(PostUpdate {
            title: Some(String::new()),
            content: Some("new content".to_owned()),
        });

        assert_eq!(post.title, "T");
        assert_eq!(post.content, "new content");

        post.apply_update(PostUpdate::default());
        assert_eq!(post.content, "new content");
    }

    #[test]
    fn one_like_per_user() {
        let mut post = post();

        assert!(post.add_like(Id::from(100), Id::from(20)).is_ok());
        assert_eq!(
            post.add_like(Id::from(101), Id::from(20)),
            Err(AlreadyLikedError(Id::from(20)))
        );
        assert!(post.add_like(Id::from(102), Id::from(21)).is_ok());
        assert_eq!(post.likes.len(), 2);
    }

    #[test]
    fn nested_items_are_located_by_id() {
        let mut post = post();
        post.add_comment(Id::from(2), Id::from(10), "first".to_owned())
            .unwrap();
        post.add_comment(Id::from(3), Id::from(11), "second".to_owned())
            .unwrap();
        post.add_like(Id::from(4), Id::from(11)).unwrap();

        let position = post.comment_position(Id::from(3)).unwrap();
        assert_eq!(
            post.edit_comment(position, Some("edited".to_owned()))
                .map(|comment| comment.text.as_str()),
            Some("edited")
        );
        assert_eq!(post.remove_comment(position).map(|c| c.id), Some(Id::from(3)));
        assert_eq!(post.comment_position(Id::from(3)), None);

        let position = post.like_position(Id::from(4)).unwrap();
        assert!(post.remove_like(position).is_some());
        assert!(!post.liked_by(Id::from(11)));
        assert_eq!(post.remove_like(0), None);
    }

    #[test]
    fn serializes_with_camel_case_fields() {
        let json = serde_json::to_value(post()).unwrap();

        assert_eq!(json["authorId"], "10");
        assert_eq!(json["likes"], serde_json::json!([]));
    }
}
