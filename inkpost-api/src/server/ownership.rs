//! Ownership checks for mutating routes.
//!
//! A route that changes a post, comment or like extracts [`Owned<R>`]. The extractor
//! authenticates the caller, loads the resource named by the path and only succeeds if the
//! caller authored it. Each resource kind just says how to load itself and who its author is.

use crate::server::{Result, ServerError, auth::AuthenticatedUser};
use axum::extract::{FromRef, FromRequestParts, Path};
use axum::http::request::Parts;
use inkpost_common::model::{
    Id,
    post::{Comment, CommentMarker, Like, LikeMarker, Post, PostMarker},
    session::SessionKeys,
    user::UserMarker,
};
use inkpost_db::Store;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::warn;

pub trait OwnedResource: Sized + Send {
    /// The path parameters naming the resource.
    type Key: DeserializeOwned + Send;

    /// Loads the resource, failing with a not-found error if any part of it is missing.
    fn load(store: &dyn Store, key: Self::Key) -> impl Future<Output = Result<Self>> + Send;

    fn author_id(&self) -> Id<UserMarker>;
}

/// A resource the authenticated caller is allowed to mutate.
#[derive(Clone, Debug)]
pub struct Owned<R> {
    pub resource: R,
    pub user: AuthenticatedUser,
}

impl<S, R> FromRequestParts<S> for Owned<R>
where
    R: OwnedResource,
    Arc<dyn Store>: FromRef<S>,
    Arc<SessionKeys>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthenticatedUser::from_request_parts(parts, state).await?;
        let Path(key) = Path::<R::Key>::from_request_parts(parts, state).await?;

        let store = Arc::<dyn Store>::from_ref(state);
        let resource = R::load(store.as_ref(), key).await?;

        if resource.author_id() != user.user_id() {
            warn!(
                user = %user.user_id(),
                author = %resource.author_id(),
                "Rejected mutation by non-author"
            );
            return Err(ServerError::Forbidden);
        }

        Ok(Self { resource, user })
    }
}

async fn load_post(store: &dyn Store, post_id: Id<PostMarker>) -> Result<Post> {
    store
        .fetch_post(post_id)
        .await?
        .ok_or(ServerError::PostByIdNotFound(post_id))
}

impl OwnedResource for Post {
    type Key = Id<PostMarker>;

    async fn load(store: &dyn Store, post_id: Self::Key) -> Result<Self> {
        load_post(store, post_id).await
    }

    fn author_id(&self) -> Id<UserMarker> {
        self.author_id
    }
}

/// A comment together with the post document holding it.
#[derive(Clone, Debug)]
pub struct OwnedComment {
    pub post: Post,
    pub position: usize,
}

impl OwnedComment {
    pub fn comment(&self) -> &Comment {
        &self.post.comments[self.position]
    }
}

impl OwnedResource for OwnedComment {
    type Key = (Id<PostMarker>, Id<CommentMarker>);

    async fn load(store: &dyn Store, (post_id, comment_id): Self::Key) -> Result<Self> {
        let post = load_post(store, post_id).await?;
        let position = post
            .comment_position(comment_id)
            .ok_or(ServerError::CommentByIdNotFound(comment_id))?;

        Ok(Self { post, position })
    }

    fn author_id(&self) -> Id<UserMarker> {
        self.comment().author_id
    }
}

/// A like together with the post document holding it.
#[derive(Clone, Debug)]
pub struct OwnedLike {
    pub post: Post,
    pub position: usize,
}

impl OwnedLike {
    pub fn like(&self) -> &Like {
        &self.post.likes[self.position]
    }
}

impl OwnedResource for OwnedLike {
    type Key = (Id<PostMarker>, Id<LikeMarker>);

    async fn load(store: &dyn Store, (post_id, like_id): Self::Key) -> Result<Self> {
        let post = load_post(store, post_id).await?;
        let position = post
            .like_position(like_id)
            .ok_or(ServerError::LikeByIdNotFound(like_id))?;

        Ok(Self { post, position })
    }

    fn author_id(&self) -> Id<UserMarker> {
        self.like().author_id
    }
}
