use crate::server::{
    Result, ServerError, ServerRouter,
    auth::AuthenticatedUser,
    json::{Data, Empty, Reply},
    ownership::{Owned, OwnedLike},
};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use inkpost_common::model::{
    Id, IdGenerator,
    post::{Like, LikeMarker, PostMarker},
};
use inkpost_db::Store;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_post(create_like)
        .typed_delete(delete_like)
}

#[derive(Clone, Debug, Serialize)]
struct LikesData {
    likes: Vec<Like>,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{post_id}/likes", rejection(ServerError))]
struct LikesPath {
    post_id: Id<PostMarker>,
}

async fn create_like(
    LikesPath { post_id }: LikesPath,
    State(store): State<Arc<dyn Store>>,
    State(ids): State<Arc<IdGenerator>>,
    user: AuthenticatedUser,
) -> Result<Reply<Data<LikesData>>> {
    let mut post = store
        .fetch_post(post_id)
        .await?
        .ok_or(ServerError::PostByIdNotFound(post_id))?;

    let like = post.add_like(ids.next()?, user.user_id())?;

    if !store.save_post(&post).await? {
        return Err(ServerError::PostByIdNotFound(post_id));
    }

    debug!(post = %post_id, like = %like.id, "Post liked");

    Ok(Reply::created(
        "Like created successfully.",
        Data {
            data: LikesData { likes: post.likes },
        },
    ))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{post_id}/likes/{like_id}", rejection(ServerError))]
struct LikePath {
    post_id: Id<PostMarker>,
    like_id: Id<LikeMarker>,
}

async fn delete_like(
    LikePath { post_id, like_id }: LikePath,
    State(store): State<Arc<dyn Store>>,
    Owned {
        resource: OwnedLike { mut post, position },
        ..
    }: Owned<OwnedLike>,
) -> Result<Reply<Empty>> {
    post.remove_like(position)
        .ok_or(ServerError::LikeByIdNotFound(like_id))?;

    if !store.save_post(&post).await? {
        return Err(ServerError::PostByIdNotFound(post_id));
    }

    Ok(Reply::message("Like deleted successfully."))
}
