use crate::server::{
    Result, ServerError, ServerRouter,
    auth::AuthenticatedUser,
    json::{Data, Empty, Json, Reply},
    ownership::{Owned, OwnedComment},
};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use inkpost_common::model::{
    Id, IdGenerator,
    post::{Comment, CommentMarker, PostMarker},
};
use inkpost_db::Store;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_post(create_comment)
        .typed_put(update_comment)
        .typed_delete(delete_comment)
}

#[derive(Clone, Debug, Serialize)]
struct CommentData {
    comment: Comment,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{post_id}/comment", rejection(ServerError))]
struct CommentsPath {
    post_id: Id<PostMarker>,
}

#[derive(Debug, Deserialize)]
struct NewComment {
    text: String,
}

async fn create_comment(
    CommentsPath { post_id }: CommentsPath,
    State(store): State<Arc<dyn Store>>,
    State(ids): State<Arc<IdGenerator>>,
    user: AuthenticatedUser,
    Json(NewComment { text }): Json<NewComment>,
) -> Result<Reply<Data<CommentData>>> {
    let mut post = store
        .fetch_post(post_id)
        .await?
        .ok_or(ServerError::PostByIdNotFound(post_id))?;

    let comment = post
        .add_comment(ids.next()?, user.user_id(), text)?
        .clone();

    if !store.save_post(&post).await? {
        return Err(ServerError::PostByIdNotFound(post_id));
    }

    Ok(Reply::created(
        "Comment created successfully.",
        Data {
            data: CommentData { comment },
        },
    ))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{post_id}/comment/{comment_id}", rejection(ServerError))]
struct CommentPath {
    post_id: Id<PostMarker>,
    comment_id: Id<CommentMarker>,
}

#[derive(Debug, Deserialize)]
struct CommentUpdate {
    #[serde(default)]
    text: Option<String>,
}

async fn update_comment(
    CommentPath {
        post_id,
        comment_id,
    }: CommentPath,
    State(store): State<Arc<dyn Store>>,
    Owned {
        resource: OwnedComment { mut post, position },
        ..
    }: Owned<OwnedComment>,
    Json(CommentUpdate { text }): Json<CommentUpdate>,
) -> Result<Reply<Data<CommentData>>> {
    let comment = post
        .edit_comment(position, text)
        .cloned()
        .ok_or(ServerError::CommentByIdNotFound(comment_id))?;

    if !store.save_post(&post).await? {
        return Err(ServerError::PostByIdNotFound(post_id));
    }

    Ok(Reply::data(
        "Comment updated successfully.",
        CommentData { comment },
    ))
}

async fn delete_comment(
    CommentPath {
        post_id,
        comment_id,
    }: CommentPath,
    State(store): State<Arc<dyn Store>>,
    Owned {
        resource: OwnedComment { mut post, position },
        ..
    }: Owned<OwnedComment>,
) -> Result<Reply<Empty>> {
    post.remove_comment(position)
        .ok_or(ServerError::CommentByIdNotFound(comment_id))?;

    if !store.save_post(&post).await? {
        return Err(ServerError::PostByIdNotFound(post_id));
    }

    Ok(Reply::message("Comment deleted successfully."))
}
