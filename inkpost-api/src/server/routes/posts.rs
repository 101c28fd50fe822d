use crate::server::{
    Result, ServerError, ServerRouter,
    auth::AuthenticatedUser,
    json::{Data, Empty, Json, Reply},
    ownership::Owned,
};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use inkpost_common::model::{
    Id, IdGenerator,
    post::{Post, PostContent, PostMarker, PostUpdate},
};
use inkpost_db::Store;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_post(create_post)
        .typed_get(list_posts)
        .typed_get(get_post)
        .typed_put(update_post)
        .typed_delete(delete_post)
}

#[derive(Clone, Debug, Serialize)]
pub(super) struct PostsData {
    pub(super) posts: Vec<Post>,
}

#[derive(Clone, Debug, Serialize)]
struct PostData {
    post: Post,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts", rejection(ServerError))]
struct PostsPath();

async fn create_post(
    PostsPath(): PostsPath,
    State(store): State<Arc<dyn Store>>,
    State(ids): State<Arc<IdGenerator>>,
    user: AuthenticatedUser,
    Json(content): Json<PostContent>,
) -> Result<Reply<Data<PostData>>> {
    let post = Post::new(ids.next()?, user.user_id(), content)?;
    store.create_post(&post).await?;

    info!(post = %post.id, author = %post.author_id, "Post created");

    Ok(Reply::created(
        "Post created successfully.",
        Data {
            data: PostData { post },
        },
    ))
}

async fn list_posts(
    PostsPath(): PostsPath,
    State(store): State<Arc<dyn Store>>,
    _user: AuthenticatedUser,
) -> Result<Reply<Data<PostsData>>> {
    let posts = store.fetch_posts().await?;

    Ok(Reply::data("Posts fetched successfully.", PostsData { posts }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{post_id}", rejection(ServerError))]
struct PostPath {
    post_id: Id<PostMarker>,
}

async fn get_post(
    PostPath { post_id }: PostPath,
    State(store): State<Arc<dyn Store>>,
    _user: AuthenticatedUser,
) -> Result<Reply<Data<PostData>>> {
    let post = store
        .fetch_post(post_id)
        .await?
        .ok_or(ServerError::PostByIdNotFound(post_id))?;

    Ok(Reply::data("Post fetched successfully.", PostData { post }))
}

async fn update_post(
    PostPath { post_id }: PostPath,
    State(store): State<Arc<dyn Store>>,
    Owned { resource: mut post, .. }: Owned<Post>,
    Json(update): Json<PostUpdate>,
) -> Result<Reply<Data<PostData>>> {
    post.apply_update(update);

    if !store.save_post(&post).await? {
        return Err(ServerError::PostByIdNotFound(post_id));
    }

    Ok(Reply::data("Post updated successfully.", PostData { post }))
}

async fn delete_post(
    PostPath { post_id }: PostPath,
    State(store): State<Arc<dyn Store>>,
    Owned { user, .. }: Owned<Post>,
) -> Result<Reply<Empty>> {
    if !store.delete_post(post_id).await? {
        return Err(ServerError::PostByIdNotFound(post_id));
    }

    info!(post = %post_id, author = %user.user_id(), "Post deleted");

    Ok(Reply::message("Post deleted successfully."))
}
