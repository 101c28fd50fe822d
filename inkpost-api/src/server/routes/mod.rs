use crate::server::{ServerRouter, method_not_allowed};
use axum::Router;

mod comments;
mod likes;
mod posts;
mod users;

pub fn routes() -> ServerRouter {
    Router::new()
        .merge(users::routes())
        .merge(posts::routes())
        .merge(comments::routes())
        .merge(likes::routes())
        .method_not_allowed_fallback(method_not_allowed)
}
