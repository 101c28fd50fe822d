use axum::{
    Router,
    extract::{
        FromRef, Request,
        rejection::{JsonRejection, PathRejection},
    },
    http::{Method, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use axum_extra::typed_header::TypedHeaderRejection;
use inkpost_common::{
    model::{
        Id, IdGenerator,
        auth::{ResetTokenDecodeError, ResetTokenHashError},
        password::PasswordHashError,
        post::{AlreadyLikedError, BlankFieldError, CommentMarker, LikeMarker, PostMarker},
        session::{SessionKeys, SessionSignError, SessionVerifyError},
        user::UserMarker,
    },
    snowflake::SnowflakeTimeError,
};
use inkpost_db::{DbError, Store};
use json::Json;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, warn};

mod auth;
mod json;
mod ownership;
mod routes;

pub type ServerRouter = Router<ServerState>;

#[derive(Clone, Debug, FromRef)]
pub struct ServerState {
    pub store: Arc<dyn Store>,
    pub sessions: Arc<SessionKeys>,
    pub ids: Arc<IdGenerator>,
}

pub fn routes() -> ServerRouter {
    Router::new()
        .nest("/api/v1", routes::routes())
        .fallback(fallback)
}

pub async fn fallback(request: Request) -> ServerError {
    ServerError::UnknownRoute(request.into_parts().0.uri)
}

pub async fn method_not_allowed(request: Request) -> ServerError {
    let (parts, _) = request.into_parts();
    ServerError::MethodNotAllowed(parts.method, parts.uri)
}

pub type Result<T, E = ServerError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Unknown route requested: {0}")]
    UnknownRoute(Uri),
    #[error("Method {0} is not allowed on {1}")]
    MethodNotAllowed(Method, Uri),
    #[error("Path rejected: {0}")]
    PathRejection(#[from] PathRejection),
    #[error("Incoming JSON rejected: {0}")]
    JsonRejection(#[from] JsonRejection),
    #[error("JSON response could not be serialized: {0}")]
    JsonResponse(#[from] serde_json::Error),
    #[error("You are not logged in! Please log in to get access.")]
    InvalidAuthorizationHeader(TypedHeaderRejection),
    #[error("Invalid session token: {0}")]
    InvalidToken(#[from] SessionVerifyError),
    #[error("The user belonging to this token does not exist.")]
    TokenUserGone(Id<UserMarker>),
    #[error("Incorrect username or password")]
    IncorrectCredentials,
    #[error("Incorrect current password")]
    IncorrectPassword,
    #[error("You do not have permission to perform this action.")]
    Forbidden,
    #[error("Email or username already exists")]
    EmailOrUsernameTaken,
    #[error("You have already liked this post.")]
    AlreadyLiked(#[from] AlreadyLikedError),
    #[error(transparent)]
    BlankField(#[from] BlankFieldError),
    #[error("There is no user with that email address.")]
    NoUserWithEmail,
    #[error("Token is invalid or has expired.")]
    InvalidResetToken,
    #[error("There is no user with id {0}.")]
    UserByIdNotFound(Id<UserMarker>),
    #[error("There is no post with id {0}.")]
    PostByIdNotFound(Id<PostMarker>),
    #[error("There is no comment with id {0}.")]
    CommentByIdNotFound(Id<CommentMarker>),
    #[error("There is no like with id {0}.")]
    LikeByIdNotFound(Id<LikeMarker>),
    #[error(transparent)]
    Database(#[from] DbError),
    #[error(transparent)]
    PasswordHash(#[from] PasswordHashError),
    #[error(transparent)]
    ResetTokenHash(#[from] ResetTokenHashError),
    #[error(transparent)]
    SessionSign(#[from] SessionSignError),
    #[error("Could not generate an id: {0}")]
    IdGeneration(#[from] SnowflakeTimeError),
}

impl From<ResetTokenDecodeError> for ServerError {
    fn from(_: ResetTokenDecodeError) -> Self {
        Self::InvalidResetToken
    }
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::UnknownRoute(_)
            | ServerError::PathRejection(_)
            | ServerError::NoUserWithEmail
            | ServerError::UserByIdNotFound(_)
            | ServerError::PostByIdNotFound(_)
            | ServerError::CommentByIdNotFound(_)
            | ServerError::LikeByIdNotFound(_) => StatusCode::NOT_FOUND,
            ServerError::InvalidAuthorizationHeader(_)
            | ServerError::InvalidToken(_)
            | ServerError::TokenUserGone(_)
            | ServerError::IncorrectCredentials
            | ServerError::IncorrectPassword => StatusCode::UNAUTHORIZED,
            ServerError::MethodNotAllowed(..) => StatusCode::METHOD_NOT_ALLOWED,
            ServerError::Forbidden => StatusCode::FORBIDDEN,
            ServerError::EmailOrUsernameTaken
            | ServerError::AlreadyLiked(_)
            | ServerError::Database(DbError::Conflict) => StatusCode::CONFLICT,
            ServerError::JsonRejection(_)
            | ServerError::BlankField(_)
            | ServerError::InvalidResetToken => StatusCode::BAD_REQUEST,
            ServerError::JsonResponse(_)
            | ServerError::Database(_)
            | ServerError::PasswordHash(_)
            | ServerError::ResetTokenHash(_)
            | ServerError::SessionSign(_)
            | ServerError::IdGeneration(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// What the client gets to read. Internal failures are not described.
    fn public_message(&self) -> String {
        match self {
            ServerError::InvalidToken(_) => "Invalid token.".to_owned(),
            ServerError::Database(DbError::Conflict) => {
                ServerError::EmailOrUsernameTaken.to_string()
            }
            _ if self.status().is_server_error() => "Internal server error".to_owned(),
            _ => self.to_string(),
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
struct ErrorResponse {
    status: &'static str,
    message: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            error!(error = %self, %status, "Replying with error");
        } else {
            warn!(error = %self, %status, "Rejecting request");
        }

        let error_response = ErrorResponse {
            status: if status.is_server_error() {
                "error"
            } else {
                "fail"
            },
            message: self.public_message(),
        };
        (status, Json(error_response)).into_response()
    }
}
