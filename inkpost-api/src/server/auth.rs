use crate::server::ServerError;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use inkpost_common::model::{
    Id,
    session::SessionKeys,
    user::{User, UserMarker},
};
use inkpost_db::Store;
use std::sync::Arc;
use tracing::debug;

type AuthorizationHeader = TypedHeader<Authorization<Bearer>>;

/// The caller, as proven by a valid bearer session token whose user still exists.
#[derive(Clone, Debug)]
pub struct AuthenticatedUser {
    user: User,
}

impl AuthenticatedUser {
    #[must_use]
    pub fn user_id(&self) -> Id<UserMarker> {
        self.user.id
    }

    #[must_use]
    pub fn user(&self) -> &User {
        &self.user
    }
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    Arc<dyn Store>: FromRef<S>,
    Arc<SessionKeys>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            AuthorizationHeader::from_request_parts(parts, state)
                .await
                .map_err(ServerError::InvalidAuthorizationHeader)?;

        let user_id = Arc::<SessionKeys>::from_ref(state).verify(bearer.token())?;

        let user = Arc::<dyn Store>::from_ref(state)
            .fetch_user(user_id)
            .await?
            .ok_or(ServerError::TokenUserGone(user_id))?;

        debug!(user = %user.id, "Authenticated request");

        Ok(Self { user })
    }
}
