use crate::model::{Id, user::UserMarker};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::Error,
};
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter};
use thiserror::Error;
use time::{Duration, UtcDateTime};

pub const DEFAULT_SESSION_LIFETIME: Duration = Duration::days(90);

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: Id<UserMarker>,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Error)]
#[error("Signing session token failed: {0}")]
pub struct SessionSignError(Error);

#[derive(Debug, Error)]
#[error("Session token rejected: {0}")]
pub struct SessionVerifyError(Error);

/// Issues and verifies the stateless bearer tokens handed out on signup and login.
#[derive(Clone)]
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    lifetime: Duration,
}

impl SessionKeys {
    #[must_use]
    pub fn new(secret: &[u8], lifetime: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            lifetime,
        }
    }

    pub fn issue(&self, user_id: Id<UserMarker>) -> Result<String, SessionSignError> {
        self.issue_at(user_id, UtcDateTime::now())
    }

    pub fn issue_at(
        &self,
        user_id: Id<UserMarker>,
        now: UtcDateTime,
    ) -> Result<String, SessionSignError> {
        let claims = SessionClaims {
            sub: user_id,
            iat: now.unix_timestamp(),
            exp: (now + self.lifetime).unix_timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(SessionSignError)
    }

    /// Checks signature and expiry, returning the user the token was issued for.
    pub fn verify(&self, token: &str) -> Result<Id<UserMarker>, SessionVerifyError> {
        let data = decode::<SessionClaims>(token, &self.decoding, &self.validation)
            .map_err(SessionVerifyError)?;

        Ok(data.claims.sub)
    }
}

impl Debug for SessionKeys {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKeys")
            .field("keys", &"[redacted]")
            .field("lifetime", &self.lifetime)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use crate::model::{
        Id,
        session::{DEFAULT_SESSION_LIFETIME, SessionKeys},
        user::UserMarker,
    };
    use time::{Duration, UtcDateTime};

    fn keys() -> SessionKeys {
        SessionKeys::new(b"test-secret", DEFAULT_SESSION_LIFETIME)
    }

    #[test]
    fn issued_token_verifies_to_its_user() {
        let user_id = Id::<UserMarker>::from(42);
        let token = keys().issue(user_id).unwrap();

        assert_eq!(keys().verify(&token).unwrap(), user_id);
    }

    #[test]
    fn expired_token_is_rejected() {
        let issued_at = UtcDateTime::now() - DEFAULT_SESSION_LIFETIME - Duration::minutes(1);
        let token = keys().issue_at(Id::from(42), issued_at).unwrap();

        assert!(keys().verify(&token).is_err());
    }

    #[test]
    fn token_from_another_secret_is_rejected() {
        let other = SessionKeys::new(b"other-secret", DEFAULT_SESSION_LIFETIME);
        let token = other.issue(Id::from(42)).unwrap();

        assert!(keys().verify(&token).is_err());
        assert!(keys().verify("not.a.token").is_err());
    }
}
