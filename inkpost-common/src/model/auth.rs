//! One-time password reset tokens.
//!
//! A token is `core:salt`, both URL-safe base64 so it can travel in a path segment. Only the
//! argon2 hash of the core under the salt is stored, so a leaked table does not reveal usable
//! tokens while the presented token still hashes to the same stored value.

use argon2::{Argon2, Params};
use base64::{DecodeError, Engine, display::Base64Display, prelude::BASE64_URL_SAFE_NO_PAD};
use std::{
    fmt::{Debug, Formatter},
    str::FromStr,
};
use thiserror::Error;
use time::{Duration, UtcDateTime};

pub const RESET_TOKEN_CORE_LEN: usize = 24;
pub const RESET_TOKEN_SALT_LEN: usize = 18;
pub const RESET_TOKEN_HASH_LEN: usize = Params::DEFAULT_OUTPUT_LEN;
pub const RESET_TOKEN_LIFETIME: Duration = Duration::minutes(10);

#[derive(Clone, Eq, PartialEq, Debug, Error)]
#[error("Hashing reset token failed: {0}")]
pub struct ResetTokenHashError(argon2::Error);

#[derive(Clone, Eq, PartialEq, Debug, Error)]
pub enum ResetTokenDecodeError {
    #[error("Not enough parts separated by ':'")]
    NotEnoughParts,
    #[error("Decoding base64 failed: {0}")]
    Decode(#[from] DecodeError),
    #[error("The length of the core part is incorrect")]
    InvalidCoreLength,
    #[error("The length of the salt part is incorrect")]
    InvalidSaltLength,
}

#[derive(Clone, Eq, PartialEq, Hash)]
pub struct ResetToken {
    pub core: [u8; RESET_TOKEN_CORE_LEN],
    pub salt: [u8; RESET_TOKEN_SALT_LEN],
}

#[derive(Clone, Eq, PartialEq, Hash)]
pub struct ResetTokenHash(pub Box<[u8; RESET_TOKEN_HASH_LEN]>);

impl ResetToken {
    #[must_use]
    pub fn generate_random() -> Self {
        Self {
            core: rand::random(),
            salt: rand::random(),
        }
    }

    #[must_use]
    pub fn as_token_str(&self) -> String {
        let encoded_core = Base64Display::new(&self.core, &BASE64_URL_SAFE_NO_PAD);
        let encoded_salt = Base64Display::new(&self.salt, &BASE64_URL_SAFE_NO_PAD);

        format!("{encoded_core}:{encoded_salt}")
    }

    pub fn hash(&self) -> Result<ResetTokenHash, ResetTokenHashError> {
        let mut hash = Box::new([0; RESET_TOKEN_HASH_LEN]);
        Argon2::default()
            .hash_password_into(&self.core, &self.salt, &mut *hash)
            .map_err(ResetTokenHashError)?;

        Ok(ResetTokenHash(hash))
    }
}

impl FromStr for ResetToken {
    type Err = ResetTokenDecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (core_part, salt_part) = s.split_once(':').ok_or(Self::Err::NotEnoughParts)?;

        let core = BASE64_URL_SAFE_NO_PAD
            .decode(core_part)?
            .try_into()
            .map_err(|_| Self::Err::InvalidCoreLength)?;
        let salt = BASE64_URL_SAFE_NO_PAD
            .decode(salt_part)?
            .try_into()
            .map_err(|_| Self::Err::InvalidSaltLength)?;

        Ok(Self { core, salt })
    }
}

impl Debug for ResetToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResetToken")
            .field("core", &"[redacted]")
            .field("salt", &"[redacted]")
            .finish()
    }
}

impl Debug for ResetTokenHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ResetTokenHash").field(&"[redacted]").finish()
    }
}

impl ResetTokenHash {
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0[..]
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The reset token hash had an invalid length")]
pub struct InvalidResetTokenHashError;

impl TryFrom<Vec<u8>> for ResetTokenHash {
    type Error = InvalidResetTokenHashError;

    fn try_from(value: Vec<u8>) -> Result<Self, Self::Error> {
        let hash: [u8; RESET_TOKEN_HASH_LEN] =
            value.try_into().map_err(|_| InvalidResetTokenHashError)?;
        Ok(Self(Box::new(hash)))
    }
}

/// When a reset requested at `now` stops being accepted.
#[must_use]
pub fn reset_expiry(now: UtcDateTime) -> UtcDateTime {
    now + RESET_TOKEN_LIFETIME
}

#[cfg(test)]
mod tests {
    use crate::model::auth::{ResetToken, ResetTokenDecodeError};
    use std::str::FromStr;

    #[test]
    fn token_string_round_trips() {
        let token = ResetToken::generate_random();
        let token_str = token.as_token_str();

        assert!(
            token_str
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':'))
        );
        assert_eq!(ResetToken::from_str(&token_str).unwrap(), token);
    }

    #[test]
    fn hash_is_deterministic_per_token() {
        let token = ResetToken::generate_random();
        let other = ResetToken::generate_random();

        assert_eq!(token.hash().unwrap(), token.hash().unwrap());
        assert_ne!(token.hash().unwrap(), other.hash().unwrap());
    }

    #[test]
    fn malformed_tokens_are_rejected() {
        assert_eq!(
            ResetToken::from_str("no-separator"),
            Err(ResetTokenDecodeError::NotEnoughParts)
        );
        assert_eq!(
            ResetToken::from_str("AAAA:AAAA"),
            Err(ResetTokenDecodeError::InvalidCoreLength)
        );
        assert!(matches!(
            ResetToken::from_str("!!!:???"),
            Err(ResetTokenDecodeError::Decode(_))
        ));
    }
}
