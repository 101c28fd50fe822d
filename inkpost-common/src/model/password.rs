use argon2::{
    Argon2,
    password_hash::{self, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use serde::{
    Deserialize, Deserializer,
    de::{Error, Unexpected},
};
use std::fmt::{Debug, Formatter};
use thiserror::Error;

pub const PASSWORD_MIN_LEN: usize = 8;

/// A plaintext password as submitted for signup or a password change.
#[derive(Clone, Eq, PartialEq)]
pub struct Password(String);

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("Passwords must be at least 8 characters long")]
pub struct InvalidPasswordError;

impl Password {
    pub fn new(password: String) -> Result<Self, InvalidPasswordError> {
        if password.chars().count() >= PASSWORD_MIN_LEN {
            Ok(Self(password))
        } else {
            Err(InvalidPasswordError)
        }
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }
}

impl Debug for Password {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Password").field(&"[redacted]").finish()
    }
}

impl<'de> Deserialize<'de> for Password {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        Password::new(inner).map_err(|_| {
            Error::invalid_value(
                Unexpected::Other("a short password"),
                &"a password of at least 8 characters",
            )
        })
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Error)]
#[error("Hashing password failed: {0}")]
pub struct PasswordHashError(password_hash::Error);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The stored password hash is not a valid PHC string")]
pub struct InvalidPasswordHashError;

/// An argon2 hash in PHC string format, salt and parameters included.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct PasswordHash(String);

impl PasswordHash {
    pub fn generate(password: &Password) -> Result<Self, PasswordHashError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.get().as_bytes(), &salt)
            .map_err(PasswordHashError)?;

        Ok(Self(hash.to_string()))
    }

    /// Wraps a hash loaded from storage.
    pub fn from_phc(phc: String) -> Result<Self, InvalidPasswordHashError> {
        password_hash::PasswordHash::new(&phc).map_err(|_| InvalidPasswordHashError)?;
        Ok(Self(phc))
    }

    /// Whether `candidate` is the password this hash was generated from.
    #[must_use]
    pub fn verify(&self, candidate: &str) -> bool {
        password_hash::PasswordHash::new(&self.0).is_ok_and(|hash| {
            Argon2::default()
                .verify_password(candidate.as_bytes(), &hash)
                .is_ok()
        })
    }

    #[must_use]
    pub fn as_phc(&self) -> &str {
        &self.0
    }
}

impl Debug for PasswordHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PasswordHash").field(&"[redacted]").finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::model::password::{Password, PasswordHash};

    #[test]
    fn short_passwords_are_rejected() {
        assert!(Password::new("seven77".to_owned()).is_err());
        assert!(Password::new("eight888".to_owned()).is_ok());
        assert!(serde_json::from_str::<Password>("\"short\"").is_err());
    }

    #[test]
    fn hash_verifies_only_the_original_password() {
        let password = Password::new("password1".to_owned()).unwrap();
        let hash = PasswordHash::generate(&password).unwrap();

        assert!(hash.verify("password1"));
        assert!(!hash.verify("password2"));
        assert!(!hash.as_phc().contains("password1"));
    }

    #[test]
    fn stored_hash_round_trips_through_phc() {
        let password = Password::new("correct horse".to_owned()).unwrap();
        let hash = PasswordHash::generate(&password).unwrap();

        let loaded = PasswordHash::from_phc(hash.as_phc().to_owned()).unwrap();
        assert!(loaded.verify("correct horse"));
        assert!(PasswordHash::from_phc(String::new()).is_err());
    }

    #[test]
    fn debug_output_is_redacted() {
        let password = Password::new("password1".to_owned()).unwrap();
        assert!(!format!("{password:?}").contains("password1"));
    }
}
