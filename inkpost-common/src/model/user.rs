use crate::model::{Id, auth::ResetTokenHash, password::PasswordHash};
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error, Unexpected},
};
use thiserror::Error;
use time::UtcDateTime;

pub const USERNAME_MAX_LEN: usize = 50;
pub const EMAIL_MAX_LEN: usize = 254;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct UserMarker;

/// A stored account. Never serialized; [`UserProfile`] is the public view.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct User {
    pub id: Id<UserMarker>,
    pub email: Email,
    pub username: Username,
    pub password_hash: PasswordHash,
    pub password_reset: Option<PasswordReset>,
}

/// A pending password reset.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct PasswordReset {
    pub token_hash: ResetTokenHash,
    pub expires_at: UtcDateTime,
}

/// What a user sees about their own account.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Id<UserMarker>,
    pub email: Email,
    pub username: Username,
}

/// What anyone sees about a user.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: Id<UserMarker>,
    pub username: Username,
}

impl User {
    #[must_use]
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            email: self.email.clone(),
            username: self.username.clone(),
        }
    }

    #[must_use]
    pub fn public(&self) -> PublicUser {
        PublicUser {
            id: self.id,
            username: self.username.clone(),
        }
    }

    /// Whether `token_hash` matches the pending reset and it has not expired at `now`.
    #[must_use]
    pub fn reset_matches(&self, token_hash: &ResetTokenHash, now: UtcDateTime) -> bool {
        self.password_reset
            .as_ref()
            .is_some_and(|reset| &reset.token_hash == token_hash && reset.expires_at > now)
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize)]
#[serde(transparent)]
pub struct Email(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The email address is invalid: {0}")]
pub struct InvalidEmailError(String);

impl Email {
    /// Normalizes to trimmed lowercase before validating.
    pub fn new(email: &str) -> Result<Self, InvalidEmailError> {
        let email = email.trim().to_lowercase();

        let valid = email.chars().count() <= EMAIL_MAX_LEN
            && !email.chars().any(char::is_whitespace)
            && email
                .split_once('@')
                .is_some_and(|(local, domain)| {
                    !local.is_empty() && !domain.is_empty() && !domain.contains('@')
                });

        if valid {
            Ok(Self(email))
        } else {
            Err(InvalidEmailError(email))
        }
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize)]
#[serde(transparent)]
pub struct Username(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The username is invalid: {0}")]
pub struct InvalidUsernameError(String);

impl Username {
    /// Normalizes to trimmed lowercase before validating.
    pub fn new(username: &str) -> Result<Self, InvalidUsernameError> {
        let username = username.trim().to_lowercase();
        let len = username.chars().count();

        if (1..=USERNAME_MAX_LEN).contains(&len) {
            Ok(Self(username))
        } else {
            Err(InvalidUsernameError(username))
        }
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for Email {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        Email::new(&inner).map_err(|err| Error::invalid_value(Unexpected::Str(&err.0), &"Email"))
    }
}

impl<'de> Deserialize<'de> for Username {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        Username::new(&inner)
            .map_err(|err| Error::invalid_value(Unexpected::Str(&err.0), &"Username"))
    }
}

#[cfg(test)]
mod tests {
    use crate::model::user::{Email, USERNAME_MAX_LEN, Username};

    #[test]
    fn email_is_normalized() {
        assert_eq!(Email::new("  A@X.com ").unwrap().get(), "a@x.com");
    }

    #[test]
    fn malformed_emails_are_rejected() {
        for email in ["", "ax.com", "@x.com", "a@", "a@b@c", "a b@x.com"] {
            assert!(Email::new(email).is_err(), "{email:?} was accepted");
        }
    }

    #[test]
    fn username_length_is_bounded() {
        assert_eq!(Username::new(" Alice ").unwrap().get(), "alice");
        assert!(Username::new("   ").is_err());
        assert!(Username::new(&"a".repeat(USERNAME_MAX_LEN)).is_ok());
        assert!(Username::new(&"a".repeat(USERNAME_MAX_LEN + 1)).is_err());
    }

    #[test]
    fn deserialization_validates() {
        let username: Username = serde_json::from_str("\"Bob\"").unwrap();
        assert_eq!(username.get(), "bob");

        assert!(serde_json::from_str::<Email>("\"not-an-email\"").is_err());
    }
}
