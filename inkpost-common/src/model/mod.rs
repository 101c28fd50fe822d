pub mod auth;
pub mod password;
pub mod post;
pub mod session;
pub mod user;

use crate::{
    model::{
        auth::InvalidResetTokenHashError,
        password::InvalidPasswordHashError,
        post::BlankFieldError,
        user::{InvalidEmailError, InvalidUsernameError},
    },
    snowflake::{Epoch, ProcessId, Snowflake, SnowflakeGenerator, SnowflakeTimeError, WorkerId},
};
use derive_where::derive_where;
use serde::{
    Deserialize, Deserializer, Serialize, Serializer,
    de::{Error, Unexpected, Visitor},
};
use std::{
    fmt::{Display, Formatter},
    marker::PhantomData,
    sync::{Mutex, PoisonError},
};
use thiserror::Error;
use time::{UtcDateTime, macros::utc_datetime};

#[derive(Clone, Eq, PartialEq, Debug, Hash, Error)]
pub enum ModelValidationError {
    #[error(transparent)]
    Email(#[from] InvalidEmailError),
    #[error(transparent)]
    Username(#[from] InvalidUsernameError),
    #[error(transparent)]
    PasswordHash(#[from] InvalidPasswordHashError),
    #[error(transparent)]
    ResetTokenHash(#[from] InvalidResetTokenHashError),
    #[error(transparent)]
    BlankField(#[from] BlankFieldError),
    #[error("Stored timestamp was out of range: {0}")]
    Timestamp(String),
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct InkpostEpoch;
impl Epoch for InkpostEpoch {
    const EPOCH_TIME: UtcDateTime = utc_datetime!(2025-01-01 00:00);
}

pub type InkpostSnowflake = Snowflake<InkpostEpoch>;
pub type InkpostSnowflakeGenerator = SnowflakeGenerator<InkpostEpoch>;

/// A typed document id. On the wire it is a decimal string, as snowflakes exceed the integer
/// range that JSON clients represent exactly; integers are still accepted when reading.
#[derive_where(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct Id<Marker>(InkpostSnowflake, PhantomData<Marker>);

impl<Marker> Id<Marker> {
    #[must_use]
    pub fn new(snowflake: InkpostSnowflake) -> Self {
        Self(snowflake, PhantomData)
    }

    #[must_use]
    pub fn snowflake(self) -> InkpostSnowflake {
        self.0
    }
}

impl<Marker> Display for Id<Marker> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl<Marker> Serialize for Id<Marker> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(&self.0)
    }
}

struct IdVisitor<Marker>(PhantomData<Marker>);

impl<Marker> Visitor<'_> for IdVisitor<Marker> {
    type Value = Id<Marker>;

    fn expecting(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("a snowflake id as a decimal string or integer")
    }

    fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
    where
        E: Error,
    {
        Ok(Id::from(value))
    }

    fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
    where
        E: Error,
    {
        u64::try_from(value)
            .map(Id::from)
            .map_err(|_| E::invalid_value(Unexpected::Signed(value), &self))
    }

    fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
    where
        E: Error,
    {
        value
            .parse::<u64>()
            .map(Id::from)
            .map_err(|_| E::invalid_value(Unexpected::Str(value), &self))
    }
}

impl<'de, Marker> Deserialize<'de> for Id<Marker> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(IdVisitor(PhantomData))
    }
}

impl<Marker> From<InkpostSnowflake> for Id<Marker> {
    fn from(value: InkpostSnowflake) -> Self {
        Self::new(value)
    }
}

impl<Marker> From<u64> for Id<Marker> {
    fn from(value: u64) -> Self {
        Id::new(InkpostSnowflake::new(value))
    }
}

impl<Marker> From<Id<Marker>> for u64 {
    fn from(value: Id<Marker>) -> Self {
        value.snowflake().get()
    }
}

/// Hands out ids for every kind of document, shared by all requests of a process.
#[derive(Debug)]
pub struct IdGenerator {
    generator: Mutex<InkpostSnowflakeGenerator>,
}

impl IdGenerator {
    #[must_use]
    pub fn new(worker_id: WorkerId, process_id: ProcessId) -> Self {
        Self {
            generator: Mutex::new(InkpostSnowflakeGenerator::new(worker_id, process_id)),
        }
    }

    pub fn next<Marker>(&self) -> Result<Id<Marker>, SnowflakeTimeError> {
        // The generator state is a plain counter, so a poisoned lock is still usable.
        let mut generator = self.generator.lock().unwrap_or_else(PoisonError::into_inner);
        generator.generate().map(Id::new)
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        model::{Id, IdGenerator, post::PostMarker, user::UserMarker},
        snowflake::{ProcessId, WorkerId},
    };

    #[test]
    fn ids_are_unique_across_markers() {
        let ids = IdGenerator::new(WorkerId::new(3).unwrap(), ProcessId::new(1).unwrap());

        let user = ids.next::<UserMarker>().unwrap();
        let post = ids.next::<PostMarker>().unwrap();

        assert_ne!(u64::from(user), u64::from(post));
        assert_eq!(user.snowflake().worker_id().get(), 3);
        assert_eq!(post.snowflake().process_id().get(), 1);
    }

    #[test]
    fn ids_travel_as_strings() {
        let id = Id::<PostMarker>::from(3_416_751_341_570_822_244);

        assert_eq!(
            serde_json::to_value(id).unwrap(),
            serde_json::json!("3416751341570822244")
        );
        assert_eq!(
            serde_json::from_str::<Id<PostMarker>>("\"3416751341570822244\"").unwrap(),
            id
        );
        assert_eq!(
            serde_json::from_str::<Id<PostMarker>>("3416751341570822244").unwrap(),
            id
        );
        assert!(serde_json::from_str::<Id<PostMarker>>("\"12a\"").is_err());
        assert!(serde_json::from_str::<Id<PostMarker>>("-1").is_err());
    }

    #[test]
    fn ids_parse_from_their_display_form() {
        let id = Id::<PostMarker>::from(3_416_751_341_570_822_244);
        let parsed: u64 = id.to_string().parse().unwrap();

        assert_eq!(Id::<PostMarker>::from(parsed), id);
    }
}
