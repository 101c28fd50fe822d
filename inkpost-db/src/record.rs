use inkpost_common::model::{
    ModelValidationError,
    password::PasswordHash,
    post::{Comment, Like, Post},
    user::{Email, PasswordReset, User, Username},
};
use sqlx::{FromRow, types::Json};
use time::{OffsetDateTime, UtcDateTime};

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct UserRecord {
    pub user_snowflake: i64,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub password_reset_token_hash: Option<Vec<u8>>,
    pub password_reset_expires_at: Option<OffsetDateTime>,
}

#[derive(Clone, Eq, PartialEq, Debug, FromRow)]
pub(crate) struct PostRecord {
    pub post_snowflake: i64,
    pub user_snowflake: i64,
    pub title: String,
    pub content: String,
    pub likes: Json<Vec<Like>>,
    pub comments: Json<Vec<Comment>>,
}

pub(crate) fn to_offset(time: UtcDateTime) -> Result<OffsetDateTime, ModelValidationError> {
    OffsetDateTime::from_unix_timestamp_nanos(time.unix_timestamp_nanos())
        .map_err(|err| ModelValidationError::Timestamp(err.to_string()))
}

pub(crate) fn to_utc(time: OffsetDateTime) -> Result<UtcDateTime, ModelValidationError> {
    UtcDateTime::from_unix_timestamp_nanos(time.unix_timestamp_nanos())
        .map_err(|err| ModelValidationError::Timestamp(err.to_string()))
}

impl TryFrom<UserRecord> for User {
    type Error = ModelValidationError;

    fn try_from(value: UserRecord) -> Result<Self, Self::Error> {
        let password_reset = match (
            value.password_reset_token_hash,
            value.password_reset_expires_at,
        ) {
            (Some(token_hash), Some(expires_at)) => Some(PasswordReset {
                token_hash: token_hash.try_into()?,
                expires_at: to_utc(expires_at)?,
            }),
            _ => None,
        };

        Ok(Self {
            id: value.user_snowflake.cast_unsigned().into(),
            email: Email::new(&value.email)?,
            username: Username::new(&value.username)?,
            password_hash: PasswordHash::from_phc(value.password_hash)?,
            password_reset,
        })
    }
}

impl From<PostRecord> for Post {
    fn from(value: PostRecord) -> Self {
        Self {
            id: value.post_snowflake.cast_unsigned().into(),
            title: value.title,
            content: value.content,
            author_id: value.user_snowflake.cast_unsigned().into(),
            likes: value.likes.0,
            comments: value.comments.0,
        }
    }
}
