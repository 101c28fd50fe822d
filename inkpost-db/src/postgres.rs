use crate::{
    client::{DbError, Result, Store},
    record::{PostRecord, UserRecord, to_offset},
};
use async_trait::async_trait;
use inkpost_common::model::{
    Id,
    auth::ResetTokenHash,
    password::PasswordHash,
    post::{Post, PostMarker},
    user::{Email, PasswordReset, User, UserMarker, Username},
};
use sqlx::{PgPool, postgres::PgPoolOptions, query, query_as, query_scalar, types::Json};
use time::UtcDateTime;
use tracing::info;

const USER_COLUMNS: &str = "
    users.user_snowflake,
    users.email,
    users.username,
    users.password_hash,
    users.password_reset_token_hash,
    users.password_reset_expires_at
";

const POST_COLUMNS: &str = "
    posts.post_snowflake,
    posts.user_snowflake,
    posts.title,
    posts.content,
    posts.likes,
    posts.comments
";

/// [`Store`] backed by Postgres. Posts are single rows with their comments and likes held in
/// `JSONB` columns.
#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

fn map_write_error(err: sqlx::Error) -> DbError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => DbError::Conflict,
        sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
            DbError::MissingReference
        }
        _ => DbError::Sqlx(err),
    }
}

fn snowflake<Marker>(id: Id<Marker>) -> i64 {
    id.snowflake().get().cast_signed()
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects to `database_url` and brings the schema up to date.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("Database migrations applied");

        Ok(Self::new(pool))
    }

    async fn fetch_user_where(&self, condition: &str, value: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users.users WHERE {condition} = $1");
        let record = query_as::<_, UserRecord>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;

        let user = record.map(User::try_from).transpose()?;
        Ok(user)
    }
}

#[async_trait]
impl Store for PgStore {
    async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users.users WHERE users.user_snowflake = $1");
        let record = query_as::<_, UserRecord>(&sql)
            .bind(snowflake(user_id))
            .fetch_optional(&self.pool)
            .await?;

        let user = record.map(User::try_from).transpose()?;
        Ok(user)
    }

    async fn fetch_user_by_username(&self, username: &Username) -> Result<Option<User>> {
        self.fetch_user_where("users.username", username.get()).await
    }

    async fn fetch_user_by_email(&self, email: &Email) -> Result<Option<User>> {
        self.fetch_user_where("users.email", email.get()).await
    }

    async fn user_exists(&self, email: &Email, username: &Username) -> Result<bool> {
        let exists = query_scalar::<_, bool>(
            "
            SELECT EXISTS (
                SELECT 1 FROM users.users
                WHERE users.email = $1 OR users.username = $2
            )
            ",
        )
        .bind(email.get())
        .bind(username.get())
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn create_user(&self, user: &User) -> Result<()> {
        let (token_hash, expires_at) = match &user.password_reset {
            Some(reset) => (
                Some(reset.token_hash.as_bytes()),
                Some(to_offset(reset.expires_at)?),
            ),
            None => (None, None),
        };

        query(
            "
            INSERT INTO users.users (
                user_snowflake,
                email,
                username,
                password_hash,
                password_reset_token_hash,
                password_reset_expires_at
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(snowflake(user.id))
        .bind(user.email.get())
        .bind(user.username.get())
        .bind(user.password_hash.as_phc())
        .bind(token_hash)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;

        Ok(())
    }

    async fn set_password_reset(
        &self,
        user_id: Id<UserMarker>,
        reset: &PasswordReset,
    ) -> Result<bool> {
        let result = query(
            "
            UPDATE users.users
            SET password_reset_token_hash = $2, password_reset_expires_at = $3
            WHERE users.user_snowflake = $1
            ",
        )
        .bind(snowflake(user_id))
        .bind(reset.token_hash.as_bytes())
        .bind(to_offset(reset.expires_at)?)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn reset_password(
        &self,
        token_hash: &ResetTokenHash,
        now: UtcDateTime,
        password_hash: &PasswordHash,
    ) -> Result<Option<User>> {
        let sql = format!(
            "
            UPDATE users.users
            SET
                password_hash = $3,
                password_reset_token_hash = NULL,
                password_reset_expires_at = NULL
            WHERE
                users.password_reset_token_hash = $1
                AND users.password_reset_expires_at > $2
            RETURNING {USER_COLUMNS}
            "
        );
        let record = query_as::<_, UserRecord>(&sql)
            .bind(token_hash.as_bytes())
            .bind(to_offset(now)?)
            .bind(password_hash.as_phc())
            .fetch_optional(&self.pool)
            .await?;

        let user = record.map(User::try_from).transpose()?;
        Ok(user)
    }

    async fn update_password(
        &self,
        user_id: Id<UserMarker>,
        password_hash: &PasswordHash,
    ) -> Result<bool> {
        let result = query(
            "
            UPDATE users.users
            SET
                password_hash = $2,
                password_reset_token_hash = NULL,
                password_reset_expires_at = NULL
            WHERE users.user_snowflake = $1
            ",
        )
        .bind(snowflake(user_id))
        .bind(password_hash.as_phc())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn fetch_posts(&self) -> Result<Vec<Post>> {
        let sql = format!("SELECT {POST_COLUMNS} FROM posts.posts ORDER BY posts.post_snowflake");
        let records = query_as::<_, PostRecord>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(records.into_iter().map(Post::from).collect())
    }

    async fn fetch_user_posts(&self, user_id: Id<UserMarker>) -> Result<Option<Vec<Post>>> {
        if self.fetch_user(user_id).await?.is_none() {
            return Ok(None);
        }

        let sql = format!(
            "
            SELECT {POST_COLUMNS}
            FROM posts.posts
            WHERE posts.user_snowflake = $1
            ORDER BY posts.post_snowflake
            "
        );
        let records = query_as::<_, PostRecord>(&sql)
            .bind(snowflake(user_id))
            .fetch_all(&self.pool)
            .await?;

        Ok(Some(records.into_iter().map(Post::from).collect()))
    }

    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        let sql = format!("SELECT {POST_COLUMNS} FROM posts.posts WHERE posts.post_snowflake = $1");
        let record = query_as::<_, PostRecord>(&sql)
            .bind(snowflake(post_id))
            .fetch_optional(&self.pool)
            .await?;

        Ok(record.map(Post::from))
    }

    async fn create_post(&self, post: &Post) -> Result<()> {
        query(
            "
            INSERT INTO posts.posts (post_snowflake, user_snowflake, title, content, likes, comments)
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(snowflake(post.id))
        .bind(snowflake(post.author_id))
        .bind(&post.title)
        .bind(&post.content)
        .bind(Json(&post.likes))
        .bind(Json(&post.comments))
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;

        Ok(())
    }

    async fn save_post(&self, post: &Post) -> Result<bool> {
        let result = query(
            "
            UPDATE posts.posts
            SET title = $2, content = $3, likes = $4, comments = $5
            WHERE posts.post_snowflake = $1
            ",
        )
        .bind(snowflake(post.id))
        .bind(&post.title)
        .bind(&post.content)
        .bind(Json(&post.likes))
        .bind(Json(&post.comments))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_post(&self, post_id: Id<PostMarker>) -> Result<bool> {
        let result = query("DELETE FROM posts.posts WHERE posts.post_snowflake = $1")
            .bind(snowflake(post_id))
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
