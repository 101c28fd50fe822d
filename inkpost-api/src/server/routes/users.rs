use super::posts::PostsData;
use crate::server::{
    Result, ServerError, ServerRouter,
    auth::AuthenticatedUser,
    json::{Data, Empty, Json, Reply},
};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use inkpost_common::model::{
    Id, IdGenerator,
    auth::{ResetToken, reset_expiry},
    password::{Password, PasswordHash},
    session::SessionKeys,
    user::{Email, PasswordReset, PublicUser, User, UserMarker, UserProfile, Username},
};
use inkpost_db::{DbError, Store};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use time::UtcDateTime;
use tracing::info;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_post(signup)
        .typed_post(login)
        .typed_post(forget_password)
        .typed_post(reset_password)
        .typed_post(update_password)
        .typed_get(get_user)
        .typed_get(get_user_posts)
}

#[derive(Clone, Debug, Serialize)]
struct Session<T> {
    token: String,
    #[serde(flatten)]
    body: T,
}

#[derive(Clone, Debug, Serialize)]
struct UserField<U> {
    user: U,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/signup", rejection(ServerError))]
struct SignupPath();

#[derive(Debug, Deserialize)]
struct SignupRequest {
    email: Email,
    username: Username,
    password: Password,
}

async fn signup(
    SignupPath(): SignupPath,
    State(store): State<Arc<dyn Store>>,
    State(sessions): State<Arc<SessionKeys>>,
    State(ids): State<Arc<IdGenerator>>,
    Json(request): Json<SignupRequest>,
) -> Result<Reply<Session<Data<UserField<UserProfile>>>>> {
    if store
        .user_exists(&request.email, &request.username)
        .await?
    {
        return Err(ServerError::EmailOrUsernameTaken);
    }

    let user = User {
        id: ids.next()?,
        email: request.email,
        username: request.username,
        password_hash: PasswordHash::generate(&request.password)?,
        password_reset: None,
    };

    // The existence check above races with concurrent signups; the store has the final say.
    store.create_user(&user).await.map_err(|err| match err {
        DbError::Conflict => ServerError::EmailOrUsernameTaken,
        err => err.into(),
    })?;

    let token = sessions.issue(user.id)?;
    info!(user = %user.id, username = user.username.get(), "User signed up");

    Ok(Reply::created(
        "User registered successfully",
        Session {
            token,
            body: Data {
                data: UserField {
                    user: user.profile(),
                },
            },
        },
    ))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/login", rejection(ServerError))]
struct LoginPath();

#[derive(Debug, Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

async fn login(
    LoginPath(): LoginPath,
    State(store): State<Arc<dyn Store>>,
    State(sessions): State<Arc<SessionKeys>>,
    Json(request): Json<LoginRequest>,
) -> Result<Reply<Session<Empty>>> {
    let user = match Username::new(&request.username) {
        Ok(username) => store.fetch_user_by_username(&username).await?,
        Err(_) => None,
    };

    let user = user
        .filter(|user| user.password_hash.verify(&request.password))
        .ok_or(ServerError::IncorrectCredentials)?;

    let token = sessions.issue(user.id)?;
    info!(user = %user.id, "User logged in");

    Ok(Reply::ok(
        "Logged in successfully",
        Session {
            token,
            body: Empty {},
        },
    ))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/forgetPassword", rejection(ServerError))]
struct ForgetPasswordPath();

#[derive(Debug, Deserialize)]
struct ForgetPasswordRequest {
    email: String,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ResetTokenBody {
    reset_token: String,
}

async fn forget_password(
    ForgetPasswordPath(): ForgetPasswordPath,
    State(store): State<Arc<dyn Store>>,
    Json(request): Json<ForgetPasswordRequest>,
) -> Result<Reply<ResetTokenBody>> {
    let user = match Email::new(&request.email) {
        Ok(email) => store.fetch_user_by_email(&email).await?,
        Err(_) => None,
    }
    .ok_or(ServerError::NoUserWithEmail)?;

    let token = ResetToken::generate_random();
    let reset = PasswordReset {
        token_hash: token.hash()?,
        expires_at: reset_expiry(UtcDateTime::now()),
    };

    if !store.set_password_reset(user.id, &reset).await? {
        return Err(ServerError::NoUserWithEmail);
    }

    info!(user = %user.id, "Password reset requested");

    // The token goes back in the response until there is a mail transport to deliver it.
    Ok(Reply::ok(
        "Reset token sent to email.",
        ResetTokenBody {
            reset_token: token.as_token_str(),
        },
    ))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/resetPassword/{token}", rejection(ServerError))]
struct ResetPasswordPath {
    token: String,
}

#[derive(Debug, Deserialize)]
struct NewPasswordRequest {
    password: Password,
}

async fn reset_password(
    ResetPasswordPath { token }: ResetPasswordPath,
    State(store): State<Arc<dyn Store>>,
    Json(request): Json<NewPasswordRequest>,
) -> Result<Reply<Empty>> {
    let token_hash = token.parse::<ResetToken>()?.hash()?;
    let password_hash = PasswordHash::generate(&request.password)?;

    let user = store
        .reset_password(&token_hash, UtcDateTime::now(), &password_hash)
        .await?
        .ok_or(ServerError::InvalidResetToken)?;

    info!(user = %user.id, "Password reset");

    Ok(Reply::message("Password reset successful."))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/updatePassword", rejection(ServerError))]
struct UpdatePasswordPath();

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdatePasswordRequest {
    current_password: String,
    password: Password,
}

async fn update_password(
    UpdatePasswordPath(): UpdatePasswordPath,
    State(store): State<Arc<dyn Store>>,
    State(sessions): State<Arc<SessionKeys>>,
    user: AuthenticatedUser,
    Json(request): Json<UpdatePasswordRequest>,
) -> Result<Reply<Session<Empty>>> {
    if !user
        .user()
        .password_hash
        .verify(&request.current_password)
    {
        return Err(ServerError::IncorrectPassword);
    }

    let password_hash = PasswordHash::generate(&request.password)?;
    if !store
        .update_password(user.user_id(), &password_hash)
        .await?
    {
        return Err(ServerError::TokenUserGone(user.user_id()));
    }

    let token = sessions.issue(user.user_id())?;
    info!(user = %user.user_id(), "Password updated");

    Ok(Reply::ok(
        "Password updated successfully.",
        Session {
            token,
            body: Empty {},
        },
    ))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/{id}", rejection(ServerError))]
struct GetUserPath {
    id: Id<UserMarker>,
}

async fn get_user(
    GetUserPath { id }: GetUserPath,
    State(store): State<Arc<dyn Store>>,
) -> Result<Reply<Data<UserField<PublicUser>>>> {
    let user = store
        .fetch_user(id)
        .await?
        .ok_or(ServerError::UserByIdNotFound(id))?;

    Ok(Reply::data(
        "User fetched successfully.",
        UserField {
            user: user.public(),
        },
    ))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/{id}/posts", rejection(ServerError))]
struct GetUserPostsPath {
    id: Id<UserMarker>,
}

async fn get_user_posts(
    GetUserPostsPath { id }: GetUserPostsPath,
    State(store): State<Arc<dyn Store>>,
) -> Result<Reply<Data<PostsData>>> {
    let posts = store
        .fetch_user_posts(id)
        .await?
        .ok_or(ServerError::UserByIdNotFound(id))?;

    Ok(Reply::data("Posts fetched successfully.", PostsData { posts }))
}
