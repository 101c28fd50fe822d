use crate::{
    config::Env,
    server::{ServerRouter, ServerState},
};
use axum::http::{
    HeaderValue, Method,
    header::{AUTHORIZATION, CONTENT_TYPE, InvalidHeaderValue},
};
use inkpost_common::model::{IdGenerator, session::SessionKeys};
use inkpost_db::{DbError, MemoryStore, PgStore, Store};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod server;

#[derive(Debug, Error)]
enum InitError {
    #[error("Error parsing .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),
    #[error("Error parsing environment: {0}")]
    Envy(#[from] envy::Error),
    #[error("JWT_SECRET must not be empty")]
    EmptyJwtSecret,
    #[error("Error connecting to the database: {0}")]
    Database(#[from] DbError),
    #[error("Invalid CORS origin {0:?}: {1}")]
    InvalidCorsOrigin(String, InvalidHeaderValue),
    #[error("Error binding tcp listener: {0}")]
    TcpBind(std::io::Error),
    #[error("Error serving server: {0}")]
    TcpServe(std::io::Error),
}

fn install_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "inkpost_api=debug,\
                inkpost_db=debug,\
                tower_http=debug,axum::rejection=trace,sqlx=warn"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn get_env() -> Result<Env, InitError> {
    if let Err(e) = dotenvy::dotenv() {
        if e.not_found() {
            debug!("No .env file found");
        } else {
            return Err(e.into());
        }
    }

    envy::from_env().map_err(InitError::from)
}

async fn connect_store(env: &Env) -> Result<Arc<dyn Store>, InitError> {
    match &env.database_url {
        Some(url) => {
            let store = PgStore::connect(url.expose(), env.database_max_connections).await?;
            Ok(Arc::new(store))
        }
        None => {
            warn!("DATABASE_URL is not set, data is kept in memory and lost on shutdown");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

fn cors_layer(env: &Env) -> Result<CorsLayer, InitError> {
    let origins = env
        .cors_origins()
        .map(|origin| {
            HeaderValue::from_str(origin)
                .map_err(|err| InitError::InvalidCorsOrigin(origin.to_owned(), err))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]))
}

fn shutdown_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();

    let cancel = token.clone();
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(%err, "Could not listen for Ctrl-C, shutting down");
        } else {
            info!("Received Ctrl-C, shutting down");
        }
        cancel.cancel();
    });

    token
}

#[tokio::main]
async fn main() -> Result<(), InitError> {
    install_tracing();
    let env = get_env()?;

    if env.jwt_secret.expose().is_empty() {
        return Err(InitError::EmptyJwtSecret);
    }

    let state = ServerState {
        store: connect_store(&env).await?,
        sessions: Arc::new(SessionKeys::new(
            env.jwt_secret.expose().as_bytes(),
            env.session_lifetime(),
        )),
        ids: Arc::new(IdGenerator::new(env.worker_id, env.process_id)),
    };

    let app: ServerRouter = server::routes();
    let app = app
        .layer(cors_layer(&env)?)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(env.socket_address())
        .await
        .map_err(InitError::TcpBind)?;
    info!(address = %env.socket_address(), "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_on_ctrl_c().cancelled_owned())
        .await
        .map_err(InitError::TcpServe)?;

    Ok(())
}
