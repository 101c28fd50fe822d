use inkpost_common::snowflake::{ProcessId, WorkerId};
use serde::Deserialize;
use std::{
    fmt::{Debug, Formatter},
    net::{IpAddr, Ipv4Addr, SocketAddr},
};
use time::Duration;

/// Process configuration, read from the environment (and an optional `.env` file).
#[derive(Clone, Eq, PartialEq, Debug, Deserialize)]
pub struct Env {
    #[serde(default = "default_server_address")]
    pub server_address: IpAddr,
    #[serde(default = "default_server_port")]
    pub server_port: u16,
    /// Without a database URL the server keeps everything in memory.
    #[serde(default)]
    pub database_url: Option<Secret>,
    #[serde(default = "default_database_max_connections")]
    pub database_max_connections: u32,
    pub jwt_secret: Secret,
    #[serde(default = "default_session_lifetime_days")]
    pub session_lifetime_days: u16,
    #[serde(default)]
    pub cors_allowed_origins: Vec<String>,
    #[serde(default)]
    pub worker_id: WorkerId,
    #[serde(default)]
    pub process_id: ProcessId,
}

fn default_server_address() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_server_port() -> u16 {
    5001
}

fn default_database_max_connections() -> u32 {
    5
}

fn default_session_lifetime_days() -> u16 {
    90
}

impl Env {
    #[must_use]
    pub fn socket_address(&self) -> SocketAddr {
        SocketAddr::new(self.server_address, self.server_port)
    }

    #[must_use]
    pub fn session_lifetime(&self) -> Duration {
        Duration::days(self.session_lifetime_days.into())
    }

    /// Configured origins, ignoring blank entries left by stray commas.
    pub fn cors_origins(&self) -> impl Iterator<Item = &str> {
        self.cors_allowed_origins
            .iter()
            .map(|origin| origin.trim())
            .filter(|origin| !origin.is_empty())
    }
}

/// A configuration value that must not end up in logs.
#[derive(Clone, Eq, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl Debug for Secret {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Secret").field(&"[redacted]").finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::config::Env;

    fn env(vars: &[(&str, &str)]) -> Result<Env, envy::Error> {
        envy::from_iter(
            vars.iter()
                .map(|(key, value)| ((*key).to_owned(), (*value).to_owned())),
        )
    }

    #[test]
    fn defaults_apply() {
        let env = env(&[("JWT_SECRET", "secret")]).unwrap();

        assert_eq!(env.socket_address().to_string(), "0.0.0.0:5001");
        assert_eq!(env.session_lifetime().whole_days(), 90);
        assert!(env.database_url.is_none());
        assert_eq!(env.cors_origins().count(), 0);
        assert_eq!(env.jwt_secret.expose(), "secret");
    }

    #[test]
    fn overrides_are_parsed() {
        let env = env(&[
            ("JWT_SECRET", "secret"),
            ("SERVER_PORT", "8080"),
            ("CORS_ALLOWED_ORIGINS", "http://localhost:3000,https://example.com"),
            ("WORKER_ID", "7"),
        ])
        .unwrap();

        assert_eq!(env.server_port, 8080);
        assert_eq!(
            env.cors_origins().collect::<Vec<_>>(),
            ["http://localhost:3000", "https://example.com"]
        );
        assert_eq!(env.worker_id.get(), 7);
    }

    #[test]
    fn secret_is_required_and_redacted() {
        assert!(env(&[]).is_err());

        let env = env(&[("JWT_SECRET", "hunter22")]).unwrap();
        assert!(!format!("{env:?}").contains("hunter22"));
    }

    #[test]
    fn out_of_range_worker_id_is_rejected() {
        assert!(env(&[("JWT_SECRET", "secret"), ("WORKER_ID", "32")]).is_err());
    }
}
