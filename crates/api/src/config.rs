//! Process configuration read once from the environment.

use std::net::SocketAddr;

use thiserror::Error;
use tracing::warn;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
const INSECURE_DEV_SECRET: &str = "INSECURE";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid {key}: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("WARDEN_ADMIN_EMAIL and WARDEN_ADMIN_PASSWORD must be set together")]
    PartialAdminSeed,
}

/// Credentials of the account that is guaranteed to hold the admin role.
#[derive(Clone, PartialEq, Eq)]
pub struct AdminSeed {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for AdminSeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminSeed")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    /// Postgres when set, in-memory store otherwise.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub admin: Option<AdminSeed>,
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("bind_addr", &self.bind_addr)
            .field("database", &self.database_url.as_ref().map(|_| "postgres"))
            .field("db_max_connections", &self.db_max_connections)
            .field("admin", &self.admin)
            .finish_non_exhaustive()
    }
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind_addr = get("WARDEN_BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::Invalid {
                key: "WARDEN_BIND_ADDR",
                reason: e.to_string(),
            })?;

        let jwt_secret = get("JWT_SECRET").unwrap_or_else(|| {
            warn!("JWT_SECRET not set; using insecure dev default");
            INSECURE_DEV_SECRET.to_string()
        });

        let db_max_connections = match get("WARDEN_DB_MAX_CONNECTIONS") {
            Some(raw) => raw
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| ConfigError::Invalid {
                    key: "WARDEN_DB_MAX_CONNECTIONS",
                    reason: format!("expected a positive integer, got '{raw}'"),
                })?,
            None => DEFAULT_DB_MAX_CONNECTIONS,
        };

        let admin = match (get("WARDEN_ADMIN_EMAIL"), get("WARDEN_ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(AdminSeed { email, password }),
            (None, None) => None,
            _ => return Err(ConfigError::PartialAdminSeed),
        };

        Ok(Self {
            bind_addr,
            jwt_secret,
            database_url: get("DATABASE_URL"),
            db_max_connections,
            admin,
        })
    }

    /// In-memory configuration bound to an ephemeral local port.
    pub fn for_tests(jwt_secret: impl Into<String>) -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            jwt_secret: jwt_secret.into(),
            database_url: None,
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            admin: None,
        }
    }

    pub fn with_admin(mut self, email: impl Into<String>, password: impl Into<String>) -> Self {
        self.admin = Some(AdminSeed {
            email: email.into(),
            password: password.into(),
        });
        self
    }
}
