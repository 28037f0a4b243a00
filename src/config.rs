use std::{env, fmt::Display, str::FromStr};

use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Environment variable {0} must be set")]
    Missing(&'static str),

    #[error("Invalid {key} value {value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Postgres,
    Memory,
}

impl FromStr for StoreKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "pg" => Ok(StoreKind::Postgres),
            "memory" | "mem" => Ok(StoreKind::Memory),
            other => Err(format!("unknown store {other}, expected postgres or memory")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub store: StoreKind,
    pub database_url: Option<String>,
    pub max_connections: u32,
    /// Seeded administrator, created at startup when both are set.
    pub admin_username: Option<String>,
    pub admin_token: Option<String>,
    pub results_public: bool,
    pub cors_max_age_secs: u64,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let store: StoreKind = parse(&lookup, "STORE", "postgres")?;
        let database_url = lookup("DATABASE_URL");
        if store == StoreKind::Postgres && database_url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        let admin_username = lookup("ADMIN_USERNAME");
        let admin_token = lookup("ADMIN_TOKEN");
        if admin_username.is_some() != admin_token.is_some() {
            return Err(ConfigError::Missing(if admin_username.is_some() {
                "ADMIN_TOKEN"
            } else {
                "ADMIN_USERNAME"
            }));
        }

        Ok(Self {
            port: parse(&lookup, "PORT", "3030")?,
            store,
            database_url,
            max_connections: parse(&lookup, "DB_MAX_CONNECTIONS", "5")?,
            admin_username,
            admin_token,
            results_public: parse(&lookup, "RESULTS_PUBLIC", "false")?,
            cors_max_age_secs: parse(&lookup, "CORS_MAX_AGE_SECS", "3600")?,
        })
    }
}

fn parse<F, T>(lookup: &F, key: &'static str, default: &str) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    let value = lookup(key).unwrap_or_else(|| {
        debug!("{key} not set, using default: {default}");
        default.to_string()
    });

    value.parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        reason: e.to_string(),
        value,
    })
}

impl Config {
    pub fn log_summary(&self) {
        info!(
            port = self.port,
            store = ?self.store,
            max_connections = self.max_connections,
            results_public = self.results_public,
            bootstrap_admin = self.admin_username.is_some(),
            "configuration loaded"
        );
    }
}
