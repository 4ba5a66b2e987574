//! Store configuration
//!
//! [`StoreConfig`] selects the backend a [`CategoryRepository`] opens and
//! carries the settings of the libsql database. Values come from defaults,
//! serialized settings, or `CATALOG_*` environment variables.
//!
//! | Variable                  | Field             | Default              |
//! |---------------------------|-------------------|----------------------|
//! | `CATALOG_STORE_BACKEND`   | `backend`         | `turso`              |
//! | `CATALOG_DATABASE_PATH`   | `database_path`   | `./data/catalog.db`  |
//! | `CATALOG_BUSY_TIMEOUT_MS` | `busy_timeout_ms` | `5000`               |
//!
//! [`CategoryRepository`]: crate::services::CategoryRepository

use crate::db::DEFAULT_BUSY_TIMEOUT_MS;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

pub const ENV_STORE_BACKEND: &str = "CATALOG_STORE_BACKEND";
pub const ENV_DATABASE_PATH: &str = "CATALOG_DATABASE_PATH";
pub const ENV_BUSY_TIMEOUT_MS: &str = "CATALOG_BUSY_TIMEOUT_MS";

const DEFAULT_DATABASE_PATH: &str = "./data/catalog.db";

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Unknown store backend '{0}' (expected 'turso' or 'memory')")]
    UnknownBackend(String),

    #[error("Invalid value '{value}' for {variable}")]
    InvalidValue { variable: String, value: String },

    #[error("Database path must not be empty")]
    EmptyDatabasePath,

    #[error("Busy timeout must be greater than zero")]
    ZeroBusyTimeout,
}

/// Which `CategoryStore` implementation to open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Embedded libsql database file
    #[default]
    Turso,
    /// Process-local rows, lost on exit
    Memory,
}

impl FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "turso" | "libsql" => Ok(Self::Turso),
            "memory" => Ok(Self::Memory),
            other => Err(ConfigError::UnknownBackend(other.to_string())),
        }
    }
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Turso => write!(f, "turso"),
            Self::Memory => write!(f, "memory"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub database_path: PathBuf,
    pub busy_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}

impl StoreConfig {
    pub fn memory() -> Self {
        Self {
            backend: StoreBackend::Memory,
            ..Self::default()
        }
    }

    pub fn turso(database_path: impl Into<PathBuf>) -> Self {
        Self {
            backend: StoreBackend::Turso,
            database_path: database_path.into(),
            ..Self::default()
        }
    }

    /// Defaults overlaid with the `CATALOG_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overlaid with whatever `lookup` yields for each variable
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(backend) = lookup(ENV_STORE_BACKEND) {
            config.backend = backend.parse()?;
        }
        if let Some(path) = lookup(ENV_DATABASE_PATH) {
            tracing::info!("Using database path from {}: {}", ENV_DATABASE_PATH, path);
            config.database_path = PathBuf::from(path);
        }
        if let Some(timeout) = lookup(ENV_BUSY_TIMEOUT_MS) {
            config.busy_timeout_ms = timeout.trim().parse().map_err(|_| ConfigError::InvalidValue {
                variable: ENV_BUSY_TIMEOUT_MS.to_string(),
                value: timeout.clone(),
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the libsql backend cannot open
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backend != StoreBackend::Turso {
            return Ok(());
        }
        if self.database_path.as_os_str().is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }
        if self.busy_timeout_ms == 0 {
            return Err(ConfigError::ZeroBusyTimeout);
        }
        Ok(())
    }
}
