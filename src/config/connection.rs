//! Catalog connection configuration.
//!
//! Supports configuration via environment variables:
//! - `GRAPHLIFT_DB_DRIVER`: Catalog driver (sqlite; default sqlite)
//! - `GRAPHLIFT_DB_PATH`: Database file path
//! - `DATABASE_URL`: Used when `GRAPHLIFT_DB_PATH` is unset (`sqlite://` prefix allowed)

use std::env;
use std::path::PathBuf;

use crate::metadata::{CatalogResult, SqliteCatalog};

/// Error type for connection configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Unsupported driver: {0}. Supported: sqlite")]
    UnsupportedDriver(String),
}

/// Supported catalog drivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Driver {
    /// SQLite database file
    Sqlite,
}

impl Driver {
    /// Parse driver from string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, ConnectionError> {
        match s.to_lowercase().as_str() {
            "sqlite" | "sqlite3" => Ok(Driver::Sqlite),
            other => Err(ConnectionError::UnsupportedDriver(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Driver::Sqlite => "sqlite",
        }
    }
}

/// Catalog connection configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub driver: Driver,
    /// Database file.
    pub path: PathBuf,
}

impl ConnectionConfig {
    pub fn sqlite(path: impl Into<PathBuf>) -> Self {
        Self {
            driver: Driver::Sqlite,
            path: path.into(),
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConnectionError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through a variable lookup function.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConnectionError> {
        let driver = match lookup("GRAPHLIFT_DB_DRIVER") {
            Some(d) => Driver::from_str(&d)?,
            None => Driver::Sqlite,
        };

        let path = lookup("GRAPHLIFT_DB_PATH")
            .or_else(|| lookup("DATABASE_URL").map(|url| strip_scheme(&url).to_string()))
            .filter(|p| !p.is_empty())
            .ok_or_else(|| ConnectionError::MissingEnvVar("GRAPHLIFT_DB_PATH".to_string()))?;

        Ok(Self {
            driver,
            path: PathBuf::from(path),
        })
    }

    /// Open the catalog read-only.
    pub async fn open(&self) -> CatalogResult<SqliteCatalog> {
        match self.driver {
            Driver::Sqlite => SqliteCatalog::open(&self.path).await,
        }
    }
}

fn strip_scheme(url: &str) -> &str {
    url.strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
        .unwrap_or(url)
}
