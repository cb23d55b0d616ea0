//! TOML-based configuration for graphlift.
//!
//! Supports a config file (graphlift.toml) with environment variable expansion.
//!
//! Example configuration:
//! ```toml
//! [catalog]
//! driver = "sqlite"
//! path = "${SHOP_DB}"
//!
//! [export]
//! output_dir = "./export"
//! sample_rows = 2
//! schema_file = "schema_output.json"
//!
//! [inference]
//! enabled = true
//! overlap_threshold = 0.8
//! excluded_patterns = ["price", "amount", "status"]
//!
//! [graph]
//! secondary_key = "nodeId"
//! snapshot = "./graph.json"
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use super::connection::{ConnectionConfig, ConnectionError, Driver};
use crate::inference::InferenceConfig;
use crate::introspect::IntrospectOptions;
use crate::materialize::{MaterializeOptions, DEFAULT_SECONDARY_KEY};

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Unsupported driver: {0}")]
    UnsupportedDriver(String),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub catalog: CatalogSettings,
    pub export: ExportSettings,
    pub inference: InferenceSettings,
    pub graph: GraphSettings,
}

/// Relational catalog to read from.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CatalogSettings {
    /// Catalog driver (sqlite).
    pub driver: String,

    /// Database path (supports ${ENV_VAR} expansion). Falls back to
    /// `GRAPHLIFT_DB_PATH` / `DATABASE_URL` when unset.
    pub path: Option<String>,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            driver: "sqlite".to_string(),
            path: None,
        }
    }
}

impl CatalogSettings {
    /// Get the driver type.
    pub fn driver_type(&self) -> Result<Driver, SettingsError> {
        Driver::from_str(&self.driver)
            .map_err(|_| SettingsError::UnsupportedDriver(self.driver.clone()))
    }

    /// Resolve the connection, preferring the configured path over the
    /// environment.
    pub fn connection(&self) -> Result<ConnectionConfig, SettingsError> {
        match &self.path {
            Some(path) => Ok(ConnectionConfig {
                driver: self.driver_type()?,
                path: PathBuf::from(expand_env_vars(path)?),
            }),
            None => Ok(ConnectionConfig::from_env()?),
        }
    }
}

/// Flat-file export.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExportSettings {
    /// Directory for table and relationship flat files.
    pub output_dir: String,

    /// Random rows kept per table in the schema extract.
    pub sample_rows: usize,

    /// Schema extract file name (relative to the working directory).
    pub schema_file: String,

    /// Tables exported concurrently.
    pub workers: usize,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            output_dir: ".".to_string(),
            sample_rows: 2,
            schema_file: "schema_output.json".to_string(),
            workers: 4,
        }
    }
}

impl ExportSettings {
    pub fn introspect_options(&self) -> IntrospectOptions {
        IntrospectOptions {
            sample_rows: self.sample_rows,
            workers: self.workers,
        }
    }
}

/// Relationship inference.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct InferenceSettings {
    /// Enable relationship inference.
    pub enabled: bool,

    /// Thresholds and denylists.
    #[serde(flatten)]
    pub engine: InferenceConfig,
}

impl Default for InferenceSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            engine: InferenceConfig::default(),
        }
    }
}

impl InferenceSettings {
    /// Check value ranges.
    pub fn validate(&self) -> Result<(), SettingsError> {
        let t = self.engine.overlap_threshold;
        if !(0.0..=1.0).contains(&t) {
            return Err(SettingsError::InvalidConfig(format!(
                "inference.overlap_threshold must be between 0 and 1, got {t}"
            )));
        }
        if self.engine.sample_cap == 0 {
            return Err(SettingsError::InvalidConfig(
                "inference.sample_cap must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Graph materialization.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GraphSettings {
    /// Fallback key property for edge resolution. Empty disables fallback.
    pub secondary_key: String,

    /// Remove all nodes and edges before loading.
    pub clear_before_load: bool,

    /// Node classes / edge types loaded concurrently.
    pub workers: usize,

    /// Graph snapshot file (supports ${ENV_VAR} expansion).
    pub snapshot: String,
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            secondary_key: DEFAULT_SECONDARY_KEY.to_string(),
            clear_before_load: false,
            workers: 4,
            snapshot: "graph.json".to_string(),
        }
    }
}

impl GraphSettings {
    pub fn materialize_options(&self) -> MaterializeOptions {
        MaterializeOptions {
            secondary_key: Some(self.secondary_key.clone()).filter(|k| !k.is_empty()),
            clear_before_load: self.clear_before_load,
            workers: self.workers,
        }
    }

    /// Snapshot path with environment variables expanded.
    pub fn snapshot_path(&self) -> Result<PathBuf, SettingsError> {
        Ok(PathBuf::from(expand_env_vars(&self.snapshot)?))
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&content)?;
        settings.inference.validate()?;
        Ok(settings)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `GRAPHLIFT_CONFIG`
    /// 2. `./graphlift.toml`
    /// 3. `~/.config/graphlift/config.toml`
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var("GRAPHLIFT_CONFIG") {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from("graphlift.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("graphlift").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        Ok(Settings::default())
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }

        let var_name = if chars.peek() == Some(&'{') {
            chars.next();
            let mut name = String::new();
            for ch in chars.by_ref() {
                if ch == '}' {
                    break;
                }
                name.push(ch);
            }
            name
        } else {
            let mut name = String::new();
            while let Some(ch) = chars.next_if(|ch| ch.is_alphanumeric() || *ch == '_') {
                name.push(ch);
            }
            if name.is_empty() {
                // A lone `$` is kept.
                result.push('$');
                continue;
            }
            name
        };

        let value = env::var(&var_name).map_err(|_| SettingsError::MissingEnvVar(var_name))?;
        result.push_str(&value);
    }

    Ok(result)
}
