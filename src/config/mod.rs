//! Configuration module for graphlift.
//!
//! Handles the settings file, catalog connection configuration, and
//! environment variables.

mod connection;
mod settings;

pub use connection::{ConnectionConfig, ConnectionError, Driver};
pub use settings::{
    expand_env_vars, CatalogSettings, ExportSettings, GraphSettings, InferenceSettings, Settings,
    SettingsError,
};
