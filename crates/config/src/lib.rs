//! Configuration for the call agent
//!
//! Layered settings: defaults, optional config files, environment overrides.

mod settings;

pub use settings::{
    load_settings, AudioConfig, BargeInConfig, ConsentConfig, InferenceTimeouts, RoutingConfig,
    ServerConfig, SessionLimits, Settings, StorageConfig, TenantDefaults, TriageConfig,
    WebhookConfig,
};

use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config load error: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}
