//! Shared domain types and configuration for the creatordb workspace.

pub mod accounts;
pub mod app_config;
pub mod config;
pub mod content;
pub mod envelope;
pub mod platform;

use thiserror::Error;

pub use accounts::{load_accounts, AccountConfig, AccountsFile};
pub use app_config::{AppConfig, Environment, HarvesterSettings};
pub use config::{load_app_config, load_app_config_from_env, load_harvester_settings};
pub use content::{
    AccountIdentity, ContentItem, ContentMetrics, HarvestCursor, HarvestResult, ProfileSnapshot,
};
pub use envelope::{HarvestRequest, HarvestResponse, WarningCode};
pub use platform::Platform;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("unknown platform: {0}")]
    UnknownPlatform(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read accounts file {path}: {source}")]
    AccountsFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse accounts file: {0}")]
    AccountsFileParse(#[from] serde_yaml::Error),

    #[error("accounts validation failed: {0}")]
    Validation(String),
}
