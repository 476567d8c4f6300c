use std::path::PathBuf;
use thiserror::Error;

use crate::error::ControllerError;

/// Errors raised while loading and validating retry settings
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Configuration file not found at path: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("JSON schema validation failed: {0}")]
    SchemaValidationError(String),

    /// Passed the schema but cannot build a controller.
    #[error(transparent)]
    Invalid(#[from] ControllerError),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::LoadError(err.to_string())
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}
