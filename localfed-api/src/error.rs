//! Error types for the federation API

use std::path::PathBuf;
use thiserror::Error;

/// Errors from loading or validating a [`FederationConfig`](crate::FederationConfig)
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("Invalid config value for {key}: {message}")]
    InvalidValue { key: &'static str, message: String },
}

impl ConfigError {
    pub(crate) fn invalid(key: &'static str, message: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            key,
            message: message.into(),
        }
    }
}

/// API error type that wraps errors from child crates
#[derive(Error, Debug)]
pub enum ApiError {
    /// Configuration errors
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Service identifier and storage errors
    #[error("Core error: {0}")]
    Core(#[from] localfed_core::Error),

    /// Registration errors
    #[error("Registry error: {0}")]
    Registry(#[from] localfed_query::RegistryError),

    /// Query execution errors
    #[error("Query error: {0}")]
    Query(#[from] localfed_query::QueryError),
}

impl ApiError {
    /// True when the error came from a SERVICE evaluation that was not
    /// masked by SILENT
    pub fn is_service_failure(&self) -> bool {
        matches!(self, ApiError::Query(e) if e.is_service_failure())
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;
