//! Error types for localfed-core

use thiserror::Error;

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Storage-related errors (read failures, injected faults)
    #[error("Storage error: {0}")]
    Storage(String),

    /// A service identifier could not be canonicalized
    #[error("Invalid service IRI: {0}")]
    InvalidServiceIri(String),

    /// A local service name was empty or whitespace-only
    #[error("Invalid service name: {0}")]
    InvalidServiceName(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Error::Storage(msg.into())
    }

    /// Create an invalid service IRI error
    pub fn invalid_service_iri(msg: impl Into<String>) -> Self {
        Error::InvalidServiceIri(msg.into())
    }

    /// Create an invalid service name error
    pub fn invalid_service_name(msg: impl Into<String>) -> Self {
        Error::InvalidServiceName(msg.into())
    }

    /// Create a generic error
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }
}
