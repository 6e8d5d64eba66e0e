//! Error types for federated query execution

use crate::binding::BatchError;
use crate::dataset::DatasetError;
use crate::registry::RegistryError;
use crate::remote::RemoteError;
use localfed_core::ServiceIri;
use thiserror::Error;

/// Query execution errors
#[derive(Error, Debug)]
pub enum QueryError {
    /// Error from localfed-core
    #[error("Core error: {0}")]
    Core(#[from] localfed_core::Error),

    /// Batch construction error
    #[error("Batch error: {0}")]
    Batch(#[from] BatchError),

    /// Registry error
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Storage/evaluation failure under a non-SILENT local SERVICE.
    ///
    /// Fatal to the enclosing query.
    #[error("Local evaluation of SERVICE <{service}> failed: {source}")]
    LocalEvaluation {
        service: ServiceIri,
        #[source]
        source: DatasetError,
    },

    /// Failure of the remote executor under a non-SILENT SERVICE
    #[error("Remote SERVICE <{service}> failed: {source}")]
    Remote {
        service: ServiceIri,
        #[source]
        source: RemoteError,
    },

    /// Operator not opened
    #[error("Operator not opened - call open() before next_batch()")]
    OperatorNotOpened,

    /// Invalid query
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl QueryError {
    pub fn local(service: &ServiceIri, source: DatasetError) -> Self {
        QueryError::LocalEvaluation {
            service: service.clone(),
            source,
        }
    }

    pub fn remote(service: &ServiceIri, source: RemoteError) -> Self {
        QueryError::Remote {
            service: service.clone(),
            source,
        }
    }

    /// True for failures that originate inside a SERVICE call (local or
    /// remote); these are the ones SILENT is allowed to absorb.
    pub fn is_service_failure(&self) -> bool {
        matches!(
            self,
            QueryError::LocalEvaluation { .. } | QueryError::Remote { .. }
        )
    }
}

/// Result type for query operations
pub type Result<T> = std::result::Result<T, QueryError>;
