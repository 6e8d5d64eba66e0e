//! Remote fallback boundary
//!
//! SERVICE nodes that do not resolve to a local dataset are handed to a
//! [`RemoteExecutor`]. The request carries the sub-pattern in its original
//! shape plus the outer row's bindings; the executor answers with a cursor
//! of rows in the same shape a local dataset produces, so the merge step
//! treats both origins identically.

use crate::binding::BindingRow;
use crate::dataset::BindingCursor;
use crate::ir::Pattern;
use crate::var_registry::{VarId, VarRegistry};
use async_trait::async_trait;
use localfed_core::ServiceIri;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Errors from the remote execution path
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// No remote execution path is configured for this endpoint
    #[error("External SERVICE endpoints not supported: {0}")]
    Unsupported(ServiceIri),

    /// The endpoint could not be reached or refused the request
    #[error("Remote endpoint unavailable: {0}")]
    Unavailable(String),

    /// The endpoint answered with something that is not a solution sequence
    #[error("Invalid remote response: {0}")]
    InvalidResponse(String),

    #[error("{0}")]
    Other(String),
}

/// Cursor over remote results
pub type RemoteCursor = Box<dyn BindingCursor<RemoteError>>;

/// One remote SERVICE invocation (per outer row)
#[derive(Debug, Clone, Copy)]
pub struct RemoteRequest<'a> {
    pub endpoint: &'a ServiceIri,
    pub silent: bool,
    /// Sub-pattern exactly as it appeared in the query
    pub patterns: &'a [Pattern],
    /// Outer bindings for variables of the sub-pattern
    pub bindings: &'a BindingRow,
    /// Variables the caller expects back, in column order
    pub schema: &'a Arc<[VarId]>,
    /// Names for the variable ids used in `patterns`
    pub vars: &'a VarRegistry,
}

/// Executes SERVICE sub-patterns against non-local endpoints
#[async_trait]
pub trait RemoteExecutor: Send + Sync + fmt::Debug {
    async fn execute(&self, request: RemoteRequest<'_>) -> Result<RemoteCursor, RemoteError>;
}

/// Executor used when no remote path is configured: every call fails.
///
/// Combined with SILENT this yields pass-through rows; without SILENT the
/// query fails with a remote error.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedRemote;

#[async_trait]
impl RemoteExecutor for UnsupportedRemote {
    async fn execute(&self, request: RemoteRequest<'_>) -> Result<RemoteCursor, RemoteError> {
        tracing::debug!(service = %request.endpoint, "no remote executor configured");
        Err(RemoteError::Unsupported(request.endpoint.clone()))
    }
}
