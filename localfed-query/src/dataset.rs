//! Local dataset capability
//!
//! A locally registered SERVICE target is anything that can open a read
//! transaction and evaluate a (service-free) group of patterns inside it.
//! The federation layer never looks at storage directly; it only talks to
//! these three traits:
//!
//! - [`Dataset`]: opens read transactions
//! - [`ReadTransaction`]: pins a consistent view; dropping it releases it
//! - [`BindingCursor`]: lazily yields solution batches
//!
//! [`DatasetHandle`] is the shared, cheaply clonable reference stored in the
//! registry. Two handles are "the same dataset" iff they point at the same
//! allocation.

use crate::binding::{Batch, BindingRow};
use crate::ir::Pattern;
use crate::var_registry::VarId;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised by a local dataset while opening or evaluating
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DatasetError {
    /// Underlying storage failure
    #[error("Storage error: {0}")]
    Storage(#[from] localfed_core::Error),

    /// The dataset cannot evaluate this pattern shape
    #[error("Unsupported pattern: {0}")]
    Unsupported(String),

    /// The transaction was used after it was released
    #[error("Read transaction for dataset '{0}' is closed")]
    Closed(String),

    #[error("{0}")]
    Other(String),
}

/// A lazily evaluated sequence of solution batches.
///
/// Generic over the error type so the same shape serves local datasets
/// ([`DatasetError`]) and remote executors.
#[async_trait]
pub trait BindingCursor<E: Send + 'static>: Send + Sync {
    /// Next batch of at most `max_rows` rows, or `None` when exhausted.
    ///
    /// After returning `Err` the cursor is considered finished.
    async fn next_batch(&mut self, max_rows: usize) -> Result<Option<Batch>, E>;
}

/// Cursor over a local dataset
pub type DatasetCursor = Box<dyn BindingCursor<DatasetError>>;

/// An open read transaction pinned to one consistent view of a dataset.
///
/// Every cursor created from the same transaction sees the same data,
/// regardless of concurrent writers. Dropping the transaction (and any
/// cursors created from it) releases the view.
pub trait ReadTransaction: Send + Sync + fmt::Debug {
    /// Identifier of the pinned view (for logs)
    fn snapshot_id(&self) -> u64;

    /// Start evaluating `patterns` seeded with `seed`.
    ///
    /// `seed` holds the outer solution's values for variables that appear in
    /// `patterns`; every produced solution is compatible with it. Output
    /// rows are projected onto `schema`, seed variables included.
    ///
    /// `patterns` must not contain SERVICE nodes.
    fn evaluate(
        &self,
        patterns: &[Pattern],
        seed: &BindingRow,
        schema: Arc<[VarId]>,
    ) -> Result<DatasetCursor, DatasetError>;
}

/// A locally evaluable dataset
#[async_trait]
pub trait Dataset: Send + Sync + fmt::Debug {
    /// Human readable name (for logs)
    fn name(&self) -> &str;

    /// Open a read transaction on the current state of the dataset
    async fn begin_read(&self) -> Result<Box<dyn ReadTransaction>, DatasetError>;
}

/// Shared handle to a registered dataset
#[derive(Clone)]
pub struct DatasetHandle(Arc<dyn Dataset>);

impl DatasetHandle {
    pub fn new(dataset: impl Dataset + 'static) -> Self {
        Self(Arc::new(dataset))
    }

    pub fn from_arc(dataset: Arc<dyn Dataset>) -> Self {
        Self(dataset)
    }

    pub fn name(&self) -> &str {
        self.0.name()
    }

    pub async fn begin_read(&self) -> Result<Box<dyn ReadTransaction>, DatasetError> {
        self.0.begin_read().await
    }

    /// Identity comparison: true iff both handles share one allocation
    pub fn ptr_eq(&self, other: &DatasetHandle) -> bool {
        // Compare data pointers only; vtable pointers are not unique.
        std::ptr::eq(
            Arc::as_ptr(&self.0) as *const (),
            Arc::as_ptr(&other.0) as *const (),
        )
    }
}

impl fmt::Debug for DatasetHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DatasetHandle").field(&self.0.name()).finish()
    }
}
