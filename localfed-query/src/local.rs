//! Local sub-evaluation: read transaction ownership
//!
//! A [`LocalEvaluator`] is created once per SERVICE operator instance. The
//! first outer row that needs it opens the dataset's read transaction; every
//! later row (and every nested operator built for those rows) reuses the
//! same transaction, so all rows of one invocation see one snapshot.
//!
//! The transaction lives in a [`TxnGuard`] owned by the evaluator. When the
//! last clone of the evaluator is dropped, the guard drops and the
//! transaction is released, whatever the exit path.

use crate::binding::BindingRow;
use crate::dataset::{DatasetCursor, DatasetError, DatasetHandle, ReadTransaction};
use crate::ir::Pattern;
use crate::var_registry::VarId;
use localfed_core::ServiceIri;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Scoped ownership of an open read transaction
#[derive(Debug)]
pub struct TxnGuard {
    service: ServiceIri,
    txn: Box<dyn ReadTransaction>,
}

impl TxnGuard {
    pub fn snapshot_id(&self) -> u64 {
        self.txn.snapshot_id()
    }

    /// Evaluate a service-free group seeded with `seed`
    pub fn evaluate(
        &self,
        patterns: &[Pattern],
        seed: &BindingRow,
        schema: Arc<[VarId]>,
    ) -> Result<DatasetCursor, DatasetError> {
        self.txn.evaluate(patterns, seed, schema)
    }
}

impl Drop for TxnGuard {
    fn drop(&mut self) {
        tracing::trace!(
            service = %self.service,
            snapshot = self.txn.snapshot_id(),
            "released read transaction"
        );
    }
}

#[derive(Debug)]
struct EvaluatorInner {
    service: ServiceIri,
    handle: DatasetHandle,
    /// Outcome of the single `begin_read` attempt
    txn: OnceCell<Result<TxnGuard, DatasetError>>,
}

/// Lazily opened, shared read transaction for one local SERVICE
#[derive(Debug, Clone)]
pub struct LocalEvaluator {
    inner: Arc<EvaluatorInner>,
}

impl LocalEvaluator {
    pub fn new(service: ServiceIri, handle: DatasetHandle) -> Self {
        Self {
            inner: Arc::new(EvaluatorInner {
                service,
                handle,
                txn: OnceCell::new(),
            }),
        }
    }

    pub fn service(&self) -> &ServiceIri {
        &self.inner.service
    }

    /// True once a transaction has been opened successfully
    pub fn is_open(&self) -> bool {
        matches!(self.inner.txn.get(), Some(Ok(_)))
    }

    /// The transaction, opening it on first use.
    ///
    /// Opening is attempted once; a failure is remembered and returned to
    /// every later caller.
    pub async fn transaction(&self) -> Result<&TxnGuard, DatasetError> {
        let inner = &self.inner;
        let outcome = inner
            .txn
            .get_or_init(|| async {
                let txn = inner.handle.begin_read().await?;
                tracing::trace!(
                    service = %inner.service,
                    dataset = inner.handle.name(),
                    snapshot = txn.snapshot_id(),
                    "opened read transaction"
                );
                Ok(TxnGuard {
                    service: inner.service.clone(),
                    txn,
                })
            })
            .await;
        outcome.as_ref().map_err(Clone::clone)
    }
}
