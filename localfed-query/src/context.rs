//! Execution context for query operators
//!
//! Holds what every operator needs while pulling batches: variable names,
//! the remote executor, batch sizing, and the cancellation/deadline state
//! of the enclosing query.

use crate::remote::{RemoteExecutor, UnsupportedRemote};
use crate::var_registry::VarRegistry;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

/// Default number of rows per batch
pub const DEFAULT_BATCH_SIZE: usize = 1000;

#[derive(Debug, Default)]
struct CancelInner {
    cancelled: AtomicBool,
    notify: Notify,
}

/// Shared cancellation signal for one query
///
/// Clones share state; cancelling any clone cancels all of them.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag {
    inner: Arc<CancelInner>,
}

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        if !self.inner.cancelled.swap(true, Ordering::AcqRel) {
            self.inner.notify.notify_waiters();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Completes once the flag is cancelled
    pub async fn cancelled(&self) {
        loop {
            // Register before checking so a concurrent cancel is not missed
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// Execution context shared by the operators of one query
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// Variable registry for the query
    pub vars: Arc<VarRegistry>,
    /// Executor for SERVICE nodes resolved to the remote path
    pub remote: Arc<dyn RemoteExecutor>,
    /// Target number of rows per batch
    pub batch_size: usize,
    pub cancellation: CancellationFlag,
    /// Point in time after which the query stops producing rows
    pub deadline: Option<Instant>,
}

impl ExecutionContext {
    /// Context with no remote path, default batch size, no deadline
    pub fn new(vars: Arc<VarRegistry>) -> Self {
        Self {
            vars,
            remote: Arc::new(UnsupportedRemote),
            batch_size: DEFAULT_BATCH_SIZE,
            cancellation: CancellationFlag::new(),
            deadline: None,
        }
    }

    pub fn with_remote(mut self, remote: Arc<dyn RemoteExecutor>) -> Self {
        self.remote = remote;
        self
    }

    /// Set the batch size (clamped to at least 1)
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_cancellation(mut self, flag: CancellationFlag) -> Self {
        self.cancellation = flag;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// True once the query was cancelled or its deadline has passed
    pub fn is_interrupted(&self) -> bool {
        self.cancellation.is_cancelled() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Run `fut` unless the query is cancelled or times out first.
    ///
    /// Returns `None` on interruption; `fut` is dropped in that case.
    pub async fn interruptible<F: Future>(&self, fut: F) -> Option<F::Output> {
        if self.is_interrupted() {
            return None;
        }
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    out = fut => Some(out),
                    _ = self.cancellation.cancelled() => None,
                    _ = tokio::time::sleep_until(deadline) => None,
                }
            }
            None => {
                tokio::select! {
                    out = fut => Some(out),
                    _ = self.cancellation.cancelled() => None,
                }
            }
        }
    }
}
