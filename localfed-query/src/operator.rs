//! Operator trait and base types for query execution
//!
//! Operators form a tree that produces batches of results through
//! the `open/next_batch/close` lifecycle pattern.

use crate::binding::Batch;
use crate::context::ExecutionContext;
use crate::error::Result;
use crate::var_registry::VarId;
use async_trait::async_trait;

/// Query execution operator
///
/// Operators follow a lifecycle pattern for resource control:
/// 1. `open()` - Initialize state, open children
/// 2. `next_batch()` - Pull batches until exhausted (returns None)
/// 3. `close()` - Release resources (read transactions included)
///
/// # Schema Contract
///
/// - `schema()` returns the output variables, fixed at construction
/// - All batches from `next_batch()` have columns in schema order
/// - Schema contains no duplicate VarIds
///
/// Dropping an operator without calling `close()` must release the same
/// resources `close()` would.
#[async_trait]
pub trait Operator: Send {
    /// Output schema - which variables this operator produces
    fn schema(&self) -> &[VarId];

    /// Initialize operator state
    ///
    /// Called once before `next_batch()`.
    async fn open(&mut self, ctx: &ExecutionContext) -> Result<()>;

    /// Pull next batch of results
    ///
    /// Returns `Ok(Some(batch))` with results, or `Ok(None)` when exhausted,
    /// cancelled, or past the deadline.
    async fn next_batch(&mut self, ctx: &ExecutionContext) -> Result<Option<Batch>>;

    /// Release resources
    fn close(&mut self);

    /// Estimated cardinality, if known
    fn estimated_rows(&self) -> Option<usize> {
        None
    }
}

/// Boxed operator for dynamic dispatch
pub type BoxedOperator = Box<dyn Operator>;

/// Operator state for lifecycle tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorState {
    /// Not yet opened
    Created,
    /// Opened and ready to produce batches
    Open,
    /// Exhausted (next_batch returned None)
    Exhausted,
    /// Closed
    Closed,
}

impl OperatorState {
    /// Check if operator can be opened
    pub fn can_open(&self) -> bool {
        matches!(self, OperatorState::Created)
    }

    /// Check if operator can produce batches
    pub fn can_next(&self) -> bool {
        matches!(self, OperatorState::Open)
    }

    /// Check if operator is closed
    pub fn is_closed(&self) -> bool {
        matches!(self, OperatorState::Closed)
    }
}
