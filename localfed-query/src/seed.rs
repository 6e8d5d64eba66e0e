//! Leaf operators that feed a fixed input into a plan
//!
//! - [`EmptyOperator`]: one empty solution, the join identity
//! - [`SeedOperator`]: a fixed sequence of batches (the outer binding
//!   context handed over by the enclosing executor)

use crate::binding::{Batch, BindingRow};
use crate::context::ExecutionContext;
use crate::error::{QueryError, Result};
use crate::operator::{Operator, OperatorState};
use crate::var_registry::VarId;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;

/// Produces a single row with no bindings, then ends
#[derive(Debug)]
pub struct EmptyOperator {
    state: OperatorState,
}

impl EmptyOperator {
    pub fn new() -> Self {
        Self {
            state: OperatorState::Created,
        }
    }
}

impl Default for EmptyOperator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Operator for EmptyOperator {
    fn schema(&self) -> &[VarId] {
        &[]
    }

    async fn open(&mut self, _ctx: &ExecutionContext) -> Result<()> {
        self.state = OperatorState::Open;
        Ok(())
    }

    async fn next_batch(&mut self, _ctx: &ExecutionContext) -> Result<Option<Batch>> {
        if !self.state.can_next() {
            return Ok(None);
        }
        self.state = OperatorState::Exhausted;
        Ok(Some(Batch::single_empty()))
    }

    fn close(&mut self) {
        self.state = OperatorState::Closed;
    }

    fn estimated_rows(&self) -> Option<usize> {
        Some(1)
    }
}

/// Emits a fixed list of batches sharing one schema
#[derive(Debug)]
pub struct SeedOperator {
    schema: Arc<[VarId]>,
    batches: VecDeque<Batch>,
    rows: usize,
    state: OperatorState,
}

impl SeedOperator {
    /// Seed from batches; every batch must have exactly `schema` as its schema
    pub fn new(schema: Arc<[VarId]>, batches: Vec<Batch>) -> Result<Self> {
        if let Some(b) = batches.iter().find(|b| b.schema() != &*schema) {
            return Err(QueryError::Internal(format!(
                "seed batch schema {:?} does not match {:?}",
                b.schema(),
                schema
            )));
        }
        let rows = batches.iter().map(Batch::len).sum();
        Ok(Self {
            schema,
            batches: batches.into(),
            rows,
            state: OperatorState::Created,
        })
    }

    /// Seed from schema-free rows
    pub fn from_rows(schema: Arc<[VarId]>, rows: &[BindingRow]) -> Result<Self> {
        let batch = Batch::from_rows(schema.clone(), rows)?;
        Self::new(schema, vec![batch])
    }
}

#[async_trait]
impl Operator for SeedOperator {
    fn schema(&self) -> &[VarId] {
        &self.schema
    }

    async fn open(&mut self, _ctx: &ExecutionContext) -> Result<()> {
        if !self.state.can_open() {
            return Err(QueryError::Internal("SeedOperator opened twice".into()));
        }
        self.state = OperatorState::Open;
        Ok(())
    }

    async fn next_batch(&mut self, _ctx: &ExecutionContext) -> Result<Option<Batch>> {
        if !self.state.can_next() {
            if self.state == OperatorState::Created {
                return Err(QueryError::OperatorNotOpened);
            }
            return Ok(None);
        }
        while let Some(batch) = self.batches.pop_front() {
            if !batch.is_empty() {
                return Ok(Some(batch));
            }
        }
        self.state = OperatorState::Exhausted;
        Ok(None)
    }

    fn close(&mut self) {
        self.batches.clear();
        self.state = OperatorState::Closed;
    }

    fn estimated_rows(&self) -> Option<usize> {
        Some(self.rows)
    }
}
