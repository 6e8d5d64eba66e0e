//! Cursor scan operator
//!
//! Adapts a [`BindingCursor`] (from a local read transaction or from the
//! remote executor) to the [`Operator`] lifecycle. Batches are re-projected
//! when the cursor's column order differs from the requested schema.

use crate::binding::{Batch, BatchBuilder, Binding};
use crate::context::ExecutionContext;
use crate::dataset::BindingCursor;
use crate::error::{QueryError, Result};
use crate::operator::{Operator, OperatorState};
use crate::var_registry::VarId;
use async_trait::async_trait;
use localfed_core::ServiceIri;
use std::sync::Arc;

/// Maps a source error to the query error for this service
pub type ErrorMapper<E> = fn(&ServiceIri, E) -> QueryError;

/// Operator that drains one cursor
pub struct CursorScanOperator<E: Send + 'static> {
    service: ServiceIri,
    cursor: Option<Box<dyn BindingCursor<E>>>,
    schema: Arc<[VarId]>,
    map_err: ErrorMapper<E>,
    state: OperatorState,
}

impl<E: Send + 'static> CursorScanOperator<E> {
    pub fn new(
        service: ServiceIri,
        cursor: Box<dyn BindingCursor<E>>,
        schema: Arc<[VarId]>,
        map_err: ErrorMapper<E>,
    ) -> Self {
        Self {
            service,
            cursor: Some(cursor),
            schema,
            map_err,
            state: OperatorState::Created,
        }
    }

    fn project(&self, batch: Batch) -> Result<Batch> {
        if batch.schema() == &*self.schema {
            return Ok(batch);
        }
        let mut builder = BatchBuilder::new(self.schema.clone())?;
        for row in batch.rows() {
            builder.push_with(|var| row.get(var).cloned().unwrap_or(Binding::Unbound));
        }
        Ok(builder.finish())
    }
}

#[async_trait]
impl<E: Send + 'static> Operator for CursorScanOperator<E> {
    fn schema(&self) -> &[VarId] {
        &self.schema
    }

    async fn open(&mut self, _ctx: &ExecutionContext) -> Result<()> {
        if !self.state.can_open() {
            return Err(QueryError::Internal("CursorScanOperator opened twice".into()));
        }
        self.state = OperatorState::Open;
        Ok(())
    }

    async fn next_batch(&mut self, ctx: &ExecutionContext) -> Result<Option<Batch>> {
        if !self.state.can_next() {
            if self.state == OperatorState::Created {
                return Err(QueryError::OperatorNotOpened);
            }
            return Ok(None);
        }
        let Some(cursor) = self.cursor.as_mut() else {
            return Ok(None);
        };

        let pulled = ctx.interruptible(cursor.next_batch(ctx.batch_size)).await;
        match pulled {
            None => {
                self.close();
                Ok(None)
            }
            Some(Ok(Some(batch))) => self.project(batch).map(Some),
            Some(Ok(None)) => {
                self.cursor = None;
                self.state = OperatorState::Exhausted;
                Ok(None)
            }
            Some(Err(e)) => {
                self.close();
                Err((self.map_err)(&self.service, e))
            }
        }
    }

    fn close(&mut self) {
        self.cursor = None;
        self.state = OperatorState::Closed;
    }
}
