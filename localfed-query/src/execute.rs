//! Plan execution helpers
//!
//! The outer plan executor owns joins, filters and everything else; this
//! module only chains the SERVICE nodes of a resolved plan over an input
//! operator and drives the resulting operator to completion.

use crate::binding::{Batch, BindingRow};
use crate::context::ExecutionContext;
use crate::error::{QueryError, Result};
use crate::operator::BoxedOperator;
use crate::plan::PlanNode;
use crate::seed::{EmptyOperator, SeedOperator};
use crate::service::ServiceOperator;
use futures::stream::{self, Stream};
use std::time::Instant;
use tracing::Instrument;

/// Chain every SERVICE node of `plan` over `child`.
///
/// `child` defaults to a single empty solution. Non-service nodes at this
/// level belong to the outer executor and are rejected.
pub fn build_plan_operators(child: Option<BoxedOperator>, plan: &[PlanNode]) -> Result<BoxedOperator> {
    let mut op: BoxedOperator = child.unwrap_or_else(|| Box::new(EmptyOperator::new()));
    for node in plan {
        match node {
            PlanNode::Service(svc) => {
                op = Box::new(ServiceOperator::new(op, svc.clone())?);
            }
            other => {
                return Err(QueryError::InvalidQuery(format!(
                    "only SERVICE nodes can be executed at the outer level, found {:?}",
                    other
                )));
            }
        }
    }
    Ok(op)
}

/// Build the operator chain for `plan` over a fixed outer context
pub fn build_seeded(outer: Batch, plan: &[PlanNode]) -> Result<BoxedOperator> {
    let seed = SeedOperator::new(outer.schema_arc().clone(), vec![outer])?;
    build_plan_operators(Some(Box::new(seed)), plan)
}

/// Open, drain and close `operator`
pub async fn collect_batches(mut operator: BoxedOperator, ctx: &ExecutionContext) -> Result<Vec<Batch>> {
    let span = tracing::debug_span!(
        "federated_run",
        batch_size = ctx.batch_size,
        total_batches = tracing::field::Empty,
        total_rows = tracing::field::Empty,
        total_ms = tracing::field::Empty,
    );
    async {
        let start = Instant::now();
        operator.open(ctx).await?;

        let mut results = Vec::new();
        let mut total_rows = 0usize;
        loop {
            match operator.next_batch(ctx).await {
                Ok(Some(batch)) => {
                    total_rows += batch.len();
                    tracing::trace!(batch_num = results.len() + 1, row_count = batch.len(), "received batch");
                    results.push(batch);
                }
                Ok(None) => break,
                Err(e) => {
                    operator.close();
                    return Err(e);
                }
            }
        }
        operator.close();

        let span = tracing::Span::current();
        span.record("total_batches", results.len() as u64);
        span.record("total_rows", total_rows as u64);
        span.record("total_ms", start.elapsed().as_millis() as u64);
        if ctx.is_interrupted() {
            tracing::debug!(total_rows, "federated execution interrupted");
        }
        Ok(results)
    }
    .instrument(span)
    .await
}

/// Drain `operator` into schema-free rows
pub async fn collect_rows(operator: BoxedOperator, ctx: &ExecutionContext) -> Result<Vec<BindingRow>> {
    let batches = collect_batches(operator, ctx).await?;
    Ok(batches.iter().flat_map(Batch::to_rows).collect())
}

/// Expose `operator` as a stream of batches.
///
/// The operator is opened on first poll. Dropping the stream drops the
/// operator, releasing any read transactions it holds.
pub fn into_stream(
    operator: BoxedOperator,
    ctx: ExecutionContext,
) -> impl Stream<Item = Result<Batch>> + Send {
    struct State {
        operator: BoxedOperator,
        ctx: ExecutionContext,
        opened: bool,
        done: bool,
    }

    stream::unfold(
        State {
            operator,
            ctx,
            opened: false,
            done: false,
        },
        |mut st| async move {
            if st.done {
                return None;
            }
            if !st.opened {
                st.opened = true;
                if let Err(e) = st.operator.open(&st.ctx).await {
                    st.done = true;
                    st.operator.close();
                    return Some((Err(e), st));
                }
            }
            match st.operator.next_batch(&st.ctx).await {
                Ok(Some(batch)) => Some((Ok(batch), st)),
                Ok(None) => {
                    st.operator.close();
                    None
                }
                Err(e) => {
                    st.done = true;
                    st.operator.close();
                    Some((Err(e), st))
                }
            }
        },
    )
}
