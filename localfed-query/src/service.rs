//! SERVICE operator - correlated local/remote evaluation
//!
//! For every row of its child (the outer binding context), the operator
//! evaluates the SERVICE body seeded with that row and joins the resulting
//! inner rows back onto it. Output is produced lazily, one batch at a time;
//! the inner sequence for an outer row is pulled only as far as needed to
//! fill the current batch.
//!
//! # Local targets
//!
//! The body is split into its service-free part, which the dataset evaluates
//! inside the operator's read transaction, and top-level nested SERVICE
//! nodes, which are chained as nested `ServiceOperator`s over the dataset
//! rows. One read transaction is opened per (nested) SERVICE node per
//! operator instance, on first use, and is released when the operator is
//! exhausted, closed, interrupted, fails, or is dropped.
//!
//! # Remote targets
//!
//! The body is handed to the context's [`RemoteExecutor`](crate::remote::RemoteExecutor)
//! in its original shape, once per outer row, with the outer row's bindings.
//!
//! # SILENT
//!
//! The outcome of each call is classified by [`InnerOutcome`]. Under SILENT,
//! a call's merged rows are held back until its inner sequence ends. A call
//! that yields no rows and a call that fails at any point both produce
//! exactly one pass-through row (the outer row, unchanged); rows held by a
//! failed call are discarded. Without SILENT, failures are fatal to the
//! query.

use crate::binding::{Batch, BatchBuilder, Binding};
use crate::context::ExecutionContext;
use crate::dataset::DatasetError;
use crate::error::{QueryError, Result};
use crate::ir::Pattern;
use crate::local::LocalEvaluator;
use crate::merge::{merge_rows, merged_schema, pass_through, seed_row, InnerOutcome};
use crate::operator::{BoxedOperator, Operator, OperatorState};
use crate::plan::{distinct_vars, lower_all, PlanNode, ResolvedService, ServiceTarget};
use crate::remote::{RemoteError, RemoteRequest};
use crate::scan::CursorScanOperator;
use crate::var_registry::VarId;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::Instrument;

/// Immutable, per-node execution plan shared by every operator instance
/// built for the same SERVICE node
#[derive(Debug)]
struct ServicePlan {
    service: ResolvedService,
    /// Distinct variables of the whole body
    body_vars: Vec<VarId>,
    /// Service-free part of a local body
    plain: Vec<Pattern>,
    /// Variables of `plain`
    plain_vars: Vec<VarId>,
    /// Top-level nested SERVICE nodes of a local body
    nested: Vec<Arc<ServicePlan>>,
    /// Body in parser IR form, for remote requests
    remote_body: Vec<Pattern>,
}

impl ServicePlan {
    fn build(service: ResolvedService) -> Result<Arc<Self>> {
        let body_vars = distinct_vars(service.variables());
        let mut plain = Vec::new();
        let mut nested = Vec::new();

        if service.target.is_local() {
            for node in &service.patterns {
                match node {
                    PlanNode::Service(inner) => nested.push(ServicePlan::build(inner.clone())?),
                    other if other.contains_service() => {
                        return Err(QueryError::InvalidQuery(format!(
                            "SERVICE <{}>: a nested SERVICE inside OPTIONAL or UNION \
                             cannot be evaluated by a local dataset",
                            service.endpoint
                        )));
                    }
                    other => plain.push(other.to_pattern()),
                }
            }
        }

        let plain_vars = distinct_vars(plain.iter().flat_map(Pattern::variables));
        let remote_body = lower_all(&service.patterns);
        Ok(Arc::new(Self {
            service,
            body_vars,
            plain,
            plain_vars,
            nested,
            remote_body,
        }))
    }
}

/// Read transactions of one operator instance, mirroring the plan tree
#[derive(Debug, Clone)]
struct Evaluators {
    own: Option<LocalEvaluator>,
    nested: Vec<Evaluators>,
}

impl Evaluators {
    fn for_plan(plan: &ServicePlan) -> Self {
        let own = match &plan.service.target {
            ServiceTarget::Local(handle) => Some(LocalEvaluator::new(
                plan.service.endpoint.clone(),
                handle.clone(),
            )),
            ServiceTarget::Remote => None,
        };
        Self {
            own,
            nested: plan.nested.iter().map(|p| Evaluators::for_plan(p)).collect(),
        }
    }
}

/// In-flight SERVICE call for the current outer row
struct InnerCall {
    op: BoxedOperator,
    rows_seen: usize,
    /// Merged rows of a SILENT call, released only when the call ends cleanly
    held: Vec<Vec<Binding>>,
}

/// Result of trying to start a SERVICE call
enum CallStart {
    Started(InnerCall),
    Failed(QueryError),
    Interrupted,
}

/// Result of pulling from the current SERVICE call
enum CallStep {
    Rows(Batch),
    Done,
    Failed(QueryError),
    Interrupted,
}

/// Correlated SERVICE operator
pub struct ServiceOperator {
    child: BoxedOperator,
    plan: Arc<ServicePlan>,
    /// `None` once released
    evaluators: Option<Evaluators>,
    /// Schema requested from the dataset or remote executor
    scan_schema: Arc<[VarId]>,
    schema: Arc<[VarId]>,
    state: OperatorState,
    outer: Option<Batch>,
    outer_row: usize,
    inner: Option<InnerCall>,
    /// Output rows waiting for room in a batch
    ready: VecDeque<Vec<Binding>>,
    span: tracing::Span,
    outer_rows: u64,
    pass_through_rows: u64,
}

impl ServiceOperator {
    /// Build a SERVICE operator over `child`
    ///
    /// Fails with `InvalidQuery` when a local body nests a SERVICE inside
    /// OPTIONAL or UNION.
    pub fn new(child: BoxedOperator, service: ResolvedService) -> Result<Self> {
        let plan = ServicePlan::build(service)?;
        let evaluators = Evaluators::for_plan(&plan);
        Ok(Self::from_plan(child, plan, evaluators))
    }

    fn from_plan(child: BoxedOperator, plan: Arc<ServicePlan>, evaluators: Evaluators) -> Self {
        let child_schema = child.schema();
        let scan_vars: Vec<VarId> = if plan.service.target.is_local() {
            let seeded = plan.body_vars.iter().filter(|v| child_schema.contains(v));
            distinct_vars(plan.plain_vars.iter().chain(seeded).copied())
        } else {
            plan.body_vars.clone()
        };
        let schema = merged_schema(child_schema, &plan.body_vars);
        let span = tracing::debug_span!(
            "service",
            endpoint = %plan.service.endpoint,
            silent = plan.service.silent,
            target = plan.service.target.label(),
            outer_rows = tracing::field::Empty,
            pass_through = tracing::field::Empty,
        );

        Self {
            child,
            plan,
            evaluators: Some(evaluators),
            scan_schema: Arc::from(scan_vars.into_boxed_slice()),
            schema,
            state: OperatorState::Created,
            outer: None,
            outer_row: 0,
            inner: None,
            ready: VecDeque::new(),
            span,
            outer_rows: 0,
            pass_through_rows: 0,
        }
    }

    pub fn service(&self) -> &ResolvedService {
        &self.plan.service
    }

    /// True while this operator holds its own read transaction
    pub fn holds_transaction(&self) -> bool {
        self.evaluators
            .as_ref()
            .and_then(|e| e.own.as_ref())
            .is_some_and(LocalEvaluator::is_open)
    }

    /// Drop transactions, the in-flight call and buffered rows
    fn release(&mut self) {
        if let Some(mut call) = self.inner.take() {
            call.op.close();
        }
        self.outer = None;
        self.ready.clear();
        self.evaluators = None;
    }

    fn interrupt(&mut self) -> Option<Batch> {
        tracing::debug!(service = %self.plan.service.endpoint, "SERVICE interrupted");
        self.close();
        None
    }

    async fn start_call(&mut self, ctx: &ExecutionContext) -> CallStart {
        let Some(outer) = self.outer.as_ref().and_then(|b| b.row_view(self.outer_row)) else {
            return CallStart::Failed(QueryError::Internal("no current outer row".into()));
        };
        let seed = seed_row(outer, &self.plan.body_vars);
        let endpoint = &self.plan.service.endpoint;

        let mut op: BoxedOperator = match &self.plan.service.target {
            ServiceTarget::Local(_) => {
                let Some(evaluators) = self.evaluators.as_ref() else {
                    return CallStart::Failed(QueryError::Internal(
                        "SERVICE operator already released".into(),
                    ));
                };
                let Some(local) = evaluators.own.as_ref() else {
                    return CallStart::Failed(QueryError::Internal(
                        "local SERVICE without evaluator".into(),
                    ));
                };
                let guard = match ctx.interruptible(local.transaction()).await {
                    None => return CallStart::Interrupted,
                    Some(Err(e)) => return CallStart::Failed(QueryError::local(endpoint, e)),
                    Some(Ok(guard)) => guard,
                };
                let cursor = match guard.evaluate(&self.plan.plain, &seed, self.scan_schema.clone())
                {
                    Ok(cursor) => cursor,
                    Err(e) => return CallStart::Failed(QueryError::local(endpoint, e)),
                };
                let mut op: BoxedOperator = Box::new(CursorScanOperator::<DatasetError>::new(
                    endpoint.clone(),
                    cursor,
                    self.scan_schema.clone(),
                    QueryError::local,
                ));
                for (plan, evals) in self.plan.nested.iter().zip(&evaluators.nested) {
                    op = Box::new(ServiceOperator::from_plan(op, plan.clone(), evals.clone()));
                }
                op
            }
            ServiceTarget::Remote => {
                let request = RemoteRequest {
                    endpoint,
                    silent: self.plan.service.silent,
                    patterns: &self.plan.remote_body,
                    bindings: &seed,
                    schema: &self.scan_schema,
                    vars: &ctx.vars,
                };
                let cursor = match ctx.interruptible(ctx.remote.execute(request)).await {
                    None => return CallStart::Interrupted,
                    Some(Err(e)) => return CallStart::Failed(QueryError::remote(endpoint, e)),
                    Some(Ok(cursor)) => cursor,
                };
                Box::new(CursorScanOperator::<RemoteError>::new(
                    endpoint.clone(),
                    cursor,
                    self.scan_schema.clone(),
                    QueryError::remote,
                ))
            }
        };

        if let Err(e) = op.open(ctx).await {
            return CallStart::Failed(e);
        }
        CallStart::Started(InnerCall {
            op,
            rows_seen: 0,
            held: Vec::new(),
        })
    }

    /// End the call for the current outer row and move to the next one
    fn finish_call(&mut self, outcome: InnerOutcome) {
        if let Some(mut call) = self.inner.take() {
            call.op.close();
            if outcome != InnerOutcome::Failed {
                self.ready.extend(call.held);
            }
        }
        if outcome.passes_through(self.plan.service.silent) {
            if let Some(outer) = self.outer.as_ref().and_then(|b| b.row_view(self.outer_row)) {
                self.ready.push_back(pass_through(&self.schema, outer));
                self.pass_through_rows += 1;
            }
        }
        self.outer_row += 1;
    }

    /// Handle a failed call: SILENT absorbs service failures, anything else
    /// is returned to the caller.
    fn absorb_failure(&mut self, err: QueryError) -> Result<()> {
        if !(self.plan.service.silent && err.is_service_failure()) {
            return Err(err);
        }
        let discarded = self.inner.as_ref().map_or(0, |call| call.held.len());
        tracing::debug!(
            service = %self.plan.service.endpoint,
            error = %err,
            discarded,
            "SERVICE SILENT: masking failure"
        );
        self.finish_call(InnerOutcome::Failed);
        Ok(())
    }

    async fn fill_batch(&mut self, ctx: &ExecutionContext) -> Result<Option<Batch>> {
        let mut builder = BatchBuilder::new(self.schema.clone())?;

        while builder.len() < ctx.batch_size {
            if ctx.is_interrupted() {
                return Ok(self.interrupt());
            }

            if let Some(row) = self.ready.pop_front() {
                builder.push_row(row);
                continue;
            }

            // Continue the call for the current outer row
            if let Some(call) = self.inner.as_mut() {
                let step = match ctx.interruptible(call.op.next_batch(ctx)).await {
                    None => CallStep::Interrupted,
                    Some(Ok(Some(batch))) => CallStep::Rows(batch),
                    Some(Ok(None)) => CallStep::Done,
                    Some(Err(e)) => CallStep::Failed(e),
                };
                if let CallStep::Rows(batch) = &step {
                    call.rows_seen += batch.len();
                }
                let rows_seen = call.rows_seen;
                match step {
                    CallStep::Rows(batch) => {
                        let Some(outer) =
                            self.outer.as_ref().and_then(|b| b.row_view(self.outer_row))
                        else {
                            return Err(QueryError::Internal("no current outer row".into()));
                        };
                        let merged = batch
                            .rows()
                            .filter_map(|inner| merge_rows(&self.schema, outer, inner));
                        if self.plan.service.silent {
                            call.held.extend(merged);
                        } else {
                            self.ready.extend(merged);
                        }
                    }
                    CallStep::Done => self.finish_call(InnerOutcome::finished(rows_seen)),
                    CallStep::Failed(e) => {
                        if let Err(e) = self.absorb_failure(e) {
                            self.close();
                            return Err(e);
                        }
                    }
                    CallStep::Interrupted => return Ok(self.interrupt()),
                }
                continue;
            }

            // Start a call for the next buffered outer row
            let has_outer_row = self
                .outer
                .as_ref()
                .is_some_and(|b| self.outer_row < b.len());
            if has_outer_row {
                self.outer_rows += 1;
                match self.start_call(ctx).await {
                    CallStart::Started(call) => self.inner = Some(call),
                    CallStart::Failed(e) => {
                        if let Err(e) = self.absorb_failure(e) {
                            self.close();
                            return Err(e);
                        }
                    }
                    CallStart::Interrupted => return Ok(self.interrupt()),
                }
                continue;
            }

            // Pull the next outer batch
            match ctx.interruptible(self.child.next_batch(ctx)).await {
                None => return Ok(self.interrupt()),
                Some(Ok(Some(batch))) => {
                    self.outer = Some(batch);
                    self.outer_row = 0;
                }
                Some(Ok(None)) => {
                    self.state = OperatorState::Exhausted;
                    self.span.record("outer_rows", self.outer_rows);
                    self.span.record("pass_through", self.pass_through_rows);
                    self.child.close();
                    self.release();
                    break;
                }
                Some(Err(e)) => {
                    self.close();
                    return Err(e);
                }
            }
        }

        if builder.is_empty() {
            Ok(None)
        } else {
            Ok(Some(builder.finish()))
        }
    }
}

#[async_trait]
impl Operator for ServiceOperator {
    fn schema(&self) -> &[VarId] {
        &self.schema
    }

    async fn open(&mut self, ctx: &ExecutionContext) -> Result<()> {
        if !self.state.can_open() {
            if self.state.is_closed() {
                return Err(QueryError::Internal(
                    "ServiceOperator cannot be reopened after close".into(),
                ));
            }
            return Ok(());
        }
        self.child.open(ctx).await?;
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
        let span = self.span.clone();
        self.fill_batch(ctx).instrument(span).await
    }

    fn close(&mut self) {
        self.child.close();
        self.release();
        self.state = OperatorState::Closed;
    }

    fn estimated_rows(&self) -> Option<usize> {
        // Correlated: at least one row per outer row under SILENT
        if self.plan.service.silent {
            self.child.estimated_rows()
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::DatasetHandle;
    use crate::memory::MemoryDataset;
    use crate::pattern::TriplePattern;
    use crate::seed::EmptyOperator;
    use crate::var_registry::VarRegistry;
    use localfed_core::{create_service_iri, MemoryStore, Term};

    fn local_service(patterns: Vec<PlanNode>) -> ResolvedService {
        ResolvedService {
            silent: false,
            endpoint: create_service_iri("ds").unwrap(),
            target: ServiceTarget::Local(DatasetHandle::new(MemoryDataset::new(
                "ds",
                MemoryStore::new(),
            ))),
            patterns,
        }
    }

    fn triple(s: u16, o: u16) -> PlanNode {
        PlanNode::Triple(TriplePattern::new(
            VarId(s),
            Term::iri("http://ex.org/p"),
            VarId(o),
        ))
    }

    #[test]
    fn test_schema_is_outer_then_new_vars() {
        let op = ServiceOperator::new(
            Box::new(EmptyOperator::new()),
            local_service(vec![triple(0, 1), triple(1, 2)]),
        )
        .unwrap();
        assert_eq!(op.schema(), &[VarId(0), VarId(1), VarId(2)]);
        assert!(!op.holds_transaction());
    }

    #[test]
    fn test_rejects_service_inside_local_optional() {
        let mut nested = local_service(vec![triple(0, 1)]);
        nested.endpoint = create_service_iri("other").unwrap();
        let svc = local_service(vec![PlanNode::Optional(vec![PlanNode::Service(nested)])]);
        let err = ServiceOperator::new(Box::new(EmptyOperator::new()), svc)
            .err()
            .unwrap();
        assert!(matches!(err, QueryError::InvalidQuery(_)));
    }

    #[tokio::test]
    async fn test_next_batch_before_open() {
        let mut op =
            ServiceOperator::new(Box::new(EmptyOperator::new()), local_service(vec![triple(0, 1)]))
                .unwrap();
        let ctx = ExecutionContext::new(Arc::new(VarRegistry::new()));
        assert!(matches!(
            op.next_batch(&ctx).await,
            Err(QueryError::OperatorNotOpened)
        ));
    }
}
