//! Shared fixtures for federation integration tests.
#![allow(dead_code)]

pub mod tracing_capture;

use async_trait::async_trait;
use localfed_core::{create_service_iri, ServiceIri, Term, Triple};
use localfed_query::{
    build_plan_operators, build_seeded, collect_rows, rewrite_patterns, Batch, BindingCursor,
    BindingRow, Dataset, DatasetError, DatasetHandle, ExecutionContext, MemoryDataset, Pattern,
    PatternTerm, ReadTransaction, RemoteCursor, RemoteError, RemoteExecutor, RemoteRequest,
    Result, ServicePattern, ServiceRegistry, TriplePattern, VarId, VarRegistry,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

pub const EX: &str = "http://ex.org/";

pub fn iri(local: &str) -> Term {
    Term::iri(format!("{}{}", EX, local))
}

pub fn svc(name: &str) -> ServiceIri {
    create_service_iri(name).unwrap()
}

pub fn triple(s: &str, p: &str, o: i64) -> Triple {
    Triple::new(iri(s), iri(p), Term::integer(o))
}

/// `ds1` from the reference scenario: (a,p,1), (a,p,2)
pub fn ds1() -> MemoryDataset {
    MemoryDataset::from_triples("ds1", [triple("a", "p", 1), triple("a", "p", 2)])
}

/// Active registry holding the given datasets under their names
pub fn registry_with(datasets: &[&MemoryDataset]) -> ServiceRegistry {
    let registry = ServiceRegistry::default();
    registry.initialize();
    for ds in datasets {
        registry
            .register_dataset(svc(ds.name()), DatasetHandle::new((*ds).clone()))
            .unwrap();
    }
    registry
}

/// Parse one position: `?x` is a variable, an integer literal is an
/// `xsd:integer`, anything else is an IRI under `EX`.
fn term(vars: &mut VarRegistry, token: &str) -> PatternTerm {
    if token.starts_with('?') {
        PatternTerm::Var(vars.get_or_insert(token))
    } else if let Ok(n) = token.parse::<i64>() {
        PatternTerm::Const(Term::integer(n))
    } else {
        PatternTerm::Const(iri(token))
    }
}

pub fn tp(vars: &mut VarRegistry, s: &str, p: &str, o: &str) -> Pattern {
    Pattern::Triple(TriplePattern {
        s: term(vars, s),
        p: term(vars, p),
        o: term(vars, o),
    })
}

pub fn service(name: &str, silent: bool, patterns: Vec<Pattern>) -> Pattern {
    Pattern::Service(ServicePattern::new(silent, svc(name), patterns))
}

pub fn row(vars: &VarRegistry, pairs: &[(&str, Term)]) -> BindingRow {
    BindingRow::from_pairs(
        pairs
            .iter()
            .map(|(name, t)| (vars.get(name).unwrap(), t.clone())),
    )
}

pub fn schema(vars: &[VarId]) -> Arc<[VarId]> {
    Arc::from(vars.to_vec().into_boxed_slice())
}

/// Outer binding context built from rows over the named variables
pub fn outer(vars: &mut VarRegistry, names: &[&str], rows: &[Vec<(&str, Term)>]) -> Batch {
    let ids: Vec<VarId> = names.iter().map(|n| vars.get_or_insert(n)).collect();
    let rows: Vec<BindingRow> = rows
        .iter()
        .map(|r| {
            BindingRow::from_pairs(r.iter().map(|(n, t)| (vars.get(n).unwrap(), t.clone())))
        })
        .collect();
    Batch::from_rows(schema(&ids), &rows).unwrap()
}

pub fn ctx(vars: VarRegistry) -> ExecutionContext {
    ExecutionContext::new(Arc::new(vars))
}

/// Rewrite and run `patterns`, optionally over an outer context
pub async fn run(
    patterns: &[Pattern],
    registry: &ServiceRegistry,
    ctx: &ExecutionContext,
    outer: Option<Batch>,
) -> Result<Vec<BindingRow>> {
    let (plan, _) = rewrite_patterns(patterns, registry);
    let op = match outer {
        Some(batch) => build_seeded(batch, &plan)?,
        None => build_plan_operators(None, &plan)?,
    };
    let mut rows = collect_rows(op, ctx).await?;
    rows.sort();
    Ok(rows)
}

pub fn sorted(mut rows: Vec<BindingRow>) -> Vec<BindingRow> {
    rows.sort();
    rows
}

// ---------------------------------------------------------------------------
// Remote executors
// ---------------------------------------------------------------------------

/// Cursor over a fixed list of batches
pub struct VecCursor {
    batches: VecDeque<Batch>,
}

impl VecCursor {
    pub fn new(batches: Vec<Batch>) -> Self {
        Self {
            batches: batches.into(),
        }
    }
}

#[async_trait]
impl<E: Send + 'static> BindingCursor<E> for VecCursor {
    async fn next_batch(&mut self, _max_rows: usize) -> std::result::Result<Option<Batch>, E> {
        Ok(self.batches.pop_front())
    }
}

/// Remote executor that always fails and counts its calls
#[derive(Debug, Default)]
pub struct FailingRemote {
    pub calls: Mutex<usize>,
}

#[async_trait]
impl RemoteExecutor for FailingRemote {
    async fn execute(
        &self,
        request: RemoteRequest<'_>,
    ) -> std::result::Result<RemoteCursor, RemoteError> {
        *self.calls.lock().unwrap() += 1;
        Err(RemoteError::Unavailable(format!(
            "{} refused the connection",
            request.endpoint
        )))
    }
}

/// Remote executor answering every call with the same rows, recording
/// the requests it received
#[derive(Debug, Default)]
pub struct StaticRemote {
    pub rows: Vec<BindingRow>,
    pub requests: Mutex<Vec<(ServiceIri, Vec<Pattern>, BindingRow)>>,
}

#[async_trait]
impl RemoteExecutor for StaticRemote {
    async fn execute(
        &self,
        request: RemoteRequest<'_>,
    ) -> std::result::Result<RemoteCursor, RemoteError> {
        self.requests.lock().unwrap().push((
            request.endpoint.clone(),
            request.patterns.to_vec(),
            request.bindings.clone(),
        ));
        let batch = Batch::from_rows(request.schema.clone(), &self.rows)
            .map_err(|e| RemoteError::InvalidResponse(e.to_string()))?;
        Ok(Box::new(VecCursor::new(vec![batch])))
    }
}

// ---------------------------------------------------------------------------
// Datasets with unusual timing
// ---------------------------------------------------------------------------

/// Dataset whose transactions never finish opening
#[derive(Debug)]
pub struct StalledDataset;

#[async_trait]
impl Dataset for StalledDataset {
    fn name(&self) -> &str {
        "stalled"
    }

    async fn begin_read(&self) -> std::result::Result<Box<dyn ReadTransaction>, DatasetError> {
        std::future::pending().await
    }
}
