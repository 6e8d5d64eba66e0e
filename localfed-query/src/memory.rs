//! In-memory dataset backed by [`MemoryStore`]
//!
//! Evaluation is a seeded nested-loop index join: the solution being
//! extended carries the outer bindings from the start, so every scan uses
//! them as constants and unsatisfiable pre-bindings produce no work beyond
//! a failed index probe.
//!
//! The top-level pattern list is walked depth-first with an explicit stack,
//! one frame per depth. A triple pattern's frame pulls from a lazy index
//! scan, so solutions are produced on demand rather than materialized.
//! OPTIONAL and UNION groups are evaluated eagerly for the single partial
//! solution they extend.

use crate::binding::{Batch, BatchBuilder, BindingRow};
use crate::dataset::{BindingCursor, Dataset, DatasetCursor, DatasetError, ReadTransaction};
use crate::ir::Pattern;
use crate::pattern::{PatternTerm, TriplePattern};
use crate::var_registry::VarId;
use async_trait::async_trait;
use localfed_core::{MemoryStore, ReadSnapshot, SnapshotScan, Term, Triple};
use std::sync::Arc;

/// A named dataset over a [`MemoryStore`]
#[derive(Debug, Clone)]
pub struct MemoryDataset {
    name: Arc<str>,
    store: MemoryStore,
}

impl MemoryDataset {
    pub fn new(name: impl Into<Arc<str>>, store: MemoryStore) -> Self {
        Self {
            name: name.into(),
            store,
        }
    }

    /// Build a dataset holding `triples`
    pub fn from_triples(name: impl Into<Arc<str>>, triples: impl IntoIterator<Item = Triple>) -> Self {
        Self::new(name, MemoryStore::from_triples(triples))
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    /// Number of read transactions currently open against this dataset
    pub fn open_transactions(&self) -> usize {
        self.store.open_readers()
    }

    /// Number of read transactions opened over the dataset's lifetime
    pub fn transactions_opened(&self) -> u64 {
        self.store.reads_opened()
    }

    /// Make the next `n` transaction opens fail
    pub fn fail_next_reads(&self, n: usize) {
        self.store.fail_next_reads(n);
    }

    /// Let `n` more index scans succeed, then fail every scan
    pub fn fail_cursor_after(&self, n: usize) {
        self.store.fail_scans_after(n);
    }

    pub fn clear_faults(&self) {
        self.store.clear_faults();
    }
}

#[async_trait]
impl Dataset for MemoryDataset {
    fn name(&self) -> &str {
        &self.name
    }

    async fn begin_read(&self) -> Result<Box<dyn ReadTransaction>, DatasetError> {
        let snapshot = self.store.read()?;
        Ok(Box::new(MemoryReadTxn {
            snapshot: Arc::new(snapshot),
        }))
    }
}

/// Read transaction pinned to one store snapshot
#[derive(Debug)]
struct MemoryReadTxn {
    snapshot: Arc<ReadSnapshot>,
}

impl ReadTransaction for MemoryReadTxn {
    fn snapshot_id(&self) -> u64 {
        self.snapshot.version()
    }

    fn evaluate(
        &self,
        patterns: &[Pattern],
        seed: &BindingRow,
        schema: Arc<[VarId]>,
    ) -> Result<DatasetCursor, DatasetError> {
        if patterns.iter().any(Pattern::contains_service) {
            return Err(DatasetError::Unsupported(
                "SERVICE inside a local dataset group".to_string(),
            ));
        }
        Ok(Box::new(MemoryCursor {
            snapshot: self.snapshot.clone(),
            patterns: patterns.to_vec(),
            schema,
            stack: vec![Frame::Rows(vec![seed.clone()].into_iter())],
        }))
    }
}

/// Candidate solutions at one depth of the walk
enum Frame {
    /// Fixed list: the seed, or an OPTIONAL / UNION extension
    Rows(std::vec::IntoIter<BindingRow>),
    /// `base` extended by each triple of a lazy index scan
    Scan {
        scan: SnapshotScan,
        pattern: TriplePattern,
        base: BindingRow,
    },
}

impl Frame {
    fn open(
        snapshot: &ReadSnapshot,
        pattern: &Pattern,
        solution: BindingRow,
    ) -> Result<Self, DatasetError> {
        match pattern {
            Pattern::Triple(tp) => {
                let scan = snapshot.scan(
                    resolve(&tp.s, &solution),
                    resolve(&tp.p, &solution),
                    resolve(&tp.o, &solution),
                )?;
                Ok(Frame::Scan {
                    scan,
                    pattern: tp.clone(),
                    base: solution,
                })
            }
            other => Ok(Frame::Rows(extend(snapshot, other, &solution)?.into_iter())),
        }
    }

    fn next(&mut self) -> Option<BindingRow> {
        match self {
            Frame::Rows(rows) => rows.next(),
            Frame::Scan {
                scan,
                pattern,
                base,
            } => scan.find_map(|triple| bind_triple(pattern, base, &triple)),
        }
    }
}

/// Depth-first solution cursor.
///
/// `stack[k]` yields candidate solutions that have matched the first
/// `k` patterns.
struct MemoryCursor {
    snapshot: Arc<ReadSnapshot>,
    patterns: Vec<Pattern>,
    schema: Arc<[VarId]>,
    stack: Vec<Frame>,
}

impl MemoryCursor {
    fn next_solution(&mut self) -> Result<Option<BindingRow>, DatasetError> {
        loop {
            let depth = self.stack.len();
            let Some(top) = self.stack.last_mut() else {
                return Ok(None);
            };
            let Some(solution) = top.next() else {
                self.stack.pop();
                continue;
            };
            let matched = depth - 1;
            if matched == self.patterns.len() {
                return Ok(Some(solution));
            }
            let frame = Frame::open(&self.snapshot, &self.patterns[matched], solution)?;
            self.stack.push(frame);
        }
    }
}

#[async_trait]
impl BindingCursor<DatasetError> for MemoryCursor {
    async fn next_batch(&mut self, max_rows: usize) -> Result<Option<Batch>, DatasetError> {
        let mut builder = BatchBuilder::new(self.schema.clone())
            .map_err(|e| DatasetError::Other(e.to_string()))?;
        while builder.len() < max_rows.max(1) {
            match self.next_solution() {
                Ok(Some(solution)) => builder.push_binding_row(&solution),
                Ok(None) => break,
                Err(e) => {
                    self.stack.clear();
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

/// All extensions of `solution` by one pattern
fn extend(
    snapshot: &ReadSnapshot,
    pattern: &Pattern,
    solution: &BindingRow,
) -> Result<Vec<BindingRow>, DatasetError> {
    match pattern {
        Pattern::Triple(tp) => match_triple(snapshot, tp, solution),
        Pattern::Optional(inner) => {
            let found = eval_group(snapshot, inner, solution.clone())?;
            if found.is_empty() {
                Ok(vec![solution.clone()])
            } else {
                Ok(found)
            }
        }
        Pattern::Union(branches) => {
            let mut out = Vec::new();
            for branch in branches {
                out.extend(eval_group(snapshot, branch, solution.clone())?);
            }
            Ok(out)
        }
        Pattern::Service(sp) => Err(DatasetError::Unsupported(format!(
            "nested SERVICE <{}>",
            sp.endpoint
        ))),
    }
}

fn eval_group(
    snapshot: &ReadSnapshot,
    patterns: &[Pattern],
    seed: BindingRow,
) -> Result<Vec<BindingRow>, DatasetError> {
    let mut solutions = vec![seed];
    for pattern in patterns {
        let mut next = Vec::new();
        for solution in &solutions {
            next.extend(extend(snapshot, pattern, solution)?);
        }
        if next.is_empty() {
            return Ok(next);
        }
        solutions = next;
    }
    Ok(solutions)
}

fn resolve<'a>(pos: &'a PatternTerm, solution: &'a BindingRow) -> Option<&'a Term> {
    match pos {
        PatternTerm::Const(t) => Some(t),
        PatternTerm::Var(v) => solution.get(*v),
    }
}

fn match_triple(
    snapshot: &ReadSnapshot,
    tp: &TriplePattern,
    solution: &BindingRow,
) -> Result<Vec<BindingRow>, DatasetError> {
    let scan = snapshot.scan(
        resolve(&tp.s, solution),
        resolve(&tp.p, solution),
        resolve(&tp.o, solution),
    )?;
    Ok(scan
        .filter_map(|triple| bind_triple(tp, solution, &triple))
        .collect())
}

/// `solution` extended with the pattern variables bound by `triple`
fn bind_triple(tp: &TriplePattern, solution: &BindingRow, triple: &Triple) -> Option<BindingRow> {
    let mut extended = solution.clone();
    for (pos, value) in [(&tp.s, &triple.s), (&tp.p, &triple.p), (&tp.o, &triple.o)] {
        if let PatternTerm::Var(v) = pos {
            // A variable repeated within one pattern must bind consistently
            match extended.get(*v) {
                Some(bound) if bound != value => return None,
                Some(_) => {}
                None => {
                    extended.insert(*v, value.clone());
                }
            }
        }
    }
    Some(extended)
}
