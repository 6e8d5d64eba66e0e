//! Binding types for query results
//!
//! This module contains:
//! - `Binding`: A bound (or unbound) value in a solution
//! - `BindingRow`: A standalone variable → term mapping (one solution)
//! - `Batch`: Columnar batch of solutions with a fixed schema
//! - `BatchBuilder`: Row-at-a-time batch construction
//! - `RowView`: Zero-copy view of a single row
//!
//! Solutions follow SPARQL bag semantics: a batch may contain duplicate rows
//! and row order carries no meaning.

use crate::var_registry::VarId;
use localfed_core::Term;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

/// A value in a solution - cheap to clone (Arc-backed strings)
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Binding {
    /// Variable is not bound in this solution
    Unbound,
    /// Variable is bound to a term
    Bound(Term),
}

impl Binding {
    pub fn is_bound(&self) -> bool {
        matches!(self, Binding::Bound(_))
    }

    pub fn as_term(&self) -> Option<&Term> {
        match self {
            Binding::Bound(t) => Some(t),
            Binding::Unbound => None,
        }
    }

    /// SPARQL compatibility: two bindings for the same variable are compatible
    /// when either is unbound or both are the same term.
    pub fn compatible_with(&self, other: &Binding) -> bool {
        match (self, other) {
            (Binding::Bound(a), Binding::Bound(b)) => a == b,
            _ => true,
        }
    }

    /// Pick the bound side of two compatible bindings
    pub fn merge(&self, other: &Binding) -> Binding {
        match self {
            Binding::Bound(_) => self.clone(),
            Binding::Unbound => other.clone(),
        }
    }
}

impl From<Term> for Binding {
    fn from(term: Term) -> Self {
        Binding::Bound(term)
    }
}

impl From<Option<Term>> for Binding {
    fn from(term: Option<Term>) -> Self {
        term.map_or(Binding::Unbound, Binding::Bound)
    }
}

/// One solution as a map from variable to bound term
///
/// Unbound variables are simply absent. Used at the edges (tests, result
/// handoff to callers) where a schema-free representation is convenient.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingRow(BTreeMap<VarId, Term>);

impl BindingRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a row from `(var, term)` pairs; later pairs win on duplicates
    pub fn from_pairs(pairs: impl IntoIterator<Item = (VarId, Term)>) -> Self {
        Self(pairs.into_iter().collect())
    }

    pub fn insert(&mut self, var: VarId, term: Term) -> Option<Term> {
        self.0.insert(var, term)
    }

    pub fn get(&self, var: VarId) -> Option<&Term> {
        self.0.get(&var)
    }

    pub fn contains(&self, var: VarId) -> bool {
        self.0.contains_key(&var)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn vars(&self) -> impl Iterator<Item = VarId> + '_ {
        self.0.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (VarId, &Term)> {
        self.0.iter().map(|(v, t)| (*v, t))
    }
}

/// Error type for batch operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BatchError {
    /// Column lengths don't match
    #[error("Column {column} has {got} rows, expected {expected}")]
    ColumnLengthMismatch {
        expected: usize,
        got: usize,
        column: usize,
    },
    /// Schema has duplicate VarIds
    #[error("Duplicate VarId {0:?} in schema")]
    DuplicateVarId(VarId),
    /// Schema length doesn't match columns length
    #[error("Schema has {schema_len} vars but {columns_len} columns provided")]
    SchemaColumnMismatch {
        schema_len: usize,
        columns_len: usize,
    },
}

/// A batch of solutions - columnar for efficient processing
///
/// # Invariants
///
/// - `columns.len() == schema.len()`
/// - All columns have exactly `len` elements
/// - Schema contains no duplicate VarIds
#[derive(Debug, Clone)]
pub struct Batch {
    len: usize,
    schema: Arc<[VarId]>,
    columns: Vec<Vec<Binding>>,
}

fn check_schema(schema: &[VarId]) -> Result<(), BatchError> {
    // Schemas are tiny, so O(n^2) is fine
    for (i, &var_id) in schema.iter().enumerate() {
        if schema.iter().take(i).any(|&v| v == var_id) {
            return Err(BatchError::DuplicateVarId(var_id));
        }
    }
    Ok(())
}

impl Batch {
    /// Create a new batch with schema, enforcing invariants
    pub fn new(schema: Arc<[VarId]>, columns: Vec<Vec<Binding>>) -> Result<Self, BatchError> {
        if schema.len() != columns.len() {
            return Err(BatchError::SchemaColumnMismatch {
                schema_len: schema.len(),
                columns_len: columns.len(),
            });
        }
        check_schema(&schema)?;

        let len = columns.first().map(|c| c.len()).unwrap_or(0);
        for (i, col) in columns.iter().enumerate() {
            if col.len() != len {
                return Err(BatchError::ColumnLengthMismatch {
                    expected: len,
                    got: col.len(),
                    column: i,
                });
            }
        }

        Ok(Self {
            len,
            schema,
            columns,
        })
    }

    /// Create an empty batch with given schema (zero rows)
    pub fn empty(schema: Arc<[VarId]>) -> Result<Self, BatchError> {
        let columns = schema.iter().map(|_| Vec::new()).collect();
        Self::new(schema, columns)
    }

    /// Create a batch with a single row
    pub fn single_row(schema: Arc<[VarId]>, row: Vec<Binding>) -> Result<Self, BatchError> {
        if schema.len() != row.len() {
            return Err(BatchError::SchemaColumnMismatch {
                schema_len: schema.len(),
                columns_len: row.len(),
            });
        }
        let columns = row.into_iter().map(|b| vec![b]).collect();
        Self::new(schema, columns)
    }

    /// A single empty solution (1 row, 0 columns).
    ///
    /// This is the identity for joins: the starting input of a query with no
    /// outer bindings. `Batch::new` with an empty schema would report `len=0`.
    pub fn single_empty() -> Self {
        Self {
            len: 1,
            schema: Arc::from(Vec::new().into_boxed_slice()),
            columns: Vec::new(),
        }
    }

    /// Build a batch from schema-free rows. Variables of a row that are not
    /// in `schema` are dropped; schema variables missing from a row are unbound.
    pub fn from_rows(schema: Arc<[VarId]>, rows: &[BindingRow]) -> Result<Self, BatchError> {
        let mut builder = BatchBuilder::new(schema)?;
        for row in rows {
            builder.push_binding_row(row);
        }
        Ok(builder.finish())
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Variables in column order
    pub fn schema(&self) -> &[VarId] {
        &self.schema
    }

    /// Shared handle to the schema
    pub fn schema_arc(&self) -> &Arc<[VarId]> {
        &self.schema
    }

    /// Get binding by VarId (linear scan over schema; schema is typically tiny)
    ///
    /// Returns None if VarId is not in schema or row is out of bounds.
    pub fn get(&self, row: usize, var: VarId) -> Option<&Binding> {
        let col_idx = self.schema.iter().position(|&v| v == var)?;
        self.columns.get(col_idx)?.get(row)
    }

    /// Get a column by VarId
    pub fn column(&self, var: VarId) -> Option<&[Binding]> {
        let col_idx = self.schema.iter().position(|&v| v == var)?;
        Some(&self.columns[col_idx])
    }

    /// View a single row without allocation
    pub fn row_view(&self, row: usize) -> Option<RowView<'_>> {
        if row < self.len {
            Some(RowView { batch: self, row })
        } else {
            None
        }
    }

    /// Iterate over rows as RowViews
    pub fn rows(&self) -> impl Iterator<Item = RowView<'_>> {
        (0..self.len).map(move |row| RowView { batch: self, row })
    }

    /// Convert every row to a schema-free `BindingRow`
    pub fn to_rows(&self) -> Vec<BindingRow> {
        self.rows().map(|r| r.to_binding_row()).collect()
    }
}

/// Zero-copy view of a single row in a batch
#[derive(Debug, Clone, Copy)]
pub struct RowView<'a> {
    batch: &'a Batch,
    row: usize,
}

impl<'a> RowView<'a> {
    /// Get binding by VarId
    pub fn get(&self, var: VarId) -> Option<&'a Binding> {
        self.batch.get(self.row, var)
    }

    /// Get the bound term for a VarId (None if absent or unbound)
    pub fn term(&self, var: VarId) -> Option<&'a Term> {
        self.get(var).and_then(Binding::as_term)
    }

    pub fn schema(&self) -> &'a [VarId] {
        self.batch.schema()
    }

    pub fn row_index(&self) -> usize {
        self.row
    }

    /// Convert to owned Vec of bindings in schema order
    pub fn to_vec(&self) -> Vec<Binding> {
        self.batch
            .columns
            .iter()
            .map(|col| col[self.row].clone())
            .collect()
    }

    /// Convert to a schema-free row (unbound variables omitted)
    pub fn to_binding_row(&self) -> BindingRow {
        BindingRow::from_pairs(
            self.batch
                .schema
                .iter()
                .zip(&self.batch.columns)
                .filter_map(|(&var, col)| col[self.row].as_term().map(|t| (var, t.clone()))),
        )
    }
}

/// Row-at-a-time builder for a fixed schema
#[derive(Debug)]
pub struct BatchBuilder {
    schema: Arc<[VarId]>,
    columns: Vec<Vec<Binding>>,
    len: usize,
}

impl BatchBuilder {
    pub fn new(schema: Arc<[VarId]>) -> Result<Self, BatchError> {
        check_schema(&schema)?;
        let columns = schema.iter().map(|_| Vec::new()).collect();
        Ok(Self {
            schema,
            columns,
            len: 0,
        })
    }

    pub fn schema(&self) -> &Arc<[VarId]> {
        &self.schema
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append a row given as bindings in schema order.
    ///
    /// Missing trailing bindings are filled with `Unbound`; extras are ignored.
    pub fn push_row(&mut self, row: impl IntoIterator<Item = Binding>) {
        let mut row = row.into_iter();
        for col in &mut self.columns {
            col.push(row.next().unwrap_or(Binding::Unbound));
        }
        self.len += 1;
    }

    /// Append a row by looking up each schema variable
    pub fn push_with(&mut self, mut lookup: impl FnMut(VarId) -> Binding) {
        for (col, &var) in self.columns.iter_mut().zip(self.schema.iter()) {
            col.push(lookup(var));
        }
        self.len += 1;
    }

    pub fn push_binding_row(&mut self, row: &BindingRow) {
        self.push_with(|var| Binding::from(row.get(var).cloned()));
    }

    /// Finish into a batch. An empty schema with rows yields a
    /// zero-column batch that still reports its row count.
    pub fn finish(self) -> Batch {
        Batch {
            len: self.len,
            schema: self.schema,
            columns: self.columns,
        }
    }
}
