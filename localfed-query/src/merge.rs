//! Binding merger
//!
//! Joins rows of a SERVICE call's inner sequence with the outer row that
//! seeded it, and decides when SILENT turns the call into a pass-through.

use crate::binding::{Binding, BindingRow, RowView};
use crate::var_registry::VarId;
use std::sync::Arc;

/// How one SERVICE call for one outer row ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InnerOutcome {
    /// The inner sequence ended after yielding at least one row
    Rows(usize),
    /// The inner sequence ended without yielding a row
    Empty,
    /// The call failed; any rows it yielded are discarded
    Failed,
}

impl InnerOutcome {
    pub fn finished(rows_seen: usize) -> Self {
        if rows_seen == 0 {
            InnerOutcome::Empty
        } else {
            InnerOutcome::Rows(rows_seen)
        }
    }

    /// SILENT masking: empty and failed calls share one pass-through path
    pub fn passes_through(self, silent: bool) -> bool {
        silent && matches!(self, InnerOutcome::Empty | InnerOutcome::Failed)
    }
}

/// Output schema of a SERVICE: the outer variables, then the service's own
/// variables that are new, in first-appearance order
pub fn merged_schema(outer: &[VarId], inner: &[VarId]) -> Arc<[VarId]> {
    let mut schema: Vec<VarId> = outer.to_vec();
    for v in inner {
        if !schema.contains(v) {
            schema.push(*v);
        }
    }
    Arc::from(schema.into_boxed_slice())
}

static UNBOUND: Binding = Binding::Unbound;

fn binding_of(row: RowView<'_>, var: VarId) -> &Binding {
    row.get(var).unwrap_or(&UNBOUND)
}

/// Join one outer row with one inner row.
///
/// Returns the merged row in `schema` order, or `None` if the rows disagree
/// on a shared variable. Outer bindings are never removed.
pub fn merge_rows(schema: &[VarId], outer: RowView<'_>, inner: RowView<'_>) -> Option<Vec<Binding>> {
    let mut out = Vec::with_capacity(schema.len());
    for &var in schema {
        let o = binding_of(outer, var);
        let i = binding_of(inner, var);
        if !o.compatible_with(i) {
            return None;
        }
        out.push(o.merge(i));
    }
    Some(out)
}

/// The outer row unchanged, with service-only variables unbound
pub fn pass_through(schema: &[VarId], outer: RowView<'_>) -> Vec<Binding> {
    schema.iter().map(|&var| binding_of(outer, var).clone()).collect()
}

/// Outer bindings for `vars` (the pre-bindings pushed into a SERVICE call)
pub fn seed_row(outer: RowView<'_>, vars: &[VarId]) -> BindingRow {
    BindingRow::from_pairs(
        vars.iter()
            .filter_map(|&v| outer.term(v).map(|t| (v, t.clone()))),
    )
}
