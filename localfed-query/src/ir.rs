//! Logical pattern IR as produced by the parser/planner
//!
//! This is the input of the plan rewriter. It mirrors the WHERE clause
//! structure; ordering of patterns is preserved but carries no semantic
//! weight beyond binding flow (joins are commutative under bag semantics).

use crate::pattern::TriplePattern;
use crate::var_registry::VarId;
use localfed_core::ServiceIri;

// ============================================================================
// Service Pattern
// ============================================================================

/// Service pattern for executing patterns against a named service.
///
/// SPARQL: `SERVICE <endpoint> { ... }` or `SERVICE SILENT <endpoint> { ... }`
///
/// # Semantics
///
/// - If the endpoint names a locally registered dataset, the patterns run
///   in-process against that dataset; otherwise they go to the remote executor
/// - Results are joined with the outer solution on shared variables
/// - If `silent` is true, an empty or failed service call passes the outer
///   solution through unchanged instead of failing the query
#[derive(Debug, Clone, PartialEq)]
pub struct ServicePattern {
    /// Whether SERVICE SILENT was specified
    pub silent: bool,
    /// The service endpoint (canonicalized)
    pub endpoint: ServiceIri,
    /// The patterns to execute at the service
    pub patterns: Vec<Pattern>,
}

impl ServicePattern {
    pub fn new(silent: bool, endpoint: ServiceIri, patterns: Vec<Pattern>) -> Self {
        Self {
            silent,
            endpoint,
            patterns,
        }
    }

    /// Get all variables referenced by this pattern
    pub fn variables(&self) -> Vec<VarId> {
        self.patterns.iter().flat_map(|p| p.variables()).collect()
    }
}

// ============================================================================
// Pattern Enum
// ============================================================================

/// Logical pattern IR - mirrors where clause structure
#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    /// A basic triple pattern (subject, predicate, object)
    Triple(TriplePattern),

    /// Optional clause - left join semantics
    Optional(Vec<Pattern>),

    /// Union of pattern branches - any branch may match
    Union(Vec<Vec<Pattern>>),

    /// Service pattern - patterns addressed to a named service
    Service(ServicePattern),
}

impl Pattern {
    pub fn is_triple(&self) -> bool {
        matches!(self, Pattern::Triple(_))
    }

    pub fn as_triple(&self) -> Option<&TriplePattern> {
        match self {
            Pattern::Triple(tp) => Some(tp),
            _ => None,
        }
    }

    /// Get all variables referenced by this pattern (may repeat)
    pub fn variables(&self) -> Vec<VarId> {
        match self {
            Pattern::Triple(tp) => tp.variables(),
            Pattern::Optional(inner) => inner.iter().flat_map(|p| p.variables()).collect(),
            Pattern::Union(branches) => branches
                .iter()
                .flat_map(|branch| branch.iter().flat_map(|p| p.variables()))
                .collect(),
            Pattern::Service(sp) => sp.variables(),
        }
    }

    /// True if this pattern or anything nested in it is a SERVICE
    pub fn contains_service(&self) -> bool {
        match self {
            Pattern::Triple(_) => false,
            Pattern::Optional(inner) => inner.iter().any(Pattern::contains_service),
            Pattern::Union(branches) => branches
                .iter()
                .any(|b| b.iter().any(Pattern::contains_service)),
            Pattern::Service(_) => true,
        }
    }
}
