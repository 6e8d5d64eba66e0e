//! Resolved plan tree
//!
//! Output of the plan rewriter: the pattern IR with every SERVICE node
//! annotated with where it will run. Non-service nodes keep their shape.

use crate::dataset::DatasetHandle;
use crate::ir::{Pattern, ServicePattern};
use crate::pattern::TriplePattern;
use crate::var_registry::VarId;
use localfed_core::ServiceIri;
use std::fmt;

/// Where a SERVICE node is evaluated
#[derive(Clone)]
pub enum ServiceTarget {
    /// In-process, against the captured dataset handle
    Local(DatasetHandle),
    /// Handed to the remote executor
    Remote,
}

impl ServiceTarget {
    pub fn is_local(&self) -> bool {
        matches!(self, ServiceTarget::Local(_))
    }

    /// Short label for logs and spans
    pub fn label(&self) -> &'static str {
        match self {
            ServiceTarget::Local(_) => "local",
            ServiceTarget::Remote => "remote",
        }
    }
}

impl fmt::Debug for ServiceTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceTarget::Local(h) => f.debug_tuple("Local").field(&h.name()).finish(),
            ServiceTarget::Remote => f.write_str("Remote"),
        }
    }
}

/// A SERVICE node with its resolution outcome
#[derive(Debug, Clone)]
pub struct ResolvedService {
    pub silent: bool,
    pub endpoint: ServiceIri,
    pub target: ServiceTarget,
    /// Rewritten sub-pattern
    pub patterns: Vec<PlanNode>,
}

impl ResolvedService {
    pub fn variables(&self) -> Vec<VarId> {
        self.patterns.iter().flat_map(PlanNode::variables).collect()
    }

    /// The sub-pattern in parser IR form, as handed to a remote endpoint
    pub fn to_service_pattern(&self) -> ServicePattern {
        ServicePattern::new(
            self.silent,
            self.endpoint.clone(),
            lower_all(&self.patterns),
        )
    }
}

/// Node of a resolved plan
#[derive(Debug, Clone)]
pub enum PlanNode {
    Triple(TriplePattern),
    Optional(Vec<PlanNode>),
    Union(Vec<Vec<PlanNode>>),
    Service(ResolvedService),
}

impl PlanNode {
    pub fn variables(&self) -> Vec<VarId> {
        match self {
            PlanNode::Triple(tp) => tp.variables(),
            PlanNode::Optional(inner) => inner.iter().flat_map(PlanNode::variables).collect(),
            PlanNode::Union(branches) => branches
                .iter()
                .flat_map(|b| b.iter().flat_map(PlanNode::variables))
                .collect(),
            PlanNode::Service(svc) => svc.variables(),
        }
    }

    pub fn contains_service(&self) -> bool {
        match self {
            PlanNode::Triple(_) => false,
            PlanNode::Optional(inner) => inner.iter().any(PlanNode::contains_service),
            PlanNode::Union(branches) => branches
                .iter()
                .any(|b| b.iter().any(PlanNode::contains_service)),
            PlanNode::Service(_) => true,
        }
    }

    /// Drop resolution annotations, giving back the parser IR shape
    pub fn to_pattern(&self) -> Pattern {
        match self {
            PlanNode::Triple(tp) => Pattern::Triple(tp.clone()),
            PlanNode::Optional(inner) => Pattern::Optional(lower_all(inner)),
            PlanNode::Union(branches) => {
                Pattern::Union(branches.iter().map(|b| lower_all(b)).collect())
            }
            PlanNode::Service(svc) => Pattern::Service(svc.to_service_pattern()),
        }
    }
}

pub fn lower_all(nodes: &[PlanNode]) -> Vec<Pattern> {
    nodes.iter().map(PlanNode::to_pattern).collect()
}

/// Variables in first-appearance order, without duplicates
pub fn distinct_vars(vars: impl IntoIterator<Item = VarId>) -> Vec<VarId> {
    let mut out: Vec<VarId> = Vec::new();
    for v in vars {
        if !out.contains(&v) {
            out.push(v);
        }
    }
    out
}
