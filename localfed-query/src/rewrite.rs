//! Plan rewriting: SERVICE resolution
//!
//! Walks the pattern IR and annotates every SERVICE node with its target:
//! `Local(handle)` when the endpoint is registered, `Remote` otherwise.
//! The registry is consulted once per node; the resolved node keeps the
//! handle it captured, so a later unregister does not affect it.
//!
//! Rewriting is pure: it does not open transactions or evaluate anything,
//! and for a fixed registry state the output is fully determined by the
//! input.

use crate::ir::{Pattern, ServicePattern};
use crate::plan::{PlanNode, ResolvedService, ServiceTarget};
use crate::registry::ServiceRegistry;

/// Diagnostic information collected during rewriting
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewriteDiagnostics {
    /// SERVICE nodes resolved to a local dataset
    pub local: usize,
    /// SERVICE nodes left to the remote executor
    pub remote: usize,
    /// SERVICE nodes found inside another SERVICE body
    pub nested: usize,
    /// Deepest SERVICE nesting seen (1 = top-level SERVICE only)
    pub max_depth: usize,
    /// Warnings generated during rewriting
    pub warnings: Vec<String>,
}

impl RewriteDiagnostics {
    pub fn services(&self) -> usize {
        self.local + self.remote
    }

    /// Add a warning message
    pub fn warn(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }
}

/// Resolve every SERVICE node in `patterns` against `registry`
///
/// Non-service patterns are carried over structurally. SERVICE bodies,
/// OPTIONAL groups and UNION branches are rewritten recursively,
/// depth-first.
pub fn rewrite_patterns(
    patterns: &[Pattern],
    registry: &ServiceRegistry,
) -> (Vec<PlanNode>, RewriteDiagnostics) {
    let mut diag = RewriteDiagnostics::default();
    let nodes = rewrite_all(patterns, registry, 0, &mut diag);
    if diag.services() > 0 {
        tracing::debug!(
            local = diag.local,
            remote = diag.remote,
            nested = diag.nested,
            max_depth = diag.max_depth,
            "resolved SERVICE nodes"
        );
    }
    (nodes, diag)
}

fn rewrite_all(
    patterns: &[Pattern],
    registry: &ServiceRegistry,
    depth: usize,
    diag: &mut RewriteDiagnostics,
) -> Vec<PlanNode> {
    patterns
        .iter()
        .map(|p| rewrite_one(p, registry, depth, diag))
        .collect()
}

fn rewrite_one(
    pattern: &Pattern,
    registry: &ServiceRegistry,
    depth: usize,
    diag: &mut RewriteDiagnostics,
) -> PlanNode {
    match pattern {
        Pattern::Triple(tp) => PlanNode::Triple(tp.clone()),
        Pattern::Optional(inner) => PlanNode::Optional(rewrite_all(inner, registry, depth, diag)),
        Pattern::Union(branches) => PlanNode::Union(
            branches
                .iter()
                .map(|b| rewrite_all(b, registry, depth, diag))
                .collect(),
        ),
        Pattern::Service(sp) => PlanNode::Service(rewrite_service(sp, registry, depth, diag)),
    }
}

fn rewrite_service(
    sp: &ServicePattern,
    registry: &ServiceRegistry,
    depth: usize,
    diag: &mut RewriteDiagnostics,
) -> ResolvedService {
    let target = match registry.resolve(&sp.endpoint) {
        Some(handle) => {
            tracing::debug!(service = %sp.endpoint, dataset = handle.name(), "SERVICE resolved locally");
            diag.local += 1;
            ServiceTarget::Local(handle)
        }
        None => {
            tracing::debug!(service = %sp.endpoint, "SERVICE not registered, using remote path");
            diag.remote += 1;
            ServiceTarget::Remote
        }
    };
    if depth > 0 {
        diag.nested += 1;
    }
    diag.max_depth = diag.max_depth.max(depth + 1);

    if target.is_local()
        && sp.patterns.iter().any(|p| {
            matches!(p, Pattern::Optional(_) | Pattern::Union(_)) && p.contains_service()
        })
    {
        diag.warn(format!(
            "SERVICE <{}> is local but nests a SERVICE inside OPTIONAL/UNION",
            sp.endpoint
        ));
    }

    ResolvedService {
        silent: sp.silent,
        endpoint: sp.endpoint.clone(),
        target,
        patterns: rewrite_all(&sp.patterns, registry, depth + 1, diag),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::DatasetHandle;
    use crate::memory::MemoryDataset;
    use crate::pattern::TriplePattern;
    use crate::var_registry::VarId;
    use localfed_core::{create_service_iri, MemoryStore, ServiceIri, Term};

    fn iri(name: &str) -> ServiceIri {
        create_service_iri(name).unwrap()
    }

    fn triple() -> Pattern {
        Pattern::Triple(TriplePattern::new(
            VarId(0),
            Term::iri("http://ex.org/p"),
            VarId(1),
        ))
    }

    fn service(name: &str, silent: bool, patterns: Vec<Pattern>) -> Pattern {
        Pattern::Service(ServicePattern::new(silent, iri(name), patterns))
    }

    fn registry_with(names: &[&str]) -> ServiceRegistry {
        let reg = ServiceRegistry::default();
        reg.initialize();
        for name in names {
            let ds = MemoryDataset::new(*name, MemoryStore::new());
            reg.register(iri(name), DatasetHandle::new(ds)).unwrap();
        }
        reg
    }

    fn as_service(node: &PlanNode) -> &ResolvedService {
        match node {
            PlanNode::Service(svc) => svc,
            other => panic!("expected service node, got {:?}", other),
        }
    }

    #[test]
    fn test_local_and_remote_classification() {
        let reg = registry_with(&["ds1"]);
        let patterns = vec![
            triple(),
            service("ds1", false, vec![triple()]),
            service("ds2", true, vec![triple()]),
        ];
        let (nodes, diag) = rewrite_patterns(&patterns, &reg);

        assert!(matches!(nodes[0], PlanNode::Triple(_)));
        assert!(as_service(&nodes[1]).target.is_local());
        let remote = as_service(&nodes[2]);
        assert!(!remote.target.is_local());
        assert!(remote.silent);
        assert_eq!(diag.local, 1);
        assert_eq!(diag.remote, 1);
        assert_eq!(diag.nested, 0);
    }

    #[test]
    fn test_nested_services_depth_first() {
        let reg = registry_with(&["outer", "inner"]);
        let patterns = vec![Pattern::Optional(vec![service(
            "outer",
            false,
            vec![triple(), service("inner", false, vec![triple()])],
        )])];
        let (nodes, diag) = rewrite_patterns(&patterns, &reg);

        let PlanNode::Optional(inner) = &nodes[0] else {
            panic!("expected optional");
        };
        let outer = as_service(&inner[0]);
        assert!(as_service(&outer.patterns[1]).target.is_local());
        assert_eq!(diag.local, 2);
        assert_eq!(diag.nested, 1);
        assert_eq!(diag.max_depth, 2);
    }

    #[test]
    fn test_inactive_registry_resolves_everything_remote() {
        let reg = ServiceRegistry::default();
        reg.register(iri("ds1"), DatasetHandle::new(MemoryDataset::new("ds1", MemoryStore::new())))
            .unwrap();
        let (nodes, diag) = rewrite_patterns(&[service("ds1", false, vec![triple()])], &reg);
        assert!(!as_service(&nodes[0]).target.is_local());
        assert_eq!(diag.remote, 1);
    }

    #[test]
    fn test_resolution_is_captured_at_rewrite_time() {
        let reg = registry_with(&["ds1"]);
        let (nodes, _) = rewrite_patterns(&[service("ds1", false, vec![triple()])], &reg);
        reg.unregister(&iri("ds1"));
        match &as_service(&nodes[0]).target {
            ServiceTarget::Local(h) => assert_eq!(h.name(), "ds1"),
            ServiceTarget::Remote => panic!("resolution changed after unregister"),
        }
    }

    #[test]
    fn test_rewrite_is_shape_preserving() {
        let reg = registry_with(&["ds1"]);
        let patterns = vec![
            triple(),
            Pattern::Union(vec![vec![triple()], vec![service("x", true, vec![triple()])]]),
            service("ds1", false, vec![Pattern::Optional(vec![triple()])]),
        ];
        let (nodes, _) = rewrite_patterns(&patterns, &reg);
        let lowered: Vec<Pattern> = nodes.iter().map(PlanNode::to_pattern).collect();
        assert_eq!(lowered, patterns);
    }

    #[test]
    fn test_warns_on_service_inside_local_optional() {
        let reg = registry_with(&["ds1"]);
        let patterns = vec![service(
            "ds1",
            false,
            vec![Pattern::Optional(vec![service("ds2", false, vec![triple()])])],
        )];
        let (_, diag) = rewrite_patterns(&patterns, &reg);
        assert_eq!(diag.warnings.len(), 1);
    }
}
