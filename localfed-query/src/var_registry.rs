//! Variable registry for query execution
//!
//! Maps variable names (e.g., "?x", "$name") to compact `VarId` indices
//! used throughout the federation pipeline. The outer query and every
//! SERVICE sub-pattern share one registry, so a variable that appears on
//! both sides of a SERVICE boundary has one `VarId`; that is what makes
//! shared-variable joins and pre-binding push-down a matter of comparing ids.

use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;

/// Compact variable identifier - index into the registry
///
/// u16 supports up to 65K variables per query (sufficient for any realistic query).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(pub u16);

impl VarId {
    /// Get the underlying index value
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "?v{}", self.0)
    }
}

/// `?x` and `$x` name the same variable; the registry stores the bare name.
fn bare_name(name: &str) -> &str {
    name.strip_prefix('?')
        .or_else(|| name.strip_prefix('$'))
        .unwrap_or(name)
}

/// Registry mapping variable names to compact VarId indices
#[derive(Debug, Default, Clone)]
pub struct VarRegistry {
    name_to_id: FxHashMap<Arc<str>, VarId>,
    id_to_name: Vec<Arc<str>>,
}

impl VarRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Get existing VarId or insert a new one
    ///
    /// # Panics
    ///
    /// Panics if more than `u16::MAX` distinct variables are registered.
    /// This only happens while building a plan, never during execution.
    pub fn get_or_insert(&mut self, name: &str) -> VarId {
        let name = bare_name(name);
        if let Some(&id) = self.name_to_id.get(name) {
            return id;
        }

        if self.id_to_name.len() >= (u16::MAX as usize) {
            panic!(
                "VarRegistry capacity exceeded ({}). VarId is u16; refusing to wrap.",
                self.id_to_name.len()
            );
        }

        let id = VarId(self.id_to_name.len() as u16);
        let arc_name: Arc<str> = Arc::from(name);
        self.name_to_id.insert(arc_name.clone(), id);
        self.id_to_name.push(arc_name);
        id
    }

    /// Get the VarId for a name, if it exists
    pub fn get(&self, name: &str) -> Option<VarId> {
        self.name_to_id.get(bare_name(name)).copied()
    }

    /// Get the bare name for a VarId, returning None if invalid
    pub fn name(&self, id: VarId) -> Option<&str> {
        self.id_to_name.get(id.index()).map(|s| s.as_ref())
    }

    /// Get the number of registered variables
    pub fn len(&self) -> usize {
        self.id_to_name.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.id_to_name.is_empty()
    }

    /// Iterate over all (name, VarId) pairs
    pub fn iter(&self) -> impl Iterator<Item = (&str, VarId)> {
        self.id_to_name
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_ref(), VarId(i as u16)))
    }
}
