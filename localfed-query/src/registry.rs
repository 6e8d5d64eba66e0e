//! Registry of locally addressable datasets
//!
//! Maps canonical [`ServiceIri`]s to [`DatasetHandle`]s. The registry is an
//! explicit object handed to the rewriter; there is no process-global
//! instance.
//!
//! # Concurrency
//!
//! Backed by a sharded `DashMap`: lookups never block each other, and a
//! writer only locks the shard holding its key. Entries are `Arc`-shared
//! handles, so a lookup either sees the complete previous entry or the
//! complete new one. A handle returned by a lookup stays valid after the
//! entry is removed.
//!
//! # Lifecycle
//!
//! The registry starts inactive. While inactive, [`resolve`](ServiceRegistry::resolve)
//! misses for every identifier, so all SERVICE nodes fall through to the
//! remote path. [`shutdown`](ServiceRegistry::shutdown) deactivates and
//! clears all entries.

use crate::dataset::DatasetHandle;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use localfed_core::ServiceIri;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

/// Registry errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The identifier is already mapped and the policy is `Strict`
    #[error("Service already registered: {0}")]
    DuplicateRegistration(ServiceIri),
}

/// What to do when registering an identifier that is already mapped
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationPolicy {
    /// Reject with [`RegistryError::DuplicateRegistration`]
    #[default]
    Strict,
    /// Replace the existing mapping atomically
    Replace,
}

/// Outcome of a successful registration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// The identifier was not mapped before
    Inserted,
    /// A different handle was mapped and has been replaced
    Replaced,
    /// The very same handle was already mapped; nothing changed
    /// (replace policy only)
    Unchanged,
}

/// What kind of local source an entry refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceKind {
    /// A full dataset (default graph plus named graphs)
    Dataset,
    /// A single graph exposed as a dataset's default graph
    Graph,
}

#[derive(Debug, Clone)]
struct RegistryEntry {
    handle: DatasetHandle,
    kind: ServiceKind,
}

/// Concurrent registry of local datasets
#[derive(Debug)]
pub struct ServiceRegistry {
    entries: DashMap<ServiceIri, RegistryEntry>,
    policy: RegistrationPolicy,
    initialized: AtomicBool,
    warn_on_nonstandard: bool,
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new(RegistrationPolicy::default())
    }
}

impl ServiceRegistry {
    /// Create an inactive, empty registry
    pub fn new(policy: RegistrationPolicy) -> Self {
        Self {
            entries: DashMap::new(),
            policy,
            initialized: AtomicBool::new(false),
            warn_on_nonstandard: true,
        }
    }

    /// Whether identifiers outside the local URN scheme log a warning on
    /// registration (default: true)
    pub fn with_nonstandard_warning(mut self, warn: bool) -> Self {
        self.warn_on_nonstandard = warn;
        self
    }

    pub fn policy(&self) -> RegistrationPolicy {
        self.policy
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Activate the registry. Returns false (and logs) if already active.
    pub fn initialize(&self) -> bool {
        if self.initialized.swap(true, Ordering::AcqRel) {
            tracing::warn!("service registry already initialized");
            return false;
        }
        tracing::info!(services = self.entries.len(), "service registry initialized");
        true
    }

    /// Deactivate the registry and drop every entry.
    ///
    /// Returns false (and logs) if it was not active. In-flight evaluations
    /// keep the handles they already captured.
    pub fn shutdown(&self) -> bool {
        if !self.initialized.swap(false, Ordering::AcqRel) {
            tracing::warn!("service registry not initialized, ignoring shutdown");
            return false;
        }
        let dropped = self.entries.len();
        self.entries.clear();
        tracing::info!(dropped, "service registry shut down");
        true
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// Register a full dataset under `id`
    pub fn register_dataset(
        &self,
        id: ServiceIri,
        handle: DatasetHandle,
    ) -> Result<Registration, RegistryError> {
        self.register_kind(id, handle, ServiceKind::Dataset)
    }

    /// Register a single graph under `id`
    pub fn register_graph(
        &self,
        id: ServiceIri,
        handle: DatasetHandle,
    ) -> Result<Registration, RegistryError> {
        self.register_kind(id, handle, ServiceKind::Graph)
    }

    /// Register `handle` under `id` as a dataset, honoring the policy
    pub fn register(
        &self,
        id: ServiceIri,
        handle: DatasetHandle,
    ) -> Result<Registration, RegistryError> {
        self.register_dataset(id, handle)
    }

    fn register_kind(
        &self,
        id: ServiceIri,
        handle: DatasetHandle,
        kind: ServiceKind,
    ) -> Result<Registration, RegistryError> {
        if self.warn_on_nonstandard && !id.is_local_scheme() {
            tracing::warn!(
                service = %id,
                "service IRI does not use the local scheme {}",
                localfed_core::SERVICE_URI_PREFIX
            );
        }

        let entry = RegistryEntry { handle, kind };
        let outcome = match self.entries.entry(id.clone()) {
            Entry::Vacant(vacant) => {
                vacant.insert(entry);
                Registration::Inserted
            }
            Entry::Occupied(mut occupied) => {
                if self.policy == RegistrationPolicy::Strict {
                    return Err(RegistryError::DuplicateRegistration(id));
                }
                let existing = occupied.get();
                if existing.handle.ptr_eq(&entry.handle) && existing.kind == kind {
                    Registration::Unchanged
                } else {
                    occupied.insert(entry);
                    Registration::Replaced
                }
            }
        };

        match outcome {
            Registration::Unchanged => {
                tracing::debug!(service = %id, "service already registered with the same handle")
            }
            _ => tracing::info!(service = %id, ?kind, ?outcome, "registered local service"),
        }
        Ok(outcome)
    }

    /// Remove the mapping for `id`. Returns true if one was removed.
    pub fn unregister(&self, id: &ServiceIri) -> bool {
        let removed = self.entries.remove(id).is_some();
        if removed {
            tracing::info!(service = %id, "unregistered local service");
        } else {
            tracing::debug!(service = %id, "unregister: service not registered");
        }
        removed
    }

    /// Remove every entry (the registry stays active)
    pub fn clear(&self) {
        let dropped = self.entries.len();
        self.entries.clear();
        tracing::info!(dropped, "cleared service registry");
    }

    // ------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------

    /// Raw lookup, independent of the lifecycle state
    pub fn lookup(&self, id: &ServiceIri) -> Option<DatasetHandle> {
        self.entries.get(id).map(|e| e.handle.clone())
    }

    /// Lookup used for plan rewriting: misses while the registry is inactive
    pub fn resolve(&self, id: &ServiceIri) -> Option<DatasetHandle> {
        if !self.is_initialized() {
            tracing::debug!(service = %id, "service registry inactive, treating as remote");
            return None;
        }
        self.lookup(id)
    }

    pub fn kind(&self, id: &ServiceIri) -> Option<ServiceKind> {
        self.entries.get(id).map(|e| e.kind)
    }

    pub fn is_registered(&self, id: &ServiceIri) -> bool {
        self.entries.contains_key(id)
    }

    /// All registered identifiers, sorted
    pub fn registered_services(&self) -> BTreeSet<ServiceIri> {
        self.entries.iter().map(|e| e.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dataset_count(&self) -> usize {
        self.count_kind(ServiceKind::Dataset)
    }

    pub fn graph_count(&self) -> usize {
        self.count_kind(ServiceKind::Graph)
    }

    fn count_kind(&self, kind: ServiceKind) -> usize {
        self.entries.iter().filter(|e| e.kind == kind).count()
    }
}
