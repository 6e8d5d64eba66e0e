//! # localfed core
//!
//! Runtime-agnostic core library for local SPARQL federation.
//!
//! This crate provides:
//! - Core types: `Term`, `Literal`, `Triple`
//! - Service identifiers: `ServiceIri` canonicalization and the local URN scheme
//! - `MemoryStore`: a copy-on-write in-memory triple store with pinned read snapshots
//!
//! ## Design Principles
//!
//! 1. **Runtime-agnostic**: No tokio; the async seam lives in `localfed-query`
//! 2. **Snapshot reads**: A reader sees one version of the data for its whole lifetime
//! 3. **Canonical identifiers**: Service names are compared after canonicalization only

pub mod error;
pub mod service_iri;
pub mod store;
pub mod term;

pub use error::{Error, Result};
pub use service_iri::{
    create_service_iri, extract_service_name, is_local_service_iri, ServiceIri,
    SERVICE_URI_PREFIX, SERVICE_URI_SCHEME,
};
pub use store::{MemoryStore, ReadSnapshot, Snapshot, SnapshotScan, WriteBatch};
pub use term::{xsd, Literal, Term, Triple, RDF_LANG_STRING};
