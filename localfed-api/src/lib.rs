//! # localfed API
//!
//! Embedding surface for local SERVICE federation.
//!
//! ```no_run
//! use localfed_api::{FederationBuilder, FederationConfig};
//! use localfed_core::MemoryStore;
//!
//! # fn main() -> localfed_api::Result<()> {
//! let federation = FederationBuilder::new()
//!     .config(FederationConfig::default().apply_env()?)
//!     .build();
//! federation.register_store("people", MemoryStore::new())?;
//! # Ok(())
//! # }
//! ```
//!
//! A federation owns a [`ServiceRegistry`](localfed_query::ServiceRegistry).
//! Datasets registered under `urn:localfed:service:<name>` are evaluated
//! in-process when a query names them in a SERVICE clause; everything else
//! goes to the configured remote executor.

pub mod config;
pub mod error;
pub mod federation;

pub use config::FederationConfig;
pub use error::{ApiError, ConfigError, Result};
pub use federation::{FederationBuilder, LocalFederation};
