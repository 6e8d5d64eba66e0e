//! # localfed query
//!
//! Local SERVICE federation for SPARQL-style query plans.
//!
//! SERVICE nodes whose endpoint names a locally registered dataset are
//! evaluated in-process, inside a read transaction on that dataset, with the
//! outer solution's bindings pushed down into the evaluation. All other
//! SERVICE nodes go to a pluggable remote executor. Both paths produce the
//! same binding shape and follow the same SILENT contract.
//!
//! ## Pipeline
//!
//! ```text
//! Vec<Pattern> --rewrite_patterns(registry)--> Vec<PlanNode>
//!              --build_plan_operators--------> ServiceOperator chain
//!              --collect_batches / into_stream--> Batch*
//! ```
//!
//! ## Modules
//!
//! - [`registry`]: concurrent map from service IRI to dataset handle
//! - [`rewrite`]: pure plan rewriter resolving SERVICE targets
//! - [`dataset`], [`memory`]: dataset capability traits and the in-memory dataset
//! - [`local`]: read-transaction ownership for local evaluation
//! - [`merge`]: join of inner rows with the outer row, SILENT pass-through
//! - [`service`]: the correlated SERVICE operator
//! - [`remote`]: remote fallback boundary

pub mod binding;
pub mod context;
pub mod dataset;
pub mod error;
pub mod execute;
pub mod ir;
pub mod local;
pub mod memory;
pub mod merge;
pub mod operator;
pub mod pattern;
pub mod plan;
pub mod registry;
pub mod remote;
pub mod rewrite;
pub mod scan;
pub mod seed;
pub mod service;
pub mod var_registry;

pub use binding::{Batch, BatchBuilder, Binding, BindingRow, RowView};
pub use context::{CancellationFlag, ExecutionContext, DEFAULT_BATCH_SIZE};
pub use dataset::{BindingCursor, Dataset, DatasetCursor, DatasetError, DatasetHandle, ReadTransaction};
pub use error::{QueryError, Result};
pub use execute::{build_plan_operators, build_seeded, collect_batches, collect_rows, into_stream};
pub use ir::{Pattern, ServicePattern};
pub use local::{LocalEvaluator, TxnGuard};
pub use memory::MemoryDataset;
pub use merge::InnerOutcome;
pub use operator::{BoxedOperator, Operator, OperatorState};
pub use pattern::{PatternTerm, TriplePattern};
pub use plan::{PlanNode, ResolvedService, ServiceTarget};
pub use registry::{Registration, RegistrationPolicy, RegistryError, ServiceKind, ServiceRegistry};
pub use remote::{RemoteCursor, RemoteError, RemoteExecutor, RemoteRequest, UnsupportedRemote};
pub use rewrite::{rewrite_patterns, RewriteDiagnostics};
pub use seed::{EmptyOperator, SeedOperator};
pub use service::ServiceOperator;
pub use var_registry::{VarId, VarRegistry};
