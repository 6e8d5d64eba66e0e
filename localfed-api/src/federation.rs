//! `LocalFederation`: registry lifecycle, registration and query execution

use crate::config::FederationConfig;
use crate::error::Result;
use futures::Stream;
use localfed_core::{create_service_iri, MemoryStore, ServiceIri, Triple};
use localfed_query::{
    build_plan_operators, build_seeded, collect_batches, into_stream, rewrite_patterns, Batch,
    BindingRow, CancellationFlag, DatasetHandle, ExecutionContext, MemoryDataset, Pattern,
    PlanNode, QueryError, Registration, RegistrationPolicy, RemoteExecutor, ServiceRegistry,
    UnsupportedRemote, VarRegistry,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Builder for [`LocalFederation`]
#[derive(Debug, Clone, Default)]
pub struct FederationBuilder {
    config: FederationConfig,
    remote: Option<Arc<dyn RemoteExecutor>>,
    registry: Option<Arc<ServiceRegistry>>,
}

impl FederationBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a config file with `LOCALFED_*` environment overrides applied
    pub fn from_config_file(path: impl AsRef<Path>) -> Result<Self> {
        let config = FederationConfig::load(path.as_ref())?.apply_env()?;
        Ok(Self::new().config(config))
    }

    pub fn config(mut self, config: FederationConfig) -> Self {
        self.config = config;
        self
    }

    pub fn registration_policy(mut self, policy: RegistrationPolicy) -> Self {
        self.config.registration_policy = policy;
        self
    }

    /// Rows per batch; values below 1 are raised to 1
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.config.batch_size = batch_size.max(1);
        self
    }

    pub fn query_timeout(mut self, timeout: Duration) -> Self {
        self.config.query_timeout_ms = Some(timeout.as_millis().max(1) as u64);
        self
    }

    pub fn auto_initialize(mut self, enabled: bool) -> Self {
        self.config.auto_initialize = enabled;
        self
    }

    /// Executor for SERVICE nodes that do not name a registered dataset
    pub fn remote_executor(mut self, remote: Arc<dyn RemoteExecutor>) -> Self {
        self.remote = Some(remote);
        self
    }

    /// Share an existing registry instead of creating one.
    ///
    /// The registry keeps its own policy; `registration_policy` is ignored.
    pub fn registry(mut self, registry: Arc<ServiceRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn build(self) -> LocalFederation {
        let registry = self.registry.unwrap_or_else(|| {
            Arc::new(
                ServiceRegistry::new(self.config.registration_policy)
                    .with_nonstandard_warning(self.config.warn_on_nonstandard_iri),
            )
        });
        let federation = LocalFederation {
            config: self.config,
            registry,
            remote: self.remote.unwrap_or_else(|| Arc::new(UnsupportedRemote)),
        };
        if federation.config.auto_initialize {
            federation.initialize();
        }
        federation
    }
}

/// Local SERVICE federation over a shared registry.
///
/// Cheap to clone; clones share the registry and remote executor.
#[derive(Debug, Clone)]
pub struct LocalFederation {
    config: FederationConfig,
    registry: Arc<ServiceRegistry>,
    remote: Arc<dyn RemoteExecutor>,
}

impl LocalFederation {
    pub fn builder() -> FederationBuilder {
        FederationBuilder::new()
    }

    pub fn new(config: FederationConfig) -> Self {
        FederationBuilder::new().config(config).build()
    }

    pub fn config(&self) -> &FederationConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.registry
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Activate local resolution. Returns false if already active.
    pub fn initialize(&self) -> bool {
        tracing::info!("initializing local federation");
        self.registry.initialize()
    }

    /// Deactivate local resolution and drop every registration.
    /// Returns false if not active.
    ///
    /// Queries already running keep the datasets they resolved.
    pub fn shutdown(&self) -> bool {
        tracing::info!("shutting down local federation");
        self.registry.shutdown()
    }

    pub fn is_initialized(&self) -> bool {
        self.registry.is_initialized()
    }

    // ------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------

    /// Register `handle` as a full dataset under the local id for `name`
    pub fn register_dataset(&self, name: &str, handle: DatasetHandle) -> Result<ServiceIri> {
        let id = create_service_iri(name)?;
        self.registry.register_dataset(id.clone(), handle)?;
        Ok(id)
    }

    /// Register `handle` as a single graph under the local id for `name`
    pub fn register_graph(&self, name: &str, handle: DatasetHandle) -> Result<ServiceIri> {
        let id = create_service_iri(name)?;
        self.registry.register_graph(id.clone(), handle)?;
        Ok(id)
    }

    /// Register an in-memory store as a dataset
    pub fn register_store(&self, name: &str, store: MemoryStore) -> Result<ServiceIri> {
        self.register_dataset(name, DatasetHandle::new(MemoryDataset::new(name, store)))
    }

    /// Register a graph holding `triples`
    pub fn register_graph_triples(
        &self,
        name: &str,
        triples: impl IntoIterator<Item = Triple>,
    ) -> Result<ServiceIri> {
        self.register_graph(
            name,
            DatasetHandle::new(MemoryDataset::from_triples(name, triples)),
        )
    }

    /// Register under an arbitrary identifier
    pub fn register_iri(&self, id: ServiceIri, handle: DatasetHandle) -> Result<Registration> {
        Ok(self.registry.register(id, handle)?)
    }

    /// Remove the registration for `name`. Returns true if one existed.
    pub fn unregister(&self, name: &str) -> Result<bool> {
        let id = create_service_iri(name)?;
        Ok(self.registry.unregister(&id))
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Execution context with this federation's batch size, deadline and
    /// remote executor
    pub fn context(&self, vars: Arc<VarRegistry>) -> ExecutionContext {
        let ctx = ExecutionContext::new(vars)
            .with_remote(self.remote.clone())
            .with_batch_size(self.config.batch_size);
        match self.config.query_timeout() {
            Some(timeout) => ctx.with_timeout(timeout),
            None => ctx,
        }
    }

    /// Resolve every SERVICE node in `patterns` against the registry
    pub fn plan(&self, patterns: &[Pattern]) -> Vec<PlanNode> {
        let (plan, diagnostics) = rewrite_patterns(patterns, &self.registry);
        for warning in &diagnostics.warnings {
            tracing::warn!(warning = %warning, "query plan warning");
        }
        plan
    }

    /// Run `patterns` to completion
    pub async fn execute(&self, patterns: &[Pattern], vars: Arc<VarRegistry>) -> Result<Vec<Batch>> {
        let ctx = self.context(vars);
        self.execute_with(patterns, &ctx, None).await
    }

    /// Run `patterns` to completion and return schema-free rows
    pub async fn execute_rows(
        &self,
        patterns: &[Pattern],
        vars: Arc<VarRegistry>,
    ) -> Result<Vec<BindingRow>> {
        let batches = self.execute(patterns, vars).await?;
        Ok(batches.iter().flat_map(Batch::to_rows).collect())
    }

    /// Run `patterns` under `ctx`, optionally correlated with an outer
    /// binding context
    pub async fn execute_with(
        &self,
        patterns: &[Pattern],
        ctx: &ExecutionContext,
        outer: Option<Batch>,
    ) -> Result<Vec<Batch>> {
        let plan = self.plan(patterns);
        let operator = match outer {
            Some(outer) => build_seeded(outer, &plan)?,
            None => build_plan_operators(None, &plan)?,
        };
        Ok(collect_batches(operator, ctx).await?)
    }

    /// Stream the results of `patterns`.
    ///
    /// The returned flag cancels the query; dropping the stream releases
    /// every read transaction it holds.
    pub fn stream(
        &self,
        patterns: &[Pattern],
        vars: Arc<VarRegistry>,
    ) -> Result<(
        impl Stream<Item = std::result::Result<Batch, QueryError>> + Send,
        CancellationFlag,
    )> {
        let flag = CancellationFlag::new();
        let ctx = self.context(vars).with_cancellation(flag.clone());
        let operator = build_plan_operators(None, &self.plan(patterns))?;
        Ok((into_stream(operator, ctx), flag))
    }
}
