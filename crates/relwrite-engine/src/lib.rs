//! Bulk-write and cascade-delete engine for relwrite.
//!
//! `relwrite-engine` is the **operational layer**. It owns the schema
//! registry (tables plus relation edges), the lifecycle signal hub, and the
//! three write-path operations:
//!
//! - **Bulk create**: batch-planned multi-row inserts with conflict
//!   handling and generated-key read-back ([`BulkCreate`]).
//! - **Link management**: many-to-many add/remove/set/clear over a join
//!   table ([`LinkManager`]).
//! - **Cascading deletion**: plan/validate/execute over the relation graph
//!   ([`Collector`], [`DeletePlan`]).
//!
//! # Example
//!
//! ```ignore
//! let mut engine = Engine::new();
//! engine.register_model::<Album>()?;
//! engine.register_model::<Track>()?;
//!
//! // Insert new rows in as few statements as the backend allows.
//! engine.bulk_create(&mut albums).execute(&cx, &conn).await?;
//!
//! // Cascade-delete an album and everything referencing it.
//! let outcome = engine.delete_instance(&cx, &conn, &album).await?;
//! ```

pub mod bulk;
pub mod collector;
pub mod links;
pub mod registry;

#[cfg(test)]
pub(crate) mod testing;

pub use bulk::{BulkCreate, BulkUpdate};
pub use collector::{Collector, DeleteOutcome, DeletePlan, DeleteQuery, FETCH_CHUNK_SIZE};
pub use links::{LinkManager, SetDelta};
pub use registry::{RelationEdge, SchemaRegistry, TableMeta};

use asupersync::{Cx, Outcome};
use relwrite_core::{
    Connection, Error, LinkTableInfo, Model, Result, SignalHub, Value,
};

/// Engine-level tunables.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Cap on rows per bulk-insert statement; `None` lets the parameter
    /// budget decide.
    pub batch_size: Option<usize>,
    /// Rows fetched per SELECT while the collector walks relations.
    pub fetch_chunk_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_size: None,
            fetch_chunk_size: FETCH_CHUNK_SIZE,
        }
    }
}

/// The write-path engine: registry, signals, and operation entry points.
#[derive(Debug, Default)]
pub struct Engine {
    registry: SchemaRegistry,
    signals: SignalHub,
    config: EngineConfig,
}

impl Engine {
    /// Create an engine with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an engine with the given configuration.
    #[must_use]
    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            registry: SchemaRegistry::new(),
            signals: SignalHub::new(),
            config,
        }
    }

    /// Register a model's table and relation edges.
    #[allow(clippy::result_large_err)]
    pub fn register_model<M: Model>(&mut self) -> Result<()> {
        self.registry.register_model::<M>()
    }

    /// The schema registry.
    #[must_use]
    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// The signal hub, for inspection.
    #[must_use]
    pub fn signals(&self) -> &SignalHub {
        &self.signals
    }

    /// The signal hub, for connecting receivers.
    pub fn signals_mut(&mut self) -> &mut SignalHub {
        &mut self.signals
    }

    /// Start a bulk insert of the given instances.
    pub fn bulk_create<'s, M: Model + Clone>(
        &'s self,
        objs: &'s mut [M],
    ) -> BulkCreate<'s, 's, M> {
        let mut bulk = BulkCreate::new(objs, &self.signals);
        if let Some(size) = self.config.batch_size {
            bulk = bulk.batch_size(size);
        }
        bulk
    }

    /// Start a deletion collector.
    #[must_use]
    pub fn collector(&self) -> Collector<'_> {
        Collector::new(&self.registry, &self.signals)
            .fetch_chunk_size(self.config.fetch_chunk_size)
    }

    /// A link manager for the given join table and source primary key.
    pub fn link_manager(&self, link: LinkTableInfo, source_pk: impl Into<Value>) -> LinkManager<'_> {
        LinkManager::new(link, source_pk)
    }

    /// Delete a single instance and everything cascading from it.
    pub async fn delete_instance<M: Model, C: Connection>(
        &self,
        cx: &Cx,
        conn: &C,
        obj: &M,
    ) -> Outcome<DeleteOutcome, Error> {
        let mut collector = self.collector();
        if let Err(e) = collector.add_instance(obj) {
            return Outcome::Err(e);
        }
        match collector.build_plan(cx, conn).await {
            Outcome::Ok(plan) => plan.execute(cx, conn).await,
            Outcome::Err(e) => Outcome::Err(e),
            Outcome::Cancelled(r) => Outcome::Cancelled(r),
            Outcome::Panicked(p) => Outcome::Panicked(p),
        }
    }

    /// Delete the rows matched by a query and everything cascading from
    /// them.
    pub async fn delete_query<C: Connection>(
        &self,
        cx: &Cx,
        conn: &C,
        query: DeleteQuery,
    ) -> Outcome<DeleteOutcome, Error> {
        let mut collector = self.collector();
        if let Err(e) = collector.add_query(query) {
            return Outcome::Err(e);
        }
        match collector.build_plan(cx, conn).await {
            Outcome::Ok(plan) => plan.execute(cx, conn).await,
            Outcome::Err(e) => Outcome::Err(e),
            Outcome::Cancelled(r) => Outcome::Cancelled(r),
            Outcome::Panicked(p) => Outcome::Panicked(p),
        }
    }
}
