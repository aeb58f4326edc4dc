//! relwrite - batch-planned bulk writes, upserts, and cascading deletes.
//!
//! relwrite is the write path of a relational object mapper, extracted as a
//! standalone engine:
//!
//! - **Bulk create** splits pending rows into statements bounded by the
//!   backend's parameter budget and reads generated keys back where the
//!   backend can return them.
//! - **Conflict resolution** turns unique-constraint violations into
//!   skipped rows or in-place updates (upsert), validated against model
//!   metadata before any SQL exists.
//! - **Link management** mediates many-to-many membership with
//!   single-query adds and delta-only set semantics.
//! - **Cascading deletion** plans the full consequence of a delete across
//!   the relation graph - cascade, set-null/set-default sweeps, protect and
//!   restrict policies - then executes it in one transaction, children
//!   first.
//!
//! # Quick Start
//!
//! ```ignore
//! use relwrite::prelude::*;
//!
//! let mut engine = Engine::new();
//! engine.register_model::<Album>()?;
//! engine.register_model::<Track>()?;
//!
//! // Insert a thousand rows in as few statements as the backend allows,
//! // skipping rows that already exist.
//! engine
//!     .bulk_create(&mut albums)
//!     .ignore_conflicts()
//!     .execute(&cx, &conn)
//!     .await?;
//!
//! // Delete an album; tracks cascade, playlist entries are swept to NULL.
//! let outcome = engine.delete_instance(&cx, &conn, &album).await?;
//! println!("deleted {} rows", outcome.total);
//! ```
//!
//! # Design
//!
//! - **Plan before execute**: protection errors surface with nothing
//!   written; the deletion plan is fully validated data, not suspended
//!   side effects.
//! - **Explicit edges**: relation policies are enum-tagged metadata, not
//!   virtual dispatch.
//! - **Cancel-correct**: every operation takes a `Cx` and returns an
//!   `Outcome` via asupersync.

// Re-export all public types from sub-crates
pub use relwrite_core::{
    // asupersync re-exports
    Cx,
    Outcome,
    // Core types
    BackendFeatures,
    BlockingRef,
    ColumnInfo,
    ConfigError,
    Connection,
    Dialect,
    Error,
    FieldInfo,
    FromValue,
    IsolationLevel,
    LinkTableInfo,
    Model,
    OnDelete,
    ProtectedError,
    QueryError,
    QueryErrorKind,
    RelatedIds,
    RelationshipInfo,
    RelationshipKind,
    RestrictedError,
    Result,
    Row,
    SignalEvent,
    SignalHub,
    SignalKind,
    SqlType,
    TransactionOps,
    TypeError,
    UniqueConstraintInfo,
    UnsupportedError,
    Value,
};
pub use relwrite_engine::{
    BulkCreate, BulkUpdate, Collector, DeleteOutcome, DeletePlan, DeleteQuery, Engine,
    EngineConfig, LinkManager, RelationEdge, SchemaRegistry, SetDelta, TableMeta,
    FETCH_CHUNK_SIZE,
};
pub use relwrite_query::{
    batch_size, BatchPlan, BinaryOp, ConflictClause, DeleteBuilder, Expr, InsertManyBuilder,
    OnConflict, UpdateBuilder, DEFAULT_BATCH_SIZE,
};

/// Convenience prelude importing the commonly-used surface.
pub mod prelude {
    pub use crate::{
        Connection, Cx, Dialect, DeleteOutcome, DeleteQuery, Engine, EngineConfig, Error, Expr,
        FieldInfo, LinkTableInfo, Model, OnConflict, OnDelete, Outcome, RelatedIds, Result, Row,
        SignalHub, SignalKind, SqlType, UniqueConstraintInfo, Value,
    };
}
