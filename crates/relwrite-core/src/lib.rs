//! Core types and traits for relwrite.
//!
//! This crate provides the foundational abstractions for the bulk-write and
//! cascade-delete engine:
//!
//! - `Model` trait for table-mapped structs
//! - `FieldInfo` / `OnDelete` column and edge metadata
//! - `Connection` trait for database backends
//! - `Dialect` / `BackendFeatures` capability flags
//! - `SignalHub` lifecycle receiver registry
//! - `Outcome` re-export from asupersync for cancel-correct operations

// Re-export asupersync primitives for structured concurrency
pub use asupersync::{Cx, Outcome};

pub mod connection;
pub mod dialect;
pub mod error;
pub mod field;
pub mod model;
pub mod relation;
pub mod row;
pub mod signal;
pub mod types;
pub mod value;

pub use connection::{Connection, IsolationLevel, TransactionOps};
pub use dialect::{BackendFeatures, Dialect};
pub use error::{
    BlockingRef, ConfigError, Error, ProtectedError, QueryError, QueryErrorKind, RestrictedError,
    Result, TypeError, UnsupportedError,
};
pub use field::{FieldInfo, OnDelete, UniqueConstraintInfo};
pub use model::{find_relationship, Model};
pub use relation::{LinkTableInfo, RelatedIds, RelationshipInfo, RelationshipKind};
pub use row::{ColumnInfo, FromValue, Row};
pub use signal::{SignalEvent, SignalHub, SignalKind};
pub use types::SqlType;
pub use value::{hash_values, Value};
