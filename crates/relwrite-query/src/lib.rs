//! SQL compilation for relwrite.
//!
//! `relwrite-query` is the **statement construction layer**. It turns model
//! metadata and pending-row batches into executable SQL plus parameters.
//!
//! # Role In The Architecture
//!
//! - **Batch planning**: [`BatchPlan`] bounds multi-row statements by the
//!   backend's parameter budget.
//! - **Conflict resolution**: [`OnConflict`] validates and renders
//!   skip-or-update handling for unique-constraint violations.
//! - **Builders**: [`InsertManyBuilder`], [`UpdateBuilder`], and
//!   [`DeleteBuilder`] assemble the statements the engine executes.
//! - **Predicates**: [`Expr`] builds WHERE clauses safely.
//!
//! The resulting statements execute through the `Connection` trait from
//! `relwrite-core`.

pub mod batch;
pub mod builder;
pub mod conflict;
pub mod expr;
pub mod insert;

pub use batch::{batch_size, BatchPlan, DEFAULT_BATCH_SIZE};
pub use builder::{DeleteBuilder, UpdateBuilder};
pub use conflict::{ConflictClause, OnConflict};
pub use expr::{BinaryOp, Expr};
pub use insert::InsertManyBuilder;
