//! Field and column definitions.

use crate::types::SqlType;

/// Deletion policy carried by a foreign-key edge.
///
/// Decides what happens to referencing rows when the referenced row is
/// deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OnDelete {
    /// Delete referencing rows along with the referenced row.
    #[default]
    Cascade,
    /// Set the referencing column to NULL.
    SetNull,
    /// Reset the referencing column to its declared default.
    SetDefault,
    /// Block the deletion whenever referencing rows exist.
    Protect,
    /// Block the deletion unless the referencing rows are themselves
    /// deleted by the same operation through another cascade path.
    Restrict,
    /// Leave referencing rows untouched; the database constraint (if any)
    /// is on its own.
    DoNothing,
}

impl OnDelete {
    /// Get the SQL referential-action spelling of this policy.
    ///
    /// `Protect` and `Restrict` are engine-level policies; both map to
    /// `RESTRICT` at the DDL level.
    #[must_use]
    pub const fn as_sql(&self) -> &'static str {
        match self {
            OnDelete::Cascade => "CASCADE",
            OnDelete::SetNull => "SET NULL",
            OnDelete::SetDefault => "SET DEFAULT",
            OnDelete::Protect | OnDelete::Restrict => "RESTRICT",
            OnDelete::DoNothing => "NO ACTION",
        }
    }

    /// Does this policy pull referencing rows into the deletion?
    #[must_use]
    pub const fn cascades(&self) -> bool {
        matches!(self, OnDelete::Cascade)
    }

    /// Does this policy update the referencing column instead of deleting?
    #[must_use]
    pub const fn sweeps_field(&self) -> bool {
        matches!(self, OnDelete::SetNull | OnDelete::SetDefault)
    }

    /// Can this policy block the deletion?
    #[must_use]
    pub const fn blocks(&self) -> bool {
        matches!(self, OnDelete::Protect | OnDelete::Restrict)
    }
}

/// Metadata about a model field/column.
#[derive(Debug, Clone)]
pub struct FieldInfo {
    /// Rust field name
    pub name: &'static str,
    /// Database column name (may differ from field name)
    pub column_name: &'static str,
    /// SQL type for this field
    pub sql_type: SqlType,
    /// Whether this field is nullable
    pub nullable: bool,
    /// Whether this is a primary key
    pub primary_key: bool,
    /// Whether this field auto-increments
    pub auto_increment: bool,
    /// Whether this field has a single-column unique constraint
    pub unique: bool,
    /// Default value expression (SQL)
    pub default: Option<&'static str>,
    /// Foreign key reference (table.column)
    pub foreign_key: Option<&'static str>,
    /// Deletion policy for the foreign key edge
    pub on_delete: Option<OnDelete>,
}

impl FieldInfo {
    /// Create a new field info with minimal required data.
    pub const fn new(name: &'static str, column_name: &'static str, sql_type: SqlType) -> Self {
        Self {
            name,
            column_name,
            sql_type,
            nullable: false,
            primary_key: false,
            auto_increment: false,
            unique: false,
            default: None,
            foreign_key: None,
            on_delete: None,
        }
    }

    /// Set nullable flag.
    pub const fn nullable(mut self, value: bool) -> Self {
        self.nullable = value;
        self
    }

    /// Set primary key flag.
    pub const fn primary_key(mut self, value: bool) -> Self {
        self.primary_key = value;
        self
    }

    /// Set auto-increment flag.
    pub const fn auto_increment(mut self, value: bool) -> Self {
        self.auto_increment = value;
        self
    }

    /// Set unique flag.
    pub const fn unique(mut self, value: bool) -> Self {
        self.unique = value;
        self
    }

    /// Set default value expression.
    pub const fn default(mut self, expr: &'static str) -> Self {
        self.default = Some(expr);
        self
    }

    /// Set foreign key reference ("table.column").
    pub const fn foreign_key(mut self, reference: &'static str) -> Self {
        self.foreign_key = Some(reference);
        self
    }

    /// Set the deletion policy for the foreign key edge.
    ///
    /// Only meaningful when `foreign_key` is also set.
    pub const fn on_delete(mut self, policy: OnDelete) -> Self {
        self.on_delete = Some(policy);
        self
    }

    /// Whether this field holds a relation (foreign key) value.
    #[must_use]
    pub const fn is_relation(&self) -> bool {
        self.foreign_key.is_some()
    }

    /// Split a "table.column" foreign key reference into its parts.
    #[must_use]
    pub fn fk_target(&self) -> Option<(&'static str, &'static str)> {
        let reference = self.foreign_key?;
        let (table, column) = reference.split_once('.')?;
        Some((table, column))
    }
}

/// A unique constraint over one or more fields.
///
/// Conflict targets for upserts resolve against these (or the primary key).
/// A constraint may carry a partial-index condition; such constraints
/// cannot serve as an upsert conflict target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniqueConstraintInfo {
    /// Constraint name, if declared.
    pub name: Option<&'static str>,
    /// Fields covered, in declaration order.
    pub fields: &'static [&'static str],
    /// Partial-index predicate SQL, if any.
    pub condition: Option<&'static str>,
}

impl UniqueConstraintInfo {
    /// Create an unconditional unique constraint over the given fields.
    #[must_use]
    pub const fn new(fields: &'static [&'static str]) -> Self {
        Self {
            name: None,
            fields,
            condition: None,
        }
    }

    /// Set the constraint name.
    #[must_use]
    pub const fn name(mut self, name: &'static str) -> Self {
        self.name = Some(name);
        self
    }

    /// Set a partial-index predicate.
    #[must_use]
    pub const fn condition(mut self, predicate: &'static str) -> Self {
        self.condition = Some(predicate);
        self
    }

    /// Does this constraint cover exactly the given field set (order-insensitive)?
    #[must_use]
    pub fn covers(&self, fields: &[&str]) -> bool {
        self.fields.len() == fields.len()
            && fields.iter().all(|f| self.fields.iter().any(|g| **g == **f))
    }
}
