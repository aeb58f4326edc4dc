//! Model trait for table-mapped structs.

use crate::field::{FieldInfo, UniqueConstraintInfo};
use crate::relation::RelationshipInfo;
use crate::row::Row;
use crate::value::Value;
use crate::Result;

/// Trait for types that map to database tables.
///
/// Provides the metadata the write path needs: table and column names,
/// primary key, declared unique constraints, and relation edges. Instances
/// convert to and from rows of [`Value`]s.
pub trait Model: Sized + Send + Sync {
    /// The name of the database table.
    const TABLE_NAME: &'static str;

    /// The primary key column name(s).
    const PRIMARY_KEY: &'static [&'static str];

    /// Relationship metadata for this model.
    ///
    /// Models with no relationships can rely on the default empty slice.
    const RELATIONSHIPS: &'static [RelationshipInfo] = &[];

    /// Multi-column unique constraints declared on this model.
    ///
    /// Single-column uniqueness is expressed on the field itself via
    /// [`FieldInfo::unique`].
    const UNIQUE_CONSTRAINTS: &'static [UniqueConstraintInfo] = &[];

    /// Get field metadata for all columns.
    fn fields() -> &'static [FieldInfo];

    /// Convert this model instance to a row of values.
    fn to_row(&self) -> Vec<(&'static str, Value)>;

    /// Construct a model instance from a database row.
    #[allow(clippy::result_large_err)]
    fn from_row(row: &Row) -> Result<Self>;

    /// Get the value of the primary key field(s).
    fn primary_key_value(&self) -> Vec<Value>;

    /// Check if this is a new record (primary key is None/default).
    fn is_new(&self) -> bool;

    /// Set an auto-generated primary key after insert.
    ///
    /// Backends that can return generated keys from a bulk insert call this
    /// to write the key back onto the instance. The default is a no-op for
    /// models without a generated key.
    fn set_primary_key(&mut self, _value: Value) {}

    /// Look up field metadata by rust field name.
    fn field(name: &str) -> Option<&'static FieldInfo> {
        Self::fields().iter().find(|f| f.name == name)
    }
}

/// Find a relationship by field name in a model's `RELATIONSHIPS`.
pub fn find_relationship<M: Model>(field_name: &str) -> Option<&'static RelationshipInfo> {
    M::RELATIONSHIPS.iter().find(|r| r.name == field_name)
}
