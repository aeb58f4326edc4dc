//! SQL dialects and backend capability flags.

/// SQL dialect for generating dialect-specific SQL.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Dialect {
    /// PostgreSQL dialect (uses $1, $2 placeholders)
    #[default]
    Postgres,
    /// SQLite dialect (uses ?1, ?2 placeholders)
    Sqlite,
    /// MySQL dialect (uses ? placeholders)
    Mysql,
}

impl Dialect {
    /// Generate a placeholder for the given parameter index (1-based).
    pub fn placeholder(self, index: usize) -> String {
        match self {
            Dialect::Postgres => format!("${index}"),
            Dialect::Sqlite => format!("?{index}"),
            Dialect::Mysql => "?".to_string(),
        }
    }

    /// Quote an identifier for this dialect.
    ///
    /// Embedded quote characters are escaped by doubling them.
    pub fn quote_identifier(self, name: &str) -> String {
        match self {
            Dialect::Postgres | Dialect::Sqlite => {
                let escaped = name.replace('"', "\"\"");
                format!("\"{}\"", escaped)
            }
            Dialect::Mysql => {
                let escaped = name.replace('`', "``");
                format!("`{}`", escaped)
            }
        }
    }

    /// Capability flags for this dialect's backend.
    #[must_use]
    pub const fn features(self) -> BackendFeatures {
        match self {
            Dialect::Postgres => BackendFeatures {
                max_query_params: None,
                can_return_rows_from_bulk_insert: true,
                supports_ignore_conflicts: true,
                supports_update_conflicts: true,
                supports_update_conflicts_with_target: true,
                can_defer_constraint_checks: true,
            },
            Dialect::Sqlite => BackendFeatures {
                max_query_params: Some(999),
                can_return_rows_from_bulk_insert: true,
                supports_ignore_conflicts: true,
                supports_update_conflicts: true,
                supports_update_conflicts_with_target: true,
                can_defer_constraint_checks: false,
            },
            Dialect::Mysql => BackendFeatures {
                max_query_params: None,
                can_return_rows_from_bulk_insert: false,
                supports_ignore_conflicts: true,
                supports_update_conflicts: true,
                supports_update_conflicts_with_target: false,
                can_defer_constraint_checks: false,
            },
        }
    }
}

/// Capability flags consumed by the batch planner, conflict resolver, and
/// deletion collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendFeatures {
    /// Maximum number of bound parameters in one statement, if capped.
    pub max_query_params: Option<usize>,
    /// Can a multi-row INSERT return the generated keys?
    pub can_return_rows_from_bulk_insert: bool,
    /// Does the backend support skip-on-conflict inserts?
    pub supports_ignore_conflicts: bool,
    /// Does the backend support update-on-conflict inserts (upsert)?
    pub supports_update_conflicts: bool,
    /// Does the upsert form take an explicit conflict target column list?
    ///
    /// When true, update-on-conflict requires the caller to name the unique
    /// fields identifying the constraint.
    pub supports_update_conflicts_with_target: bool,
    /// Can constraint checking be deferred to commit within a transaction?
    pub can_defer_constraint_checks: bool,
}
