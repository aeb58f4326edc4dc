//! Error types for relwrite operations.

use crate::value::Value;
use std::fmt;

/// The primary error type for all relwrite operations.
#[derive(Debug)]
pub enum Error {
    /// Connection-related errors (connect, disconnect, timeout)
    Connection(ConnectionError),
    /// Query execution errors
    Query(QueryError),
    /// Type conversion errors
    Type(TypeError),
    /// Invalid option combinations, raised before any statement is issued
    Config(ConfigError),
    /// The backend lacks a requested capability
    Unsupported(UnsupportedError),
    /// Deletion blocked by a PROTECT relation
    Protected(ProtectedError),
    /// Deletion blocked by a RESTRICT relation
    Restricted(RestrictedError),
    /// Invalid argument value (e.g. deleting an instance without a primary key)
    Value(String),
    /// I/O errors
    Io(std::io::Error),
    /// Operation timed out
    Timeout,
    /// Operation was cancelled via asupersync
    Cancelled,
    /// Custom error with message
    Custom(String),
}

#[derive(Debug)]
pub struct ConnectionError {
    pub kind: ConnectionErrorKind,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionErrorKind {
    /// Failed to establish connection
    Connect,
    /// Connection lost during operation
    Disconnected,
    /// Connection refused
    Refused,
}

#[derive(Debug)]
pub struct QueryError {
    pub kind: QueryErrorKind,
    pub sql: Option<String>,
    pub sqlstate: Option<String>,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorKind {
    /// Syntax error in SQL
    Syntax,
    /// Constraint violation (unique, foreign key, etc.)
    Constraint,
    /// Table or column not found
    NotFound,
    /// Deadlock detected
    Deadlock,
    /// Statement timeout
    Timeout,
    /// Other database error
    Database,
}

#[derive(Debug)]
pub struct TypeError {
    pub expected: &'static str,
    pub actual: String,
    pub column: Option<String>,
}

/// Invalid option combination or missing required option.
#[derive(Debug)]
pub struct ConfigError {
    pub message: String,
}

impl ConfigError {
    /// Create a new configuration error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// The backend does not support a requested feature.
#[derive(Debug)]
pub struct UnsupportedError {
    /// Name of the missing capability.
    pub feature: String,
    /// Human-readable context.
    pub message: String,
}

impl UnsupportedError {
    /// Create a new capability error naming the missing feature.
    pub fn new(feature: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            feature: feature.into(),
            message: message.into(),
        }
    }
}

/// A single row blocking a deletion, identified by table label and primary key.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockingRef {
    /// Table label of the referencing row.
    pub table: &'static str,
    /// Foreign key column on the referencing row.
    pub field: &'static str,
    /// Primary key of the referencing row.
    pub pk: Value,
}

/// Deletion blocked by rows referencing the target through a PROTECT edge.
///
/// Raised during plan validation, before any row is deleted.
#[derive(Debug)]
pub struct ProtectedError {
    /// Table label of the row that could not be deleted.
    pub target_table: &'static str,
    /// The referencing rows that block the deletion.
    pub blocking: Vec<BlockingRef>,
}

/// Deletion blocked by rows referencing the target through a RESTRICT edge.
///
/// Unlike PROTECT, restricting rows that are themselves collected for
/// deletion through another cascade path do not block.
#[derive(Debug)]
pub struct RestrictedError {
    /// Table label of the row that could not be deleted.
    pub target_table: &'static str,
    /// The referencing rows that block the deletion.
    pub blocking: Vec<BlockingRef>,
}

impl Error {
    /// Shorthand for a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(ConfigError::new(message))
    }

    /// Shorthand for a capability error.
    pub fn unsupported(feature: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Unsupported(UnsupportedError::new(feature, message))
    }

    /// Get SQLSTATE if available (e.g., "23505" for unique violation).
    pub fn sqlstate(&self) -> Option<&str> {
        match self {
            Error::Query(q) => q.sqlstate.as_deref(),
            _ => None,
        }
    }
}

impl QueryError {
    /// Is this a unique constraint violation?
    pub fn is_unique_violation(&self) -> bool {
        self.sqlstate.as_deref() == Some("23505")
    }

    /// Is this a foreign key violation?
    pub fn is_foreign_key_violation(&self) -> bool {
        self.sqlstate.as_deref() == Some("23503")
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Connection(e) => write!(f, "Connection error: {}", e.message),
            Error::Query(e) => {
                if let Some(sqlstate) = &e.sqlstate {
                    write!(f, "Query error (SQLSTATE {}): {}", sqlstate, e.message)
                } else {
                    write!(f, "Query error: {}", e.message)
                }
            }
            Error::Type(e) => {
                if let Some(col) = &e.column {
                    write!(
                        f,
                        "Type error in column '{}': expected {}, found {}",
                        col, e.expected, e.actual
                    )
                } else {
                    write!(f, "Type error: expected {}, found {}", e.expected, e.actual)
                }
            }
            Error::Config(e) => write!(f, "Configuration error: {}", e.message),
            Error::Unsupported(e) => {
                write!(f, "Backend does not support {}: {}", e.feature, e.message)
            }
            Error::Protected(e) => write!(
                f,
                "Cannot delete from '{}': protected by {} referencing row(s), first via {}.{}",
                e.target_table,
                e.blocking.len(),
                e.blocking.first().map_or("?", |b| b.table),
                e.blocking.first().map_or("?", |b| b.field),
            ),
            Error::Restricted(e) => write!(
                f,
                "Cannot delete from '{}': restricted by {} referencing row(s), first via {}.{}",
                e.target_table,
                e.blocking.len(),
                e.blocking.first().map_or("?", |b| b.table),
                e.blocking.first().map_or("?", |b| b.field),
            ),
            Error::Value(msg) => write!(f, "Value error: {}", msg),
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Timeout => write!(f, "Operation timed out"),
            Error::Cancelled => write!(f, "Operation cancelled"),
            Error::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Connection(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Query(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<ConnectionError> for Error {
    fn from(err: ConnectionError) -> Self {
        Error::Connection(err)
    }
}

impl From<QueryError> for Error {
    fn from(err: QueryError) -> Self {
        Error::Query(err)
    }
}

impl From<TypeError> for Error {
    fn from(err: TypeError) -> Self {
        Error::Type(err)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}

impl From<ProtectedError> for Error {
    fn from(err: ProtectedError) -> Self {
        Error::Protected(err)
    }
}

impl From<RestrictedError> for Error {
    fn from(err: RestrictedError) -> Self {
        Error::Restricted(err)
    }
}

/// Result type alias for relwrite operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlstate_helpers() {
        let query = QueryError {
            kind: QueryErrorKind::Constraint,
            sql: Some("INSERT INTO t VALUES (1)".to_string()),
            sqlstate: Some("23505".to_string()),
            message: "unique violation".to_string(),
            source: None,
        };

        assert!(query.is_unique_violation());
        assert!(!query.is_foreign_key_violation());

        let err = Error::Query(query);
        assert_eq!(err.sqlstate(), Some("23505"));
    }

    #[test]
    fn protected_error_names_the_blocking_edge() {
        let err = Error::Protected(ProtectedError {
            target_table: "artists",
            blocking: vec![BlockingRef {
                table: "albums",
                field: "artist_id",
                pk: Value::BigInt(3),
            }],
        });
        let text = err.to_string();
        assert!(text.contains("artists"));
        assert!(text.contains("albums.artist_id"));
    }

    #[test]
    fn unsupported_error_names_the_feature() {
        let err = Error::unsupported(
            "update_conflicts",
            "this backend cannot update conflicting rows",
        );
        assert!(err.to_string().contains("update_conflicts"));
    }
}
