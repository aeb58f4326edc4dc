//! UPDATE and DELETE statement builders.
//!
//! These operate on table names rather than typed models: the deletion
//! collector and link manager work from relation metadata, where the
//! concrete model type is not in hand.

use crate::expr::Expr;
use asupersync::{Cx, Outcome};
use relwrite_core::{Connection, Dialect, Value};

/// Builds `UPDATE t SET col = value WHERE pk IN (…)` sweeps.
///
/// Used to null out or reset foreign key columns before their target rows
/// are deleted. `Value::Default` renders as the SQL `DEFAULT` keyword
/// instead of a bound parameter.
#[derive(Debug)]
pub struct UpdateBuilder {
    table: String,
    assignments: Vec<(String, Value)>,
    filter: Option<Expr>,
}

impl UpdateBuilder {
    /// Create an UPDATE builder for the given table.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            assignments: Vec::new(),
            filter: None,
        }
    }

    /// Add a SET assignment.
    #[must_use]
    pub fn set(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.assignments.push((column.into(), value.into()));
        self
    }

    /// Restrict the update with a predicate.
    #[must_use]
    pub fn filter(mut self, expr: Expr) -> Self {
        self.filter = Some(match self.filter {
            Some(existing) => existing.and(expr),
            None => expr,
        });
        self
    }

    /// Restrict the update to rows whose `pk_column` is in `pks`.
    #[must_use]
    pub fn pk_in(self, pk_column: impl Into<String>, pks: Vec<Value>) -> Self {
        self.filter(Expr::in_values(pk_column, pks))
    }

    /// Build the SQL and parameters for a specific dialect.
    pub fn build_with_dialect(&self, dialect: Dialect) -> (String, Vec<Value>) {
        let mut params: Vec<Value> = Vec::new();
        let set_clauses: Vec<String> = self
            .assignments
            .iter()
            .map(|(column, value)| {
                let column = dialect.quote_identifier(column);
                if matches!(value, Value::Default) {
                    format!("{column} = DEFAULT")
                } else {
                    params.push(value.clone());
                    format!("{column} = {}", dialect.placeholder(params.len()))
                }
            })
            .collect();

        let mut sql = format!(
            "UPDATE {} SET {}",
            dialect.quote_identifier(&self.table),
            set_clauses.join(", ")
        );

        if let Some(filter) = &self.filter {
            let (where_sql, where_params) = filter.render(dialect, params.len());
            sql.push_str(" WHERE ");
            sql.push_str(&where_sql);
            params.extend(where_params);
        }

        (sql, params)
    }

    /// Execute the UPDATE and return rows affected.
    pub async fn execute<C: Connection>(
        self,
        cx: &Cx,
        conn: &C,
    ) -> Outcome<u64, relwrite_core::Error> {
        let (sql, params) = self.build_with_dialect(conn.dialect());
        conn.execute(cx, &sql, &params).await
    }
}

/// Builds `DELETE FROM t [WHERE …]` statements.
#[derive(Debug)]
pub struct DeleteBuilder {
    table: String,
    filter: Option<Expr>,
}

impl DeleteBuilder {
    /// Create a DELETE builder for the given table.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            filter: None,
        }
    }

    /// Restrict the delete with a predicate.
    #[must_use]
    pub fn filter(mut self, expr: Expr) -> Self {
        self.filter = Some(match self.filter {
            Some(existing) => existing.and(expr),
            None => expr,
        });
        self
    }

    /// Restrict the delete to rows whose `pk_column` is in `pks`.
    #[must_use]
    pub fn pk_in(self, pk_column: impl Into<String>, pks: Vec<Value>) -> Self {
        self.filter(Expr::in_values(pk_column, pks))
    }

    /// Build the SQL and parameters for a specific dialect.
    pub fn build_with_dialect(&self, dialect: Dialect) -> (String, Vec<Value>) {
        let mut sql = format!("DELETE FROM {}", dialect.quote_identifier(&self.table));
        let mut params = Vec::new();

        if let Some(filter) = &self.filter {
            let (where_sql, where_params) = filter.render(dialect, 0);
            sql.push_str(" WHERE ");
            sql.push_str(&where_sql);
            params = where_params;
        }

        (sql, params)
    }

    /// Execute the DELETE and return rows affected.
    pub async fn execute<C: Connection>(
        self,
        cx: &Cx,
        conn: &C,
    ) -> Outcome<u64, relwrite_core::Error> {
        let (sql, params) = self.build_with_dialect(conn.dialect());
        conn.execute(cx, &sql, &params).await
    }
}
