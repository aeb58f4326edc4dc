//! Multi-row INSERT builder.

use crate::conflict::{ConflictClause, OnConflict};
use asupersync::{Cx, Outcome};
use relwrite_core::{Connection, Dialect, Model, Row, Value};

/// Builds a single multi-row INSERT statement for a batch of models.
///
/// The batch is assumed to fit the backend's parameter budget; the batch
/// planner splits oversized inputs before this builder runs. Conflict
/// handling and a RETURNING clause for generated keys are spliced in on
/// request.
#[derive(Debug)]
pub struct InsertManyBuilder<'a, M: Model> {
    models: &'a [M],
    on_conflict: Option<&'a OnConflict>,
    returning_pk: bool,
}

impl<'a, M: Model> InsertManyBuilder<'a, M> {
    /// Create a builder over a batch of models.
    pub fn new(models: &'a [M]) -> Self {
        Self {
            models,
            on_conflict: None,
            returning_pk: false,
        }
    }

    /// Attach conflict handling (validated by the caller).
    #[must_use]
    pub fn on_conflict(mut self, mode: &'a OnConflict) -> Self {
        self.on_conflict = Some(mode);
        self
    }

    /// Append `RETURNING <pk>` so generated keys can be read back.
    #[must_use]
    pub fn returning_pk(mut self, value: bool) -> Self {
        self.returning_pk = value;
        self
    }

    /// Build the SQL and parameters with the default dialect (Postgres).
    pub fn build(&self) -> (String, Vec<Value>) {
        self.build_with_dialect(Dialect::default())
    }

    /// Build the SQL and parameters for a specific dialect.
    ///
    /// Auto-increment primary key columns are omitted when no row in the
    /// batch carries a value for them, so the backend generates the keys.
    pub fn build_with_dialect(&self, dialect: Dialect) -> (String, Vec<Value>) {
        if self.models.is_empty() {
            return (String::new(), Vec::new());
        }

        let fields = M::fields();
        let rows: Vec<Vec<(&'static str, Value)>> =
            self.models.iter().map(Model::to_row).collect();

        let columns: Vec<&'static str> = rows[0]
            .iter()
            .map(|(name, _)| *name)
            .filter(|name| {
                let auto = fields
                    .iter()
                    .any(|f| f.name == *name && f.auto_increment && f.primary_key);
                if !auto {
                    return true;
                }
                // Keep a generated column only when some row supplies it.
                rows.iter().any(|row| {
                    row.iter()
                        .any(|(n, value)| n == name && !value.is_null())
                })
            })
            .collect();

        let column_of = |name: &'static str| {
            fields
                .iter()
                .find(|f| f.name == name)
                .map_or(name, |f| f.column_name)
        };
        let col_list: Vec<String> = columns
            .iter()
            .map(|&name| dialect.quote_identifier(column_of(name)))
            .collect();

        let clause = self
            .on_conflict
            .map_or_else(ConflictClause::none, |mode| mode.clause::<M>(dialect));

        let mut sql = format!(
            "{} INTO {} ({}) VALUES ",
            clause.insert_keyword,
            dialect.quote_identifier(M::TABLE_NAME),
            col_list.join(", ")
        );

        let mut params: Vec<Value> = Vec::with_capacity(columns.len() * rows.len());
        for (i, row) in rows.iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            let placeholders: Vec<String> = columns
                .iter()
                .map(|&name| {
                    let value = row
                        .iter()
                        .find(|(n, _)| *n == name)
                        .map_or(Value::Null, |(_, v)| v.clone());
                    params.push(value);
                    dialect.placeholder(params.len())
                })
                .collect();
            sql.push('(');
            sql.push_str(&placeholders.join(", "));
            sql.push(')');
        }

        sql.push_str(&clause.suffix);

        if self.returning_pk {
            let pk_list: Vec<String> = M::PRIMARY_KEY
                .iter()
                .map(|&col| dialect.quote_identifier(col))
                .collect();
            sql.push_str(" RETURNING ");
            sql.push_str(&pk_list.join(", "));
        }

        (sql, params)
    }

    /// Execute the INSERT and return the affected-row count.
    pub async fn execute<C: Connection>(
        self,
        cx: &Cx,
        conn: &C,
    ) -> Outcome<u64, relwrite_core::Error> {
        if self.models.is_empty() {
            return Outcome::Ok(0);
        }
        let (sql, params) = self.build_with_dialect(conn.dialect());
        conn.execute(cx, &sql, &params).await
    }

    /// Execute the INSERT and collect the RETURNING rows.
    pub async fn execute_returning<C: Connection>(
        self,
        cx: &Cx,
        conn: &C,
    ) -> Outcome<Vec<Row>, relwrite_core::Error> {
        if self.models.is_empty() {
            return Outcome::Ok(Vec::new());
        }
        let (sql, params) = self.build_with_dialect(conn.dialect());
        conn.execute_returning(cx, &sql, &params).await
    }
}
