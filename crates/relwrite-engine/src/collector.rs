//! Cascading deletion: collect, validate, execute.
//!
//! Deletion runs in two strictly separated phases. `Collector::build_plan`
//! walks the relation graph from the seed rows over an explicit worklist,
//! classifying every incoming edge by its [`OnDelete`] policy, and
//! validates protection before anything is touched. The resulting
//! [`DeletePlan`] then executes inside one transaction: field sweeps first,
//! then per-table deletes in children-first order, with lifecycle signals
//! fired around the rows they describe.

use crate::registry::{RelationEdge, SchemaRegistry};
use asupersync::{Cx, Outcome};
use relwrite_core::{
    hash_values, BlockingRef, Connection, Error, Model, OnDelete, ProtectedError, RestrictedError,
    Row, SignalEvent, SignalHub, SignalKind, TransactionOps, Value,
};
use relwrite_query::{batch_size, DeleteBuilder, Expr, UpdateBuilder};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

/// Rows fetched per SELECT while walking the relation graph.
pub const FETCH_CHUNK_SIZE: usize = 2000;

/// A filtered deletion request against one table.
#[derive(Debug, Clone)]
pub struct DeleteQuery {
    /// Target table.
    pub table: &'static str,
    /// Row predicate; `None` covers the whole table.
    pub filter: Option<Expr>,
    /// Row limit, if the caller sliced the query.
    pub limit: Option<usize>,
    /// Row offset, if the caller sliced the query.
    pub offset: Option<usize>,
}

impl DeleteQuery {
    /// Delete every row of a table.
    #[must_use]
    pub fn table(table: &'static str) -> Self {
        Self {
            table,
            filter: None,
            limit: None,
            offset: None,
        }
    }

    /// Restrict the deletion with a predicate.
    #[must_use]
    pub fn filter(mut self, expr: Expr) -> Self {
        self.filter = Some(match self.filter {
            Some(existing) => existing.and(expr),
            None => expr,
        });
        self
    }

    /// Slice the query. Sliced queries cannot be deleted; the collector
    /// rejects them.
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Offset the query. Offset queries cannot be deleted; the collector
    /// rejects them.
    #[must_use]
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }
}

#[derive(Debug)]
struct CollectedRow {
    pk: Value,
    row: Option<Row>,
}

#[derive(Debug)]
struct CollectedTable {
    table: &'static str,
    pk_column: &'static str,
    rows: Vec<CollectedRow>,
    pk_hashes: HashSet<u64>,
}

impl CollectedTable {
    fn contains(&self, pk: &Value) -> bool {
        self.pk_hashes.contains(&hash_values(std::slice::from_ref(pk)))
    }

    fn insert(&mut self, pk: Value, row: Option<Row>) -> bool {
        if self.pk_hashes.insert(hash_values(std::slice::from_ref(&pk))) {
            self.rows.push(CollectedRow { pk, row });
            true
        } else {
            false
        }
    }

    fn pks(&self) -> Vec<Value> {
        self.rows.iter().map(|r| r.pk.clone()).collect()
    }
}

/// Insertion-ordered store of collected rows, grouped by table.
#[derive(Debug, Default)]
struct Collected {
    tables: Vec<CollectedTable>,
    index: HashMap<&'static str, usize>,
}

impl Collected {
    fn entry(&mut self, table: &'static str, pk_column: &'static str) -> &mut CollectedTable {
        if !self.index.contains_key(table) {
            self.tables.push(CollectedTable {
                table,
                pk_column,
                rows: Vec::new(),
                pk_hashes: HashSet::new(),
            });
            self.index.insert(table, self.tables.len() - 1);
        }
        let idx = self.index[table];
        &mut self.tables[idx]
    }

    fn contains(&self, table: &str, pk: &Value) -> bool {
        self.index
            .get(table)
            .is_some_and(|&idx| self.tables[idx].contains(pk))
    }
}

/// A pending SET NULL / SET DEFAULT update on referencing rows.
#[derive(Debug)]
struct FieldSweep {
    table: &'static str,
    pk_column: &'static str,
    column: &'static str,
    value: Value,
    pks: Vec<Value>,
}

/// A delete executed directly from its predicate, with no row fetch.
#[derive(Debug)]
struct FastDelete {
    table: &'static str,
    filter: Option<Expr>,
}

/// Walks the relation graph from seed rows and produces a validated
/// [`DeletePlan`].
pub struct Collector<'a> {
    registry: &'a SchemaRegistry,
    signals: &'a SignalHub,
    fetch_chunk_size: usize,
    seed_rows: Vec<(&'static str, Value, Row)>,
    seed_queries: Vec<DeleteQuery>,
}

impl<'a> Collector<'a> {
    /// Create a collector over the given registry and signal hub.
    #[must_use]
    pub fn new(registry: &'a SchemaRegistry, signals: &'a SignalHub) -> Self {
        Self {
            registry,
            signals,
            fetch_chunk_size: FETCH_CHUNK_SIZE,
            seed_rows: Vec::new(),
            seed_queries: Vec::new(),
        }
    }

    /// Override the fetch chunk size (rows per traversal SELECT).
    #[must_use]
    pub fn fetch_chunk_size(mut self, size: usize) -> Self {
        self.fetch_chunk_size = size.max(1);
        self
    }

    /// Seed the collector with a model instance.
    ///
    /// The instance must carry a primary key; there is nothing to delete
    /// otherwise.
    #[allow(clippy::result_large_err)]
    pub fn add_instance<M: Model>(&mut self, obj: &M) -> Result<(), Error> {
        let pk_values = obj.primary_key_value();
        let pk = match pk_values.first() {
            Some(value) if !value.is_null() => value.clone(),
            _ => {
                return Err(Error::Value(format!(
                    "'{}' instance cannot be deleted because its primary key is unset",
                    M::TABLE_NAME
                )));
            }
        };
        self.registry.require_table(M::TABLE_NAME)?;

        let row_pairs = obj.to_row();
        let columns: Vec<String> = row_pairs.iter().map(|(n, _)| (*n).to_string()).collect();
        let values: Vec<Value> = row_pairs.into_iter().map(|(_, v)| v).collect();
        self.seed_rows
            .push((M::TABLE_NAME, pk, Row::new(columns, values)));
        Ok(())
    }

    /// Seed the collector with a filtered deletion request.
    #[allow(clippy::result_large_err)]
    pub fn add_query(&mut self, query: DeleteQuery) -> Result<(), Error> {
        if query.limit.is_some() || query.offset.is_some() {
            return Err(Error::unsupported(
                "sliced_delete",
                "cannot delete the rows of a sliced query",
            ));
        }
        self.registry.require_table(query.table)?;
        self.seed_queries.push(query);
        Ok(())
    }

    /// Can rows of this table be deleted without fetching them?
    ///
    /// True when no receiver observes the rows and no relation edge would
    /// require cascading, sweeping, or protection checks.
    #[must_use]
    pub fn can_fast_delete(&self, table: &'static str) -> bool {
        !self
            .signals
            .has_any_receivers(&[SignalKind::PreDelete, SignalKind::PostDelete], table)
            && !self.registry.has_active_edges_into(table)
    }

    /// Walk the relation graph and produce a validated plan.
    ///
    /// Protection and restriction violations surface here, before any
    /// mutating statement exists to execute.
    #[tracing::instrument(level = "info", skip_all, fields(seeds = self.seed_rows.len() + self.seed_queries.len()))]
    pub async fn build_plan<C: Connection>(
        mut self,
        cx: &Cx,
        conn: &C,
    ) -> Outcome<DeletePlan<'a>, Error> {
        let dialect = conn.dialect();
        let features = dialect.features();
        let select_chunk = self
            .fetch_chunk_size
            .min(batch_size(1, &features, None));

        let mut collected = Collected::default();
        let mut worklist: VecDeque<(&'static str, Vec<Value>)> = VecDeque::new();
        let mut fast_deletes: Vec<FastDelete> = Vec::new();
        let mut sweeps: Vec<FieldSweep> = Vec::new();
        let mut protect_refs: Vec<(RelationEdge, Vec<Value>)> = Vec::new();
        let mut restrict_refs: Vec<(RelationEdge, Vec<Value>)> = Vec::new();

        let seed_queries = std::mem::take(&mut self.seed_queries);
        let seed_rows = std::mem::take(&mut self.seed_rows);

        for query in &seed_queries {
            if self.can_fast_delete(query.table) {
                tracing::debug!(table = query.table, "fast delete, no row fetch");
                fast_deletes.push(FastDelete {
                    table: query.table,
                    filter: query.filter.clone(),
                });
                continue;
            }
            let meta = match self.registry.require_table(query.table) {
                Ok(meta) => meta,
                Err(e) => return Outcome::Err(e),
            };
            let mut sql = format!(
                "SELECT {} FROM {}",
                meta.column_names()
                    .iter()
                    .map(|c| dialect.quote_identifier(c))
                    .collect::<Vec<_>>()
                    .join(", "),
                dialect.quote_identifier(meta.table)
            );
            let mut params = Vec::new();
            if let Some(filter) = &query.filter {
                let (where_sql, where_params) = filter.render(dialect, 0);
                sql.push_str(" WHERE ");
                sql.push_str(&where_sql);
                params = where_params;
            }
            let rows = match conn.query(cx, &sql, &params).await {
                Outcome::Ok(rows) => rows,
                Outcome::Err(e) => return Outcome::Err(e),
                Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                Outcome::Panicked(p) => return Outcome::Panicked(p),
            };
            let entry = collected.entry(meta.table, meta.pk_column);
            let mut new_pks = Vec::new();
            for row in rows {
                let Some(pk) = row.get_by_name(meta.pk_column).cloned() else {
                    continue;
                };
                if entry.insert(pk.clone(), Some(row)) {
                    new_pks.push(pk);
                }
            }
            if !new_pks.is_empty() {
                worklist.push_back((meta.table, new_pks));
            }
        }

        for (table, pk, row) in seed_rows {
            if self.can_fast_delete(table) {
                let meta = match self.registry.require_table(table) {
                    Ok(meta) => meta,
                    Err(e) => return Outcome::Err(e),
                };
                fast_deletes.push(FastDelete {
                    table,
                    filter: Some(Expr::eq(meta.pk_column, pk)),
                });
                continue;
            }
            let meta = match self.registry.require_table(table) {
                Ok(meta) => meta,
                Err(e) => return Outcome::Err(e),
            };
            let entry = collected.entry(table, meta.pk_column);
            if entry.insert(pk.clone(), Some(row)) {
                worklist.push_back((table, vec![pk]));
            }
        }

        while let Some((table, pks)) = worklist.pop_front() {
            let edges: Vec<RelationEdge> = self.registry.edges_into(table).copied().collect();
            for edge in edges {
                let Ok(source_meta) = self.registry.require_table(edge.source_table) else {
                    continue;
                };
                match edge.on_delete {
                    OnDelete::DoNothing => {}
                    OnDelete::Cascade => {
                        for chunk in pks.chunks(select_chunk) {
                            let expr = Expr::in_values(edge.fk_column, chunk.to_vec());
                            let (where_sql, params) = expr.render(dialect, 0);
                            let sql = format!(
                                "SELECT {} FROM {} WHERE {}",
                                source_meta
                                    .column_names()
                                    .iter()
                                    .map(|c| dialect.quote_identifier(c))
                                    .collect::<Vec<_>>()
                                    .join(", "),
                                dialect.quote_identifier(source_meta.table),
                                where_sql
                            );
                            let rows = match conn.query(cx, &sql, &params).await {
                                Outcome::Ok(rows) => rows,
                                Outcome::Err(e) => return Outcome::Err(e),
                                Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                                Outcome::Panicked(p) => return Outcome::Panicked(p),
                            };
                            let entry = collected.entry(source_meta.table, source_meta.pk_column);
                            let mut new_pks = Vec::new();
                            for row in rows {
                                let Some(pk) = row.get_by_name(source_meta.pk_column).cloned()
                                else {
                                    continue;
                                };
                                if entry.insert(pk.clone(), Some(row)) {
                                    new_pks.push(pk);
                                }
                            }
                            if !new_pks.is_empty() {
                                worklist.push_back((source_meta.table, new_pks));
                            }
                        }
                    }
                    OnDelete::SetNull | OnDelete::SetDefault => {
                        let found = match self
                            .referencing_pks(cx, conn, &edge, source_meta.pk_column, &pks, select_chunk)
                            .await
                        {
                            Outcome::Ok(found) => found,
                            Outcome::Err(e) => return Outcome::Err(e),
                            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                            Outcome::Panicked(p) => return Outcome::Panicked(p),
                        };
                        if !found.is_empty() {
                            sweeps.push(FieldSweep {
                                table: edge.source_table,
                                pk_column: source_meta.pk_column,
                                column: edge.fk_column,
                                value: if edge.on_delete == OnDelete::SetNull {
                                    Value::Null
                                } else {
                                    Value::Default
                                },
                                pks: found,
                            });
                        }
                    }
                    OnDelete::Protect | OnDelete::Restrict => {
                        let found = match self
                            .referencing_pks(cx, conn, &edge, source_meta.pk_column, &pks, select_chunk)
                            .await
                        {
                            Outcome::Ok(found) => found,
                            Outcome::Err(e) => return Outcome::Err(e),
                            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                            Outcome::Panicked(p) => return Outcome::Panicked(p),
                        };
                        if !found.is_empty() {
                            if edge.on_delete == OnDelete::Protect {
                                protect_refs.push((edge, found));
                            } else {
                                restrict_refs.push((edge, found));
                            }
                        }
                    }
                }
            }
        }

        // Validation: protected references always block.
        if let Some((first_edge, _)) = protect_refs.first() {
            let target_table = first_edge.target_table;
            let blocking = blocking_refs(&protect_refs);
            return Outcome::Err(Error::Protected(ProtectedError {
                target_table,
                blocking,
            }));
        }

        // Restricted references block only when the referencing row was not
        // itself collected through some cascade path.
        let surviving: Vec<(RelationEdge, Vec<Value>)> = restrict_refs
            .into_iter()
            .filter_map(|(edge, pks)| {
                let blocking: Vec<Value> = pks
                    .into_iter()
                    .filter(|pk| !collected.contains(edge.source_table, pk))
                    .collect();
                (!blocking.is_empty()).then_some((edge, blocking))
            })
            .collect();
        if let Some((first_edge, _)) = surviving.first() {
            let target_table = first_edge.target_table;
            let blocking = blocking_refs(&surviving);
            return Outcome::Err(Error::Restricted(RestrictedError {
                target_table,
                blocking,
            }));
        }

        // Children-first execution order.
        let table_names: Vec<&'static str> = collected.tables.iter().map(|t| t.table).collect();
        let order = self.registry.sorted_tables(&table_names);
        let mut by_name: HashMap<&'static str, CollectedTable> = collected
            .tables
            .into_iter()
            .map(|t| (t.table, t))
            .collect();
        let tables: Vec<CollectedTable> = order
            .iter()
            .filter_map(|name| by_name.remove(name))
            .collect();

        tracing::info!(
            tables = tables.len(),
            fast_deletes = fast_deletes.len(),
            sweeps = sweeps.len(),
            "delete plan ready"
        );
        Outcome::Ok(DeletePlan {
            signals: self.signals,
            fast_deletes,
            sweeps,
            tables,
        })
    }

    /// Fetch the primary keys of rows whose `fk_column` is in `pks`.
    async fn referencing_pks<C: Connection>(
        &self,
        cx: &Cx,
        conn: &C,
        edge: &RelationEdge,
        source_pk_column: &'static str,
        pks: &[Value],
        select_chunk: usize,
    ) -> Outcome<Vec<Value>, Error> {
        let dialect = conn.dialect();
        let mut found = Vec::new();
        for chunk in pks.chunks(select_chunk) {
            let expr = Expr::in_values(edge.fk_column, chunk.to_vec());
            let (where_sql, params) = expr.render(dialect, 0);
            let sql = format!(
                "SELECT {} FROM {} WHERE {}",
                dialect.quote_identifier(source_pk_column),
                dialect.quote_identifier(edge.source_table),
                where_sql
            );
            match conn.query(cx, &sql, &params).await {
                Outcome::Ok(rows) => {
                    found.extend(rows.iter().filter_map(|row| row.get(0).cloned()));
                }
                Outcome::Err(e) => return Outcome::Err(e),
                Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                Outcome::Panicked(p) => return Outcome::Panicked(p),
            }
        }
        Outcome::Ok(found)
    }
}

fn blocking_refs(refs: &[(RelationEdge, Vec<Value>)]) -> Vec<BlockingRef> {
    refs.iter()
        .flat_map(|(edge, pks)| {
            pks.iter().map(|pk| BlockingRef {
                table: edge.source_table,
                field: edge.fk_column,
                pk: pk.clone(),
            })
        })
        .collect()
}

/// Totals reported by a completed deletion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteOutcome {
    /// Rows deleted across all tables.
    pub total: u64,
    /// Rows deleted per table label.
    pub per_table: BTreeMap<&'static str, u64>,
}

/// A validated deletion plan, ready to execute.
///
/// Produced by [`Collector::build_plan`]; holds everything the execute
/// phase needs and nothing borrowed from the connection.
#[derive(Debug)]
pub struct DeletePlan<'a> {
    signals: &'a SignalHub,
    fast_deletes: Vec<FastDelete>,
    sweeps: Vec<FieldSweep>,
    tables: Vec<CollectedTable>,
}

impl DeletePlan<'_> {
    /// Tables with collected rows, in execution (children-first) order.
    pub fn collected_tables(&self) -> Vec<&'static str> {
        self.tables.iter().map(|t| t.table).collect()
    }

    /// Tables deleted through the no-fetch fast path.
    pub fn fast_delete_tables(&self) -> Vec<&'static str> {
        self.fast_deletes.iter().map(|f| f.table).collect()
    }

    /// Number of collected rows across all tables.
    #[must_use]
    pub fn collected_count(&self) -> usize {
        self.tables.iter().map(|t| t.rows.len()).sum()
    }

    /// Execute the plan and report per-table counts.
    ///
    /// Runs inside a single transaction, deferring constraint checks when
    /// the backend can. A lone fast delete with nothing else planned skips
    /// the transaction and executes directly.
    #[tracing::instrument(level = "info", skip_all)]
    pub async fn execute<C: Connection>(self, cx: &Cx, conn: &C) -> Outcome<DeleteOutcome, Error> {
        let dialect = conn.dialect();
        let features = dialect.features();

        if self.tables.is_empty() && self.sweeps.is_empty() && self.fast_deletes.len() == 1 {
            let fast = &self.fast_deletes[0];
            let mut builder = DeleteBuilder::new(fast.table);
            if let Some(filter) = &fast.filter {
                builder = builder.filter(filter.clone());
            }
            let (sql, params) = builder.build_with_dialect(dialect);
            return match conn.execute(cx, &sql, &params).await {
                Outcome::Ok(count) => {
                    let mut per_table = BTreeMap::new();
                    per_table.insert(fast.table, count);
                    Outcome::Ok(DeleteOutcome {
                        total: count,
                        per_table,
                    })
                }
                Outcome::Err(e) => Outcome::Err(e),
                Outcome::Cancelled(r) => Outcome::Cancelled(r),
                Outcome::Panicked(p) => Outcome::Panicked(p),
            };
        }

        let tx = match conn.begin(cx).await {
            Outcome::Ok(tx) => tx,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };

        match self.execute_in(cx, &tx, dialect, features).await {
            Outcome::Ok(outcome) => match tx.commit(cx).await {
                Outcome::Ok(()) => Outcome::Ok(outcome),
                Outcome::Err(e) => Outcome::Err(e),
                Outcome::Cancelled(r) => Outcome::Cancelled(r),
                Outcome::Panicked(p) => Outcome::Panicked(p),
            },
            Outcome::Err(e) => {
                let _ = tx.rollback(cx).await;
                Outcome::Err(e)
            }
            Outcome::Cancelled(r) => Outcome::Cancelled(r),
            Outcome::Panicked(p) => Outcome::Panicked(p),
        }
    }

    async fn execute_in<T: TransactionOps>(
        &self,
        cx: &Cx,
        tx: &T,
        dialect: relwrite_core::Dialect,
        features: relwrite_core::BackendFeatures,
    ) -> Outcome<DeleteOutcome, Error> {
        let mut outcome = DeleteOutcome::default();

        if features.can_defer_constraint_checks {
            match tx.execute(cx, "SET CONSTRAINTS ALL DEFERRED", &[]).await {
                Outcome::Ok(_) => {}
                Outcome::Err(e) => return Outcome::Err(e),
                Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                Outcome::Panicked(p) => return Outcome::Panicked(p),
            }
        }

        // Pre-delete signals, children before parents.
        for table in &self.tables {
            if !self.signals.has_receivers(SignalKind::PreDelete, table.table) {
                continue;
            }
            for row in &table.rows {
                let pk = [row.pk.clone()];
                let event = SignalEvent {
                    kind: SignalKind::PreDelete,
                    table: table.table,
                    pk: &pk,
                    row: row.row.as_ref(),
                };
                if let Err(e) = self.signals.send(&event) {
                    return Outcome::Err(e);
                }
            }
        }

        for fast in &self.fast_deletes {
            let mut builder = DeleteBuilder::new(fast.table);
            if let Some(filter) = &fast.filter {
                builder = builder.filter(filter.clone());
            }
            let (sql, params) = builder.build_with_dialect(dialect);
            match tx.execute(cx, &sql, &params).await {
                Outcome::Ok(count) => {
                    outcome.total += count;
                    *outcome.per_table.entry(fast.table).or_insert(0) += count;
                }
                Outcome::Err(e) => return Outcome::Err(e),
                Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                Outcome::Panicked(p) => return Outcome::Panicked(p),
            }
        }

        // Null out / reset referencing columns before their targets die.
        let sweep_chunk = {
            let chunk = batch_size(1, &features, None);
            if features.max_query_params.is_some() {
                chunk.saturating_sub(1).max(1)
            } else {
                chunk
            }
        };
        for sweep in &self.sweeps {
            for chunk in sweep.pks.chunks(sweep_chunk) {
                let builder = UpdateBuilder::new(sweep.table)
                    .set(sweep.column, sweep.value.clone())
                    .pk_in(sweep.pk_column, chunk.to_vec());
                let (sql, params) = builder.build_with_dialect(dialect);
                match tx.execute(cx, &sql, &params).await {
                    Outcome::Ok(_) => {}
                    Outcome::Err(e) => return Outcome::Err(e),
                    Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                    Outcome::Panicked(p) => return Outcome::Panicked(p),
                }
            }
        }

        // Delete children-first; each table's post-delete receivers fire
        // after its rows are gone and before any parent row is touched.
        let delete_chunk = batch_size(1, &features, None);
        for table in &self.tables {
            let pks = table.pks();
            for chunk in pks.chunks(delete_chunk) {
                let builder = DeleteBuilder::new(table.table).pk_in(table.pk_column, chunk.to_vec());
                let (sql, params) = builder.build_with_dialect(dialect);
                match tx.execute(cx, &sql, &params).await {
                    Outcome::Ok(count) => {
                        outcome.total += count;
                        *outcome.per_table.entry(table.table).or_insert(0) += count;
                    }
                    Outcome::Err(e) => return Outcome::Err(e),
                    Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                    Outcome::Panicked(p) => return Outcome::Panicked(p),
                }
            }

            if self.signals.has_receivers(SignalKind::PostDelete, table.table) {
                for row in &table.rows {
                    let pk = [row.pk.clone()];
                    let event = SignalEvent {
                        kind: SignalKind::PostDelete,
                        table: table.table,
                        pk: &pk,
                        row: row.row.as_ref(),
                    };
                    if let Err(e) = self.signals.send(&event) {
                        return Outcome::Err(e);
                    }
                }
            }
        }

        tracing::info!(deleted = outcome.total, "delete plan executed");
        Outcome::Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{run, MockConnection, MockState};
    use relwrite_core::{FieldInfo, SqlType};
    use std::sync::{Arc, Mutex};

    macro_rules! delete_model {
        ($name:ident, $table:literal, $fields:expr) => {
            #[derive(Debug, Clone)]
            struct $name {
                id: Option<i64>,
            }

            impl Model for $name {
                const TABLE_NAME: &'static str = $table;
                const PRIMARY_KEY: &'static [&'static str] = &["id"];

                fn fields() -> &'static [FieldInfo] {
                    static FIELDS: &[FieldInfo] = $fields;
                    FIELDS
                }

                fn to_row(&self) -> Vec<(&'static str, Value)> {
                    vec![("id", self.id.map_or(Value::Null, Value::BigInt))]
                }

                fn from_row(row: &Row) -> relwrite_core::Result<Self> {
                    Ok(Self {
                        id: row.get_named("id")?,
                    })
                }

                fn primary_key_value(&self) -> Vec<Value> {
                    vec![self.id.map_or(Value::Null, Value::BigInt)]
                }

                fn is_new(&self) -> bool {
                    self.id.is_none()
                }
            }
        };
    }

    delete_model!(
        Artist,
        "artists",
        &[FieldInfo::new("id", "id", SqlType::BigInt).primary_key(true)]
    );
    delete_model!(
        Album,
        "albums",
        &[
            FieldInfo::new("id", "id", SqlType::BigInt).primary_key(true),
            FieldInfo::new("artist_id", "artist_id", SqlType::BigInt)
                .foreign_key("artists.id")
                .on_delete(OnDelete::Cascade),
        ]
    );
    delete_model!(
        Track,
        "tracks",
        &[
            FieldInfo::new("id", "id", SqlType::BigInt).primary_key(true),
            FieldInfo::new("album_id", "album_id", SqlType::BigInt)
                .foreign_key("albums.id")
                .on_delete(OnDelete::Cascade),
        ]
    );
    delete_model!(
        Note,
        "notes",
        &[FieldInfo::new("id", "id", SqlType::BigInt).primary_key(true)]
    );
    delete_model!(
        Label,
        "labels",
        &[FieldInfo::new("id", "id", SqlType::BigInt).primary_key(true)]
    );
    delete_model!(
        Band,
        "bands",
        &[
            FieldInfo::new("id", "id", SqlType::BigInt).primary_key(true),
            FieldInfo::new("label_id", "label_id", SqlType::BigInt)
                .foreign_key("labels.id")
                .on_delete(OnDelete::Protect),
        ]
    );
    delete_model!(
        Author,
        "authors",
        &[FieldInfo::new("id", "id", SqlType::BigInt).primary_key(true)]
    );
    delete_model!(
        Post,
        "posts",
        &[
            FieldInfo::new("id", "id", SqlType::BigInt).primary_key(true),
            FieldInfo::new("author_id", "author_id", SqlType::BigInt)
                .nullable(true)
                .foreign_key("authors.id")
                .on_delete(OnDelete::SetNull),
        ]
    );
    delete_model!(
        Top,
        "tops",
        &[FieldInfo::new("id", "id", SqlType::BigInt).primary_key(true)]
    );
    delete_model!(
        Mid,
        "mids",
        &[
            FieldInfo::new("id", "id", SqlType::BigInt).primary_key(true),
            FieldInfo::new("top_id", "top_id", SqlType::BigInt)
                .foreign_key("tops.id")
                .on_delete(OnDelete::Cascade),
        ]
    );
    delete_model!(
        Bottom,
        "bottoms",
        &[
            FieldInfo::new("id", "id", SqlType::BigInt).primary_key(true),
            FieldInfo::new("top_id", "top_id", SqlType::BigInt)
                .foreign_key("tops.id")
                .on_delete(OnDelete::Cascade),
            FieldInfo::new("mid_id", "mid_id", SqlType::BigInt)
                .foreign_key("mids.id")
                .on_delete(OnDelete::Restrict),
        ]
    );

    fn id_rows(ids: &[i64]) -> Vec<Row> {
        ids.iter()
            .map(|&id| Row::new(vec!["id".into()], vec![Value::BigInt(id)]))
            .collect()
    }

    #[test]
    fn instance_without_pk_is_a_value_error() {
        let mut registry = SchemaRegistry::new();
        registry.register_model::<Note>().unwrap();
        let signals = SignalHub::new();

        let mut collector = Collector::new(&registry, &signals);
        let err = collector.add_instance(&Note { id: None }).unwrap_err();
        assert!(matches!(err, Error::Value(_)));
    }

    #[test]
    fn sliced_query_is_rejected() {
        let mut registry = SchemaRegistry::new();
        registry.register_model::<Note>().unwrap();
        let signals = SignalHub::new();

        let mut collector = Collector::new(&registry, &signals);
        let err = collector
            .add_query(DeleteQuery::table("notes").limit(10))
            .unwrap_err();
        match err {
            Error::Unsupported(e) => assert_eq!(e.feature, "sliced_delete"),
            other => panic!("expected Unsupported, got {other:?}"),
        }
    }

    #[test]
    fn unfiltered_delete_with_no_edges_uses_the_fast_path() {
        run(|cx| async move {
            let state = Arc::new(Mutex::new(MockState::default()));
            state.lock().unwrap().execute_results.push_back(4);
            let conn = MockConnection::new(Arc::clone(&state));

            let mut registry = SchemaRegistry::new();
            registry.register_model::<Note>().unwrap();
            let signals = SignalHub::new();

            let mut collector = Collector::new(&registry, &signals);
            collector.add_query(DeleteQuery::table("notes")).unwrap();
            let plan = match collector.build_plan(&cx, &conn).await {
                Outcome::Ok(plan) => plan,
                other => panic!("unexpected outcome: {other:?}"),
            };
            assert_eq!(plan.fast_delete_tables(), vec!["notes"]);
            assert!(plan.collected_tables().is_empty());

            let outcome = match plan.execute(&cx, &conn).await {
                Outcome::Ok(outcome) => outcome,
                other => panic!("unexpected outcome: {other:?}"),
            };
            assert_eq!(outcome.total, 4);
            assert_eq!(outcome.per_table.get("notes"), Some(&4));

            let state = state.lock().unwrap();
            // One DELETE, nothing fetched, no transaction ceremony.
            assert_eq!(state.sql(), vec!["DELETE FROM \"notes\"".to_string()]);
            assert_eq!(state.count_sql("SELECT"), 0);
        });
    }

    #[test]
    fn receivers_disable_the_fast_path() {
        run(|cx| async move {
            let state = Arc::new(Mutex::new(MockState::default()));
            let conn = MockConnection::new(Arc::clone(&state));

            let mut registry = SchemaRegistry::new();
            registry.register_model::<Note>().unwrap();
            let mut signals = SignalHub::new();
            signals.connect(SignalKind::PreDelete, "notes", |_| Ok(()));

            let mut collector = Collector::new(&registry, &signals);
            collector.add_query(DeleteQuery::table("notes")).unwrap();
            state.lock().unwrap().query_results.push_back(id_rows(&[1, 2]));

            let plan = match collector.build_plan(&cx, &conn).await {
                Outcome::Ok(plan) => plan,
                other => panic!("unexpected outcome: {other:?}"),
            };
            assert!(plan.fast_delete_tables().is_empty());
            assert_eq!(plan.collected_tables(), vec!["notes"]);
            assert_eq!(plan.collected_count(), 2);
            assert_eq!(state.lock().unwrap().count_sql("SELECT"), 1);
        });
    }

    #[test]
    fn cascade_collects_transitively_and_deletes_children_first() {
        run(|cx| async move {
            let state = Arc::new(Mutex::new(MockState::default()));
            {
                let mut guard = state.lock().unwrap();
                // albums referencing artist 1, then tracks referencing album 10.
                guard.query_results.push_back(id_rows(&[10]));
                guard.query_results.push_back(id_rows(&[100, 101]));
                // SET CONSTRAINTS, then three DELETE counts.
                guard.execute_results.push_back(0);
                guard.execute_results.push_back(2);
                guard.execute_results.push_back(1);
                guard.execute_results.push_back(1);
            }
            let conn = MockConnection::new(Arc::clone(&state));

            let mut registry = SchemaRegistry::new();
            registry.register_model::<Artist>().unwrap();
            registry.register_model::<Album>().unwrap();
            registry.register_model::<Track>().unwrap();
            let signals = SignalHub::new();

            let mut collector = Collector::new(&registry, &signals);
            collector.add_instance(&Artist { id: Some(1) }).unwrap();
            let plan = match collector.build_plan(&cx, &conn).await {
                Outcome::Ok(plan) => plan,
                other => panic!("unexpected outcome: {other:?}"),
            };
            assert_eq!(plan.collected_tables(), vec!["tracks", "albums", "artists"]);

            let outcome = match plan.execute(&cx, &conn).await {
                Outcome::Ok(outcome) => outcome,
                other => panic!("unexpected outcome: {other:?}"),
            };
            assert_eq!(outcome.total, 4);
            assert_eq!(outcome.per_table.get("tracks"), Some(&2));
            assert_eq!(outcome.per_table.get("albums"), Some(&1));
            assert_eq!(outcome.per_table.get("artists"), Some(&1));

            let state = state.lock().unwrap();
            let sqls = state.sql();
            let delete_tracks = sqls
                .iter()
                .position(|s| s.starts_with("DELETE FROM \"tracks\""))
                .unwrap();
            let delete_albums = sqls
                .iter()
                .position(|s| s.starts_with("DELETE FROM \"albums\""))
                .unwrap();
            let delete_artists = sqls
                .iter()
                .position(|s| s.starts_with("DELETE FROM \"artists\""))
                .unwrap();
            assert!(delete_tracks < delete_albums);
            assert!(delete_albums < delete_artists);
            assert_eq!(sqls.first().map(String::as_str), Some("BEGIN"));
            assert_eq!(sqls.last().map(String::as_str), Some("COMMIT"));
        });
    }

    #[test]
    fn protect_blocks_before_any_delete() {
        run(|cx| async move {
            let state = Arc::new(Mutex::new(MockState::default()));
            state.lock().unwrap().query_results.push_back(id_rows(&[5]));
            let conn = MockConnection::new(Arc::clone(&state));

            let mut registry = SchemaRegistry::new();
            registry.register_model::<Label>().unwrap();
            registry.register_model::<Band>().unwrap();
            let signals = SignalHub::new();

            let mut collector = Collector::new(&registry, &signals);
            collector.add_instance(&Label { id: Some(1) }).unwrap();
            let outcome = collector.build_plan(&cx, &conn).await;
            match outcome {
                Outcome::Err(Error::Protected(e)) => {
                    assert_eq!(e.target_table, "labels");
                    assert_eq!(e.blocking.len(), 1);
                    assert_eq!(e.blocking[0].table, "bands");
                    assert_eq!(e.blocking[0].field, "label_id");
                    assert_eq!(e.blocking[0].pk, Value::BigInt(5));
                }
                other => panic!("expected Protected error, got {other:?}"),
            }
            assert_eq!(state.lock().unwrap().count_sql("DELETE"), 0);
        });
    }

    #[test]
    fn restrict_blocks_a_direct_delete() {
        run(|cx| async move {
            let state = Arc::new(Mutex::new(MockState::default()));
            state.lock().unwrap().query_results.push_back(id_rows(&[7]));
            let conn = MockConnection::new(Arc::clone(&state));

            let mut registry = SchemaRegistry::new();
            registry.register_model::<Top>().unwrap();
            registry.register_model::<Mid>().unwrap();
            registry.register_model::<Bottom>().unwrap();
            let signals = SignalHub::new();

            let mut collector = Collector::new(&registry, &signals);
            collector.add_instance(&Mid { id: Some(11) }).unwrap();
            let outcome = collector.build_plan(&cx, &conn).await;
            match outcome {
                Outcome::Err(Error::Restricted(e)) => {
                    assert_eq!(e.target_table, "mids");
                    assert_eq!(e.blocking[0].table, "bottoms");
                }
                other => panic!("expected Restricted error, got {other:?}"),
            }
            assert_eq!(state.lock().unwrap().count_sql("DELETE"), 0);
        });
    }

    #[test]
    fn restrict_is_waived_when_the_cascade_collects_the_blocker() {
        run(|cx| async move {
            let state = Arc::new(Mutex::new(MockState::default()));
            {
                let mut guard = state.lock().unwrap();
                // mids referencing top 1.
                guard.query_results.push_back(id_rows(&[11, 12]));
                // bottoms referencing top 1 (cascade path).
                guard.query_results.push_back(id_rows(&[7]));
                // bottoms restricting mids 11, 12.
                guard.query_results.push_back(id_rows(&[7]));
                // SET CONSTRAINTS, then three DELETE counts.
                guard.execute_results.push_back(0);
                guard.execute_results.push_back(1);
                guard.execute_results.push_back(2);
                guard.execute_results.push_back(1);
            }
            let conn = MockConnection::new(Arc::clone(&state));

            let mut registry = SchemaRegistry::new();
            registry.register_model::<Top>().unwrap();
            registry.register_model::<Mid>().unwrap();
            registry.register_model::<Bottom>().unwrap();
            let signals = SignalHub::new();

            let mut collector = Collector::new(&registry, &signals);
            collector.add_instance(&Top { id: Some(1) }).unwrap();
            let plan = match collector.build_plan(&cx, &conn).await {
                Outcome::Ok(plan) => plan,
                other => panic!("expected a plan, got {other:?}"),
            };
            assert_eq!(plan.collected_tables(), vec!["bottoms", "mids", "tops"]);

            let outcome = match plan.execute(&cx, &conn).await {
                Outcome::Ok(outcome) => outcome,
                other => panic!("unexpected outcome: {other:?}"),
            };
            // All four rows: bottom 7, mids 11+12, top 1.
            assert_eq!(outcome.total, 4);
        });
    }

    #[test]
    fn set_null_sweep_runs_before_the_target_delete() {
        run(|cx| async move {
            let state = Arc::new(Mutex::new(MockState::default()));
            {
                let mut guard = state.lock().unwrap();
                guard.query_results.push_back(id_rows(&[3, 4]));
                guard.execute_results.push_back(0); // SET CONSTRAINTS
                guard.execute_results.push_back(2); // UPDATE sweep
                guard.execute_results.push_back(1); // DELETE authors
            }
            let conn = MockConnection::new(Arc::clone(&state));

            let mut registry = SchemaRegistry::new();
            registry.register_model::<Author>().unwrap();
            registry.register_model::<Post>().unwrap();
            let signals = SignalHub::new();

            let mut collector = Collector::new(&registry, &signals);
            collector.add_instance(&Author { id: Some(1) }).unwrap();
            let plan = match collector.build_plan(&cx, &conn).await {
                Outcome::Ok(plan) => plan,
                other => panic!("unexpected outcome: {other:?}"),
            };
            // Swept rows are updated, not deleted.
            assert_eq!(plan.collected_tables(), vec!["authors"]);

            let outcome = match plan.execute(&cx, &conn).await {
                Outcome::Ok(outcome) => outcome,
                other => panic!("unexpected outcome: {other:?}"),
            };
            assert_eq!(outcome.total, 1);
            assert!(outcome.per_table.get("posts").is_none());

            let state = state.lock().unwrap();
            let sqls = state.sql();
            let update = sqls
                .iter()
                .position(|s| {
                    s.starts_with("UPDATE \"posts\" SET \"author_id\" = $1")
                })
                .unwrap();
            let delete = sqls
                .iter()
                .position(|s| s.starts_with("DELETE FROM \"authors\""))
                .unwrap();
            assert!(update < delete);
        });
    }

    #[test]
    fn post_delete_fires_after_child_rows_are_removed_and_before_parent_delete() {
        run(|cx| async move {
            let state = Arc::new(Mutex::new(MockState::default()));
            {
                let mut guard = state.lock().unwrap();
                guard.query_results.push_back(id_rows(&[10]));
                guard.query_results.push_back(id_rows(&[100]));
            }
            let conn = MockConnection::new(Arc::clone(&state));

            let mut registry = SchemaRegistry::new();
            registry.register_model::<Artist>().unwrap();
            registry.register_model::<Album>().unwrap();
            registry.register_model::<Track>().unwrap();

            let observed: Arc<Mutex<Vec<(String, Vec<String>)>>> =
                Arc::new(Mutex::new(Vec::new()));
            let mut signals = SignalHub::new();
            for (kind, tag) in [
                (SignalKind::PreDelete, "pre_tracks"),
                (SignalKind::PostDelete, "post_tracks"),
            ] {
                let observed = Arc::clone(&observed);
                let state = Arc::clone(&state);
                signals.connect(kind, "tracks", move |_event| {
                    let sqls = state.lock().unwrap().sql();
                    observed.lock().unwrap().push((tag.to_string(), sqls));
                    Ok(())
                });
            }

            let mut collector = Collector::new(&registry, &signals);
            collector.add_instance(&Artist { id: Some(1) }).unwrap();
            let plan = match collector.build_plan(&cx, &conn).await {
                Outcome::Ok(plan) => plan,
                other => panic!("unexpected outcome: {other:?}"),
            };
            let outcome = plan.execute(&cx, &conn).await;
            assert!(matches!(outcome, Outcome::Ok(_)));

            let observed = observed.lock().unwrap();
            let pre = observed.iter().find(|(tag, _)| tag == "pre_tracks").unwrap();
            let post = observed.iter().find(|(tag, _)| tag == "post_tracks").unwrap();

            // Pre-delete fires before any row is removed.
            assert!(!pre.1.iter().any(|s| s.starts_with("DELETE")));
            // Post-delete fires after the child rows are gone but before the
            // parent's delete executes.
            assert!(post.1.iter().any(|s| s.starts_with("DELETE FROM \"tracks\"")));
            assert!(!post.1.iter().any(|s| s.starts_with("DELETE FROM \"artists\"")));
        });
    }

    #[test]
    fn unregistered_table_is_a_config_error() {
        let registry = SchemaRegistry::new();
        let signals = SignalHub::new();
        let mut collector = Collector::new(&registry, &signals);
        let err = collector.add_query(DeleteQuery::table("ghosts")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
