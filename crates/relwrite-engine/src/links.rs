//! Many-to-many link management.
//!
//! A [`LinkManager`] mediates membership of one source row in a join table:
//! `add`, `remove`, `set`, and `clear`. Adds use a single ignore-conflicts
//! insert when the backend supports it; otherwise an existence check
//! determines the missing target ids first. `set` without a full clear
//! computes the symmetric difference and writes only the delta.

use asupersync::{Cx, Outcome};
use relwrite_core::{
    hash_values, Connection, Error, LinkTableInfo, RelatedIds, Value,
};
use relwrite_query::{batch_size, ConflictClause, DeleteBuilder, Expr};
use std::collections::HashSet;

/// Rows added and removed by a [`LinkManager::set`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetDelta {
    /// Links inserted.
    pub added: u64,
    /// Links deleted.
    pub removed: u64,
}

/// Manages the join-table membership of one source row.
pub struct LinkManager<'a> {
    link: LinkTableInfo,
    source_pk: Value,
    cache: Option<&'a RelatedIds>,
}

impl<'a> LinkManager<'a> {
    /// Create a manager for the given link table and source primary key.
    pub fn new(link: LinkTableInfo, source_pk: impl Into<Value>) -> Self {
        Self {
            link,
            source_pk: source_pk.into(),
            cache: None,
        }
    }

    /// Attach the instance's prefetch cache; every membership change
    /// invalidates it.
    #[must_use]
    pub fn with_cache(mut self, cache: &'a RelatedIds) -> Self {
        self.cache = Some(cache);
        self
    }

    fn invalidate_cache(&self) {
        if let Some(cache) = self.cache {
            cache.invalidate();
        }
    }

    fn value_set(values: &[Value]) -> HashSet<u64> {
        values
            .iter()
            .map(|v| hash_values(std::slice::from_ref(v)))
            .collect()
    }

    /// Drop duplicate target ids, keeping first occurrences in order.
    fn dedupe(targets: &[Value]) -> Vec<Value> {
        let mut seen = HashSet::new();
        targets
            .iter()
            .filter(|v| seen.insert(hash_values(std::slice::from_ref(*v))))
            .cloned()
            .collect()
    }

    /// Fetch the target ids currently linked to the source row.
    pub async fn current_ids<C: Connection>(
        &self,
        cx: &Cx,
        conn: &C,
    ) -> Outcome<Vec<Value>, Error> {
        let dialect = conn.dialect();
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = {}",
            dialect.quote_identifier(self.link.remote_column),
            dialect.quote_identifier(self.link.table_name),
            dialect.quote_identifier(self.link.local_column),
            dialect.placeholder(1)
        );
        match conn.query(cx, &sql, std::slice::from_ref(&self.source_pk)).await {
            Outcome::Ok(rows) => Outcome::Ok(
                rows.iter()
                    .filter_map(|row| row.get(0).cloned())
                    .collect(),
            ),
            Outcome::Err(e) => Outcome::Err(e),
            Outcome::Cancelled(r) => Outcome::Cancelled(r),
            Outcome::Panicked(p) => Outcome::Panicked(p),
        }
    }

    /// Link the given target ids to the source row.
    ///
    /// Already-linked ids are left alone. Returns the number of links
    /// actually inserted.
    pub async fn add<C: Connection>(
        &self,
        cx: &Cx,
        conn: &C,
        targets: &[Value],
    ) -> Outcome<u64, Error> {
        self.add_with_defaults(cx, conn, targets, &[]).await
    }

    /// Link target ids, carrying extra column values into every link row.
    #[tracing::instrument(level = "debug", skip_all, fields(table = self.link.table_name, targets = targets.len()))]
    pub async fn add_with_defaults<C: Connection>(
        &self,
        cx: &Cx,
        conn: &C,
        targets: &[Value],
        through_defaults: &[(&'static str, Value)],
    ) -> Outcome<u64, Error> {
        let targets = Self::dedupe(targets);
        if targets.is_empty() {
            return Outcome::Ok(0);
        }

        let dialect = conn.dialect();
        let features = dialect.features();

        let (to_insert, clause) = if features.supports_ignore_conflicts {
            // Single-query fast path: the backend skips existing pairs.
            (targets, ConflictClause::ignore(dialect))
        } else {
            let existing = match self.existing_ids(cx, conn, &targets).await {
                Outcome::Ok(set) => set,
                Outcome::Err(e) => return Outcome::Err(e),
                Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                Outcome::Panicked(p) => return Outcome::Panicked(p),
            };
            let missing: Vec<Value> = targets
                .into_iter()
                .filter(|v| !existing.contains(&hash_values(std::slice::from_ref(v))))
                .collect();
            (missing, ConflictClause::none())
        };

        if to_insert.is_empty() {
            self.invalidate_cache();
            return Outcome::Ok(0);
        }

        let mut columns = vec![self.link.local_column, self.link.remote_column];
        columns.extend(through_defaults.iter().map(|(name, _)| *name));
        let col_list: Vec<String> = columns
            .iter()
            .map(|c| dialect.quote_identifier(c))
            .collect();

        let per_row = columns.len();
        let rows_per_batch = batch_size(per_row, &features, None);

        let mut inserted: u64 = 0;
        for chunk in to_insert.chunks(rows_per_batch) {
            let mut sql = format!(
                "{} INTO {} ({}) VALUES ",
                clause.insert_keyword,
                dialect.quote_identifier(self.link.table_name),
                col_list.join(", ")
            );
            let mut params: Vec<Value> = Vec::with_capacity(per_row * chunk.len());
            for (i, target) in chunk.iter().enumerate() {
                if i > 0 {
                    sql.push_str(", ");
                }
                let mut placeholders = Vec::with_capacity(per_row);
                params.push(self.source_pk.clone());
                placeholders.push(dialect.placeholder(params.len()));
                params.push(target.clone());
                placeholders.push(dialect.placeholder(params.len()));
                for (_, value) in through_defaults {
                    params.push(value.clone());
                    placeholders.push(dialect.placeholder(params.len()));
                }
                sql.push('(');
                sql.push_str(&placeholders.join(", "));
                sql.push(')');
            }
            sql.push_str(&clause.suffix);

            match conn.execute(cx, &sql, &params).await {
                Outcome::Ok(count) => inserted += count,
                Outcome::Err(e) => return Outcome::Err(e),
                Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                Outcome::Panicked(p) => return Outcome::Panicked(p),
            }
        }

        self.invalidate_cache();
        Outcome::Ok(inserted)
    }

    /// Which of `targets` are already linked? Used on backends without
    /// ignore-conflicts support.
    async fn existing_ids<C: Connection>(
        &self,
        cx: &Cx,
        conn: &C,
        targets: &[Value],
    ) -> Outcome<HashSet<u64>, Error> {
        let dialect = conn.dialect();
        let features = dialect.features();
        let chunk_size = batch_size(1, &features, None).saturating_sub(1).max(1);

        let mut existing = HashSet::new();
        for chunk in targets.chunks(chunk_size) {
            let expr = Expr::eq(self.link.local_column, self.source_pk.clone())
                .and(Expr::in_values(self.link.remote_column, chunk.to_vec()));
            let (where_sql, params) = expr.render(dialect, 0);
            let sql = format!(
                "SELECT {} FROM {} WHERE {}",
                dialect.quote_identifier(self.link.remote_column),
                dialect.quote_identifier(self.link.table_name),
                where_sql
            );
            match conn.query(cx, &sql, &params).await {
                Outcome::Ok(rows) => {
                    existing.extend(rows.iter().filter_map(|row| {
                        row.get(0).map(|v| hash_values(std::slice::from_ref(v)))
                    }));
                }
                Outcome::Err(e) => return Outcome::Err(e),
                Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                Outcome::Panicked(p) => return Outcome::Panicked(p),
            }
        }
        Outcome::Ok(existing)
    }

    /// Unlink the given target ids from the source row.
    #[tracing::instrument(level = "debug", skip_all, fields(table = self.link.table_name, targets = targets.len()))]
    pub async fn remove<C: Connection>(
        &self,
        cx: &Cx,
        conn: &C,
        targets: &[Value],
    ) -> Outcome<u64, Error> {
        let targets = Self::dedupe(targets);
        if targets.is_empty() {
            return Outcome::Ok(0);
        }

        let features = conn.dialect().features();
        let chunk_size = batch_size(1, &features, None).saturating_sub(1).max(1);

        let mut removed: u64 = 0;
        for chunk in targets.chunks(chunk_size) {
            let builder = DeleteBuilder::new(self.link.table_name)
                .filter(Expr::eq(self.link.local_column, self.source_pk.clone()))
                .pk_in(self.link.remote_column, chunk.to_vec());
            match builder.execute(cx, conn).await {
                Outcome::Ok(count) => removed += count,
                Outcome::Err(e) => return Outcome::Err(e),
                Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                Outcome::Panicked(p) => return Outcome::Panicked(p),
            }
        }

        self.invalidate_cache();
        Outcome::Ok(removed)
    }

    /// Unlink every target from the source row.
    #[tracing::instrument(level = "debug", skip_all, fields(table = self.link.table_name))]
    pub async fn clear<C: Connection>(&self, cx: &Cx, conn: &C) -> Outcome<u64, Error> {
        let builder = DeleteBuilder::new(self.link.table_name)
            .filter(Expr::eq(self.link.local_column, self.source_pk.clone()));
        let outcome = builder.execute(cx, conn).await;
        if matches!(outcome, Outcome::Ok(_)) {
            self.invalidate_cache();
        }
        outcome
    }

    /// Replace the linked set with exactly `targets`.
    ///
    /// With `clear_first` the whole set is deleted and re-added; otherwise
    /// only the symmetric difference is written. Setting an empty target
    /// list is equivalent to [`clear`](Self::clear).
    #[tracing::instrument(level = "debug", skip_all, fields(table = self.link.table_name, targets = targets.len(), clear_first = clear_first))]
    pub async fn set<C: Connection>(
        &self,
        cx: &Cx,
        conn: &C,
        targets: &[Value],
        clear_first: bool,
    ) -> Outcome<SetDelta, Error> {
        let targets = Self::dedupe(targets);

        if clear_first {
            let removed = match self.clear(cx, conn).await {
                Outcome::Ok(count) => count,
                Outcome::Err(e) => return Outcome::Err(e),
                Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                Outcome::Panicked(p) => return Outcome::Panicked(p),
            };
            let added = match self.add(cx, conn, &targets).await {
                Outcome::Ok(count) => count,
                Outcome::Err(e) => return Outcome::Err(e),
                Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                Outcome::Panicked(p) => return Outcome::Panicked(p),
            };
            return Outcome::Ok(SetDelta { added, removed });
        }

        let current = match self.current_ids(cx, conn).await {
            Outcome::Ok(ids) => ids,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };

        let target_set = Self::value_set(&targets);
        let current_set = Self::value_set(&current);

        let to_remove: Vec<Value> = current
            .iter()
            .filter(|v| !target_set.contains(&hash_values(std::slice::from_ref(*v))))
            .cloned()
            .collect();
        let to_add: Vec<Value> = targets
            .iter()
            .filter(|v| !current_set.contains(&hash_values(std::slice::from_ref(*v))))
            .cloned()
            .collect();

        let removed = match self.remove(cx, conn, &to_remove).await {
            Outcome::Ok(count) => count,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };
        let added = match self.add(cx, conn, &to_add).await {
            Outcome::Ok(count) => count,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };

        self.invalidate_cache();
        Outcome::Ok(SetDelta { added, removed })
    }
}
