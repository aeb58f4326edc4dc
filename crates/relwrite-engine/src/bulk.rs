//! Bulk insert and update orchestration.
//!
//! `BulkCreate` turns a list of new model instances into as few INSERT
//! statements as the backend's parameter budget allows, with optional
//! conflict handling. On backends that can return rows from a bulk insert
//! it reads generated keys back and writes them onto the instances, unless
//! lifecycle receivers force the slower per-batch path.

use asupersync::{Cx, Outcome};
use relwrite_core::{
    Connection, Error, Model, SignalEvent, SignalHub, SignalKind, Value,
};
use relwrite_query::{BatchPlan, Expr, InsertManyBuilder, OnConflict, UpdateBuilder};

/// Builder for a bulk INSERT of new model instances.
pub struct BulkCreate<'a, 'h, M: Model> {
    objs: &'a mut [M],
    signals: &'h SignalHub,
    batch_size: Option<usize>,
    ignore_conflicts: bool,
    update_conflicts: bool,
    update_fields: Vec<&'static str>,
    unique_fields: Vec<&'static str>,
}

impl<'a, 'h, M: Model + Clone> BulkCreate<'a, 'h, M> {
    /// Create a bulk insert over the given instances.
    pub fn new(objs: &'a mut [M], signals: &'h SignalHub) -> Self {
        Self {
            objs,
            signals,
            batch_size: None,
            ignore_conflicts: false,
            update_conflicts: false,
            update_fields: Vec::new(),
            unique_fields: Vec::new(),
        }
    }

    /// Cap the number of rows per statement.
    #[must_use]
    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = Some(size);
        self
    }

    /// Skip rows that hit a unique-constraint violation.
    #[must_use]
    pub fn ignore_conflicts(mut self) -> Self {
        self.ignore_conflicts = true;
        self
    }

    /// Turn unique-constraint violations into updates of the named fields.
    ///
    /// `unique_fields` identify the constraint to target on backends whose
    /// upsert form requires one.
    #[must_use]
    pub fn update_conflicts(
        mut self,
        update_fields: Vec<&'static str>,
        unique_fields: Vec<&'static str>,
    ) -> Self {
        self.update_conflicts = true;
        self.update_fields = update_fields;
        self.unique_fields = unique_fields;
        self
    }

    #[allow(clippy::result_large_err)]
    fn resolve_conflict(&self) -> Result<Option<OnConflict>, Error> {
        match (self.ignore_conflicts, self.update_conflicts) {
            (true, true) => Err(Error::config(
                "ignore_conflicts and update_conflicts are mutually exclusive",
            )),
            (true, false) => {
                if !self.update_fields.is_empty() || !self.unique_fields.is_empty() {
                    return Err(Error::config(
                        "update_fields and unique_fields require update_conflicts",
                    ));
                }
                Ok(Some(OnConflict::Ignore))
            }
            (false, true) => Ok(Some(OnConflict::Update {
                update_fields: self.update_fields.clone(),
                unique_fields: self.unique_fields.clone(),
            })),
            (false, false) => {
                if !self.update_fields.is_empty() || !self.unique_fields.is_empty() {
                    return Err(Error::config(
                        "update_fields and unique_fields require update_conflicts",
                    ));
                }
                Ok(None)
            }
        }
    }

    /// Execute the bulk insert and return the total affected-row count.
    #[tracing::instrument(level = "info", skip_all, fields(table = M::TABLE_NAME, objs = self.objs.len()))]
    pub async fn execute<C: Connection>(self, cx: &Cx, conn: &C) -> Outcome<u64, Error> {
        if self.objs.is_empty() {
            return Outcome::Ok(0);
        }

        let conflict = match self.resolve_conflict() {
            Ok(mode) => mode,
            Err(e) => return Outcome::Err(e),
        };
        let dialect = conn.dialect();
        let features = dialect.features();
        if let Some(mode) = &conflict {
            if let Err(e) = mode.validate::<M>(&features) {
                return Outcome::Err(e);
            }
        }

        if self.signals.has_receivers(SignalKind::PreSave, M::TABLE_NAME) {
            for obj in self.objs.iter() {
                let pk = obj.primary_key_value();
                let event = SignalEvent {
                    kind: SignalKind::PreSave,
                    table: M::TABLE_NAME,
                    pk: &pk,
                    row: None,
                };
                if let Err(e) = self.signals.send(&event) {
                    return Outcome::Err(e);
                }
            }
        }

        // Reading generated keys back is only sound when conflicts cannot
        // silently drop rows (positional write-back) and nothing observes
        // the instances mid-flight.
        let read_back_keys = features.can_return_rows_from_bulk_insert
            && !matches!(conflict, Some(OnConflict::Ignore))
            && !self
                .signals
                .has_any_receivers(&[SignalKind::PreSave, SignalKind::PostSave], M::TABLE_NAME);

        let mut with_pk: Vec<usize> = Vec::new();
        let mut without_pk: Vec<usize> = Vec::new();
        for (i, obj) in self.objs.iter().enumerate() {
            if obj.is_new() {
                without_pk.push(i);
            } else {
                with_pk.push(i);
            }
        }

        let row_width = self.objs[0].to_row().len();
        let has_auto_pk = M::fields()
            .iter()
            .any(|f| f.primary_key && f.auto_increment);

        let mut total: u64 = 0;

        // Rows that already carry a key never need the RETURNING read-back.
        let width = row_width;
        let plan = BatchPlan::plan(with_pk.len(), width, &features, self.batch_size);
        tracing::debug!(
            group = "with_pk",
            rows = with_pk.len(),
            batches = plan.num_batches(),
            "planned insert batches"
        );
        for chunk in with_pk.chunks(plan.batch_size.max(1)) {
            if chunk.is_empty() {
                continue;
            }
            let batch: Vec<M> = chunk.iter().map(|&i| self.objs[i].clone()).collect();
            let mut builder = InsertManyBuilder::new(&batch);
            if let Some(mode) = &conflict {
                builder = builder.on_conflict(mode);
            }
            match builder.execute(cx, conn).await {
                Outcome::Ok(count) => total += count,
                Outcome::Err(e) => return Outcome::Err(e),
                Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                Outcome::Panicked(p) => return Outcome::Panicked(p),
            }
        }

        let width = if has_auto_pk && row_width > 1 {
            row_width - 1
        } else {
            row_width
        };
        let plan = BatchPlan::plan(without_pk.len(), width, &features, self.batch_size);
        tracing::debug!(
            group = "without_pk",
            rows = without_pk.len(),
            batches = plan.num_batches(),
            read_back_keys,
            "planned insert batches"
        );
        for chunk in without_pk.chunks(plan.batch_size.max(1)) {
            if chunk.is_empty() {
                continue;
            }
            let batch: Vec<M> = chunk.iter().map(|&i| self.objs[i].clone()).collect();
            let mut builder = InsertManyBuilder::new(&batch).returning_pk(read_back_keys);
            if let Some(mode) = &conflict {
                builder = builder.on_conflict(mode);
            }
            if read_back_keys {
                match builder.execute_returning(cx, conn).await {
                    Outcome::Ok(rows) => {
                        for (j, row) in rows.iter().enumerate() {
                            if let (Some(&i), Some(value)) = (chunk.get(j), row.get(0)) {
                                self.objs[i].set_primary_key(value.clone());
                            }
                        }
                        total += rows.len() as u64;
                    }
                    Outcome::Err(e) => return Outcome::Err(e),
                    Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                    Outcome::Panicked(p) => return Outcome::Panicked(p),
                }
            } else {
                match builder.execute(cx, conn).await {
                    Outcome::Ok(count) => total += count,
                    Outcome::Err(e) => return Outcome::Err(e),
                    Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                    Outcome::Panicked(p) => return Outcome::Panicked(p),
                }
            }
        }

        if self.signals.has_receivers(SignalKind::PostSave, M::TABLE_NAME) {
            for obj in self.objs.iter() {
                let pk = obj.primary_key_value();
                let event = SignalEvent {
                    kind: SignalKind::PostSave,
                    table: M::TABLE_NAME,
                    pk: &pk,
                    row: None,
                };
                if let Err(e) = self.signals.send(&event) {
                    return Outcome::Err(e);
                }
            }
        }

        tracing::info!(inserted = total, "bulk create complete");
        Outcome::Ok(total)
    }
}

/// Builder for a bulk UPDATE of named fields on existing instances.
///
/// Each instance is updated by primary key; only the named fields are
/// written.
pub struct BulkUpdate<'a, M: Model> {
    objs: &'a [M],
    fields: Vec<&'static str>,
}

impl<'a, M: Model> BulkUpdate<'a, M> {
    /// Create a bulk update writing `fields` on each instance.
    pub fn new(objs: &'a [M], fields: Vec<&'static str>) -> Self {
        Self { objs, fields }
    }

    #[allow(clippy::result_large_err)]
    fn validate(&self) -> Result<(), Error> {
        if self.fields.is_empty() {
            return Err(Error::config("bulk update requires a non-empty field list"));
        }
        for name in &self.fields {
            let field = M::field(name)
                .ok_or_else(|| Error::config(format!("unknown field '{name}' in bulk update")))?;
            if field.primary_key {
                return Err(Error::config(format!(
                    "primary key field '{name}' cannot be bulk updated"
                )));
            }
        }
        for obj in self.objs {
            if obj.primary_key_value().iter().any(Value::is_null) {
                return Err(Error::Value(
                    "all bulk update instances must have a primary key".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Execute the updates and return the total affected-row count.
    #[tracing::instrument(level = "info", skip_all, fields(table = M::TABLE_NAME, objs = self.objs.len()))]
    pub async fn execute<C: Connection>(self, cx: &Cx, conn: &C) -> Outcome<u64, Error> {
        if self.objs.is_empty() {
            return Outcome::Ok(0);
        }
        if let Err(e) = self.validate() {
            return Outcome::Err(e);
        }

        let pk_column = M::PRIMARY_KEY[0];
        let mut total: u64 = 0;
        for obj in self.objs {
            let row = obj.to_row();
            let mut builder = UpdateBuilder::new(M::TABLE_NAME);
            for name in &self.fields {
                let column = M::field(name).map_or(*name, |f| f.column_name);
                let value = row
                    .iter()
                    .find(|(n, _)| n == name)
                    .map_or(Value::Null, |(_, v)| v.clone());
                builder = builder.set(column, value);
            }
            let pk = obj.primary_key_value();
            builder = builder.filter(Expr::eq(pk_column, pk[0].clone()));

            match builder.execute(cx, conn).await {
                Outcome::Ok(count) => total += count,
                Outcome::Err(e) => return Outcome::Err(e),
                Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                Outcome::Panicked(p) => return Outcome::Panicked(p),
            }
        }

        tracing::info!(updated = total, "bulk update complete");
        Outcome::Ok(total)
    }
}
