//! Shared test backend: a scripted connection that records every statement.
#![allow(dead_code)]

use asupersync::runtime::RuntimeBuilder;
use relwrite::{
    Connection, Cx, Dialect, Error, FieldInfo, IsolationLevel, Model, OnDelete, Outcome, Row,
    SqlType, TransactionOps, UniqueConstraintInfo, Value,
};
use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex};

/// Run an async test body on a current-thread runtime.
pub fn run<F, Fut>(f: F)
where
    F: FnOnce(Cx) -> Fut,
    Fut: Future<Output = ()>,
{
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();
    rt.block_on(f(cx));
}

pub fn unwrap_outcome<T: std::fmt::Debug>(outcome: Outcome<T, Error>) -> T {
    match outcome {
        Outcome::Ok(v) => v,
        other => std::panic::panic_any(format!("unexpected outcome: {other:?}")),
    }
}

/// Recorded statements and scripted results.
#[derive(Debug, Default)]
pub struct MockState {
    /// Every statement in execution order, including BEGIN/COMMIT markers.
    pub log: Vec<(String, Vec<Value>)>,
    /// Results handed out to `query` calls, front first.
    pub query_results: VecDeque<Vec<Row>>,
    /// Row counts handed out to `execute` calls, front first (default 0).
    pub execute_results: VecDeque<u64>,
    /// Rows handed out to `execute_returning` calls, front first.
    pub returning_results: VecDeque<Vec<Row>>,
}

impl MockState {
    pub fn sql(&self) -> Vec<String> {
        self.log.iter().map(|(sql, _)| sql.clone()).collect()
    }

    pub fn count_sql(&self, prefix: &str) -> usize {
        self.log
            .iter()
            .filter(|(sql, _)| sql.starts_with(prefix))
            .count()
    }
}

/// A connection that records statements and replays scripted results.
#[derive(Debug, Clone)]
pub struct MockConnection {
    state: Arc<Mutex<MockState>>,
    dialect: Dialect,
}

impl MockConnection {
    pub fn new(state: Arc<Mutex<MockState>>) -> Self {
        Self {
            state,
            dialect: Dialect::Postgres,
        }
    }

    #[must_use]
    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }
}

#[derive(Debug)]
pub struct MockTransaction {
    state: Arc<Mutex<MockState>>,
}

impl Connection for MockConnection {
    type Tx<'conn>
        = MockTransaction
    where
        Self: 'conn;

    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn query(
        &self,
        _cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send {
        let state = Arc::clone(&self.state);
        let sql = sql.to_string();
        let params = params.to_vec();
        async move {
            let mut guard = state.lock().expect("lock poisoned");
            guard.log.push((sql, params));
            let rows = guard.query_results.pop_front().unwrap_or_default();
            Outcome::Ok(rows)
        }
    }

    fn query_one(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Option<Row>, Error>> + Send {
        let fut = self.query(cx, sql, params);
        async move {
            match fut.await {
                Outcome::Ok(rows) => Outcome::Ok(rows.into_iter().next()),
                Outcome::Err(e) => Outcome::Err(e),
                Outcome::Cancelled(r) => Outcome::Cancelled(r),
                Outcome::Panicked(p) => Outcome::Panicked(p),
            }
        }
    }

    fn execute(
        &self,
        _cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<u64, Error>> + Send {
        let state = Arc::clone(&self.state);
        let sql = sql.to_string();
        let params = params.to_vec();
        async move {
            let mut guard = state.lock().expect("lock poisoned");
            guard.log.push((sql, params));
            let count = guard.execute_results.pop_front().unwrap_or(0);
            Outcome::Ok(count)
        }
    }

    fn execute_returning(
        &self,
        _cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send {
        let state = Arc::clone(&self.state);
        let sql = sql.to_string();
        let params = params.to_vec();
        async move {
            let mut guard = state.lock().expect("lock poisoned");
            guard.log.push((sql, params));
            let rows = guard.returning_results.pop_front().unwrap_or_default();
            Outcome::Ok(rows)
        }
    }

    fn begin(&self, _cx: &Cx) -> impl Future<Output = Outcome<Self::Tx<'_>, Error>> + Send {
        let state = Arc::clone(&self.state);
        async move {
            state
                .lock()
                .expect("lock poisoned")
                .log
                .push(("BEGIN".to_string(), Vec::new()));
            Outcome::Ok(MockTransaction { state })
        }
    }

    fn begin_with(
        &self,
        cx: &Cx,
        _isolation: IsolationLevel,
    ) -> impl Future<Output = Outcome<Self::Tx<'_>, Error>> + Send {
        self.begin(cx)
    }
}

impl TransactionOps for MockTransaction {
    fn query(
        &self,
        _cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send {
        let state = Arc::clone(&self.state);
        let sql = sql.to_string();
        let params = params.to_vec();
        async move {
            let mut guard = state.lock().expect("lock poisoned");
            guard.log.push((sql, params));
            let rows = guard.query_results.pop_front().unwrap_or_default();
            Outcome::Ok(rows)
        }
    }

    fn execute(
        &self,
        _cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<u64, Error>> + Send {
        let state = Arc::clone(&self.state);
        let sql = sql.to_string();
        let params = params.to_vec();
        async move {
            let mut guard = state.lock().expect("lock poisoned");
            guard.log.push((sql, params));
            let count = guard.execute_results.pop_front().unwrap_or(0);
            Outcome::Ok(count)
        }
    }

    fn commit(self, _cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send {
        let state = self.state;
        async move {
            state
                .lock()
                .expect("lock poisoned")
                .log
                .push(("COMMIT".to_string(), Vec::new()));
            Outcome::Ok(())
        }
    }

    fn rollback(self, _cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send {
        let state = self.state;
        async move {
            state
                .lock()
                .expect("lock poisoned")
                .log
                .push(("ROLLBACK".to_string(), Vec::new()));
            Outcome::Ok(())
        }
    }
}

/// Build rows holding a single `id` column.
pub fn id_rows(ids: &[i64]) -> Vec<Row> {
    ids.iter()
        .map(|&id| Row::new(vec!["id".into()], vec![Value::BigInt(id)]))
        .collect()
}

// ----------------------------------------------------------------------------
// Shared models: a small music catalog exercising every deletion policy.
// ----------------------------------------------------------------------------

/// Sensor reading with a composite unique constraint, for upsert tests.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub id: Option<i64>,
    pub sensor: i64,
    pub window: i64,
    pub level: f64,
}

impl Model for Reading {
    const TABLE_NAME: &'static str = "readings";
    const PRIMARY_KEY: &'static [&'static str] = &["id"];
    const UNIQUE_CONSTRAINTS: &'static [UniqueConstraintInfo] =
        &[UniqueConstraintInfo::new(&["sensor", "window"]).name("uq_sensor_window")];

    fn fields() -> &'static [FieldInfo] {
        static FIELDS: &[FieldInfo] = &[
            FieldInfo::new("id", "id", SqlType::BigInt)
                .primary_key(true)
                .auto_increment(true),
            FieldInfo::new("sensor", "sensor", SqlType::BigInt),
            FieldInfo::new("window", "window", SqlType::BigInt),
            FieldInfo::new("level", "level", SqlType::Double),
        ];
        FIELDS
    }

    fn to_row(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("id", self.id.map_or(Value::Null, Value::BigInt)),
            ("sensor", Value::BigInt(self.sensor)),
            ("window", Value::BigInt(self.window)),
            ("level", Value::Double(self.level)),
        ]
    }

    fn from_row(row: &Row) -> relwrite::Result<Self> {
        Ok(Self {
            id: row.get_named("id")?,
            sensor: row.get_named("sensor")?,
            window: row.get_named("window")?,
            level: row.get_named("level")?,
        })
    }

    fn primary_key_value(&self) -> Vec<Value> {
        vec![self.id.map_or(Value::Null, Value::BigInt)]
    }

    fn is_new(&self) -> bool {
        self.id.is_none()
    }

    fn set_primary_key(&mut self, value: Value) {
        if let Value::BigInt(id) = value {
            self.id = Some(id);
        }
    }
}

macro_rules! pk_only_model {
    ($name:ident, $table:literal, $fields:expr) => {
        #[derive(Debug, Clone)]
        pub struct $name {
            pub id: Option<i64>,
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

            fn from_row(row: &Row) -> relwrite::Result<Self> {
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

pk_only_model!(
    Artist,
    "artists",
    &[FieldInfo::new("id", "id", SqlType::BigInt).primary_key(true)]
);
pk_only_model!(
    Album,
    "albums",
    &[
        FieldInfo::new("id", "id", SqlType::BigInt).primary_key(true),
        FieldInfo::new("artist_id", "artist_id", SqlType::BigInt)
            .foreign_key("artists.id")
            .on_delete(OnDelete::Cascade),
    ]
);
pk_only_model!(
    Review,
    "reviews",
    &[
        FieldInfo::new("id", "id", SqlType::BigInt).primary_key(true),
        FieldInfo::new("album_id", "album_id", SqlType::BigInt)
            .foreign_key("albums.id")
            .on_delete(OnDelete::Protect),
    ]
);
pk_only_model!(
    Note,
    "notes",
    &[FieldInfo::new("id", "id", SqlType::BigInt).primary_key(true)]
);
pk_only_model!(
    DeleteTop,
    "delete_tops",
    &[FieldInfo::new("id", "id", SqlType::BigInt).primary_key(true)]
);
pk_only_model!(
    Branch,
    "branches",
    &[
        FieldInfo::new("id", "id", SqlType::BigInt).primary_key(true),
        FieldInfo::new("top_id", "top_id", SqlType::BigInt)
            .foreign_key("delete_tops.id")
            .on_delete(OnDelete::Cascade),
    ]
);
pk_only_model!(
    DeleteBottom,
    "delete_bottoms",
    &[
        FieldInfo::new("id", "id", SqlType::BigInt).primary_key(true),
        FieldInfo::new("top_id", "top_id", SqlType::BigInt)
            .foreign_key("delete_tops.id")
            .on_delete(OnDelete::Cascade),
        FieldInfo::new("branch_id", "branch_id", SqlType::BigInt)
            .foreign_key("branches.id")
            .on_delete(OnDelete::Restrict),
    ]
);
