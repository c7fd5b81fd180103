use std::time::Duration;

use async_trait::async_trait;
use skiff_core::{
    Database, Error, ExecResult, PoolConfig, QueryResult, Rows, Statement, Transaction, Value,
};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{Column, Connection, PgPool, Row, ValueRef};
use tokio::sync::OnceCell;

const BACKEND: &str = "postgres";

/// Client-server backend over a bounded sqlx pool. Pool limits come from the
/// configuration object, not from constants.
pub struct PostgresDatabase {
    url: String,
    config: PoolConfig,
    pool: OnceCell<PgPool>,
}

impl PostgresDatabase {
    pub fn new(url: String, config: PoolConfig) -> Self {
        Self {
            url,
            config,
            pool: OnceCell::const_new(),
        }
    }

    async fn pool(&self) -> Result<&PgPool, Error> {
        self.pool
            .get_or_try_init(|| async {
                PgPoolOptions::new()
                    .max_connections(self.config.max_connections)
                    .acquire_timeout(Duration::from_millis(self.config.acquire_timeout_ms))
                    .idle_timeout(Duration::from_millis(self.config.idle_timeout_ms))
                    .max_lifetime(Duration::from_millis(self.config.max_lifetime_ms))
                    .connect(&self.url)
                    .await
                    .map_err(|err| {
                        Error::connectivity(format!("failed to connect to postgres: {err}"))
                    })
            })
            .await
    }
}

#[async_trait(?Send)]
impl Database for PostgresDatabase {
    fn backend_name(&self) -> &'static str {
        BACKEND
    }

    async fn ping(&self) -> Result<(), Error> {
        let pool = self.pool().await?;
        let mut conn = pool.acquire().await.map_err(acquire_error)?;
        conn.ping()
            .await
            .map_err(|err| Error::connectivity(err.to_string()))
    }

    async fn begin(&self) -> Result<Box<dyn Transaction + '_>, Error> {
        let pool = self.pool().await?;
        let tx = pool.begin().await.map_err(acquire_error)?;
        Ok(Box::new(PostgresTransaction { tx: Some(tx) }))
    }

    async fn query(&self, sql: &str, args: &[Value]) -> Result<Rows, Error> {
        let pool = self.pool().await?;
        let mut query = sqlx::query(sql);
        for arg in args {
            query = bind_value(query, arg);
        }
        let rows = query.fetch_all(pool).await.map_err(backend_error)?;
        collect_rows(rows)
    }

    async fn exec(&self, sql: &str, args: &[Value]) -> Result<ExecResult, Error> {
        let pool = self.pool().await?;
        let mut query = sqlx::query(sql);
        for arg in args {
            query = bind_value(query, arg);
        }
        let outcome = query.execute(pool).await.map_err(backend_error)?;
        // Postgres has no cross-statement insert id; callers use RETURNING.
        Ok(ExecResult::new(outcome.rows_affected(), None, BACKEND))
    }

    async fn prepare(&self, sql: &str) -> Result<Box<dyn Statement + '_>, Error> {
        let _ = sql;
        // A prepared statement is scoped to one connection; a pool hands out
        // whichever connection is free, so there is no statement to pin to.
        Err(Error::unsupported("prepare", BACKEND))
    }
}

/// sqlx transaction pinned to one pool connection. Drop without commit rolls
/// back and the pool slot is released on every exit path.
struct PostgresTransaction {
    tx: Option<sqlx::Transaction<'static, sqlx::Postgres>>,
}

impl PostgresTransaction {
    fn live(&mut self) -> Result<&mut sqlx::Transaction<'static, sqlx::Postgres>, Error> {
        self.tx.as_mut().ok_or_else(|| {
            Error::invalid_handle("postgres transaction already committed or rolled back")
        })
    }
}

#[async_trait(?Send)]
impl Transaction for PostgresTransaction {
    async fn query(&mut self, sql: &str, args: &[Value]) -> Result<Rows, Error> {
        let tx = self.live()?;
        let mut query = sqlx::query(sql);
        for arg in args {
            query = bind_value(query, arg);
        }
        let rows = query.fetch_all(&mut **tx).await.map_err(backend_error)?;
        collect_rows(rows)
    }

    async fn exec(&mut self, sql: &str, args: &[Value]) -> Result<ExecResult, Error> {
        let tx = self.live()?;
        let mut query = sqlx::query(sql);
        for arg in args {
            query = bind_value(query, arg);
        }
        let outcome = query.execute(&mut **tx).await.map_err(backend_error)?;
        Ok(ExecResult::new(outcome.rows_affected(), None, BACKEND))
    }

    async fn commit(&mut self) -> Result<(), Error> {
        let tx = self.tx.take().ok_or_else(|| {
            Error::invalid_handle("postgres transaction already committed or rolled back")
        })?;
        tx.commit().await.map_err(backend_error)
    }

    async fn rollback(&mut self) -> Result<(), Error> {
        let tx = self.tx.take().ok_or_else(|| {
            Error::invalid_handle("postgres transaction already committed or rolled back")
        })?;
        tx.rollback().await.map_err(backend_error)
    }
}

fn bind_value<'q>(
    query: sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>,
    value: &'q Value,
) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
    match value {
        Value::Null => query.bind(Option::<i64>::None),
        Value::Bool(v) => query.bind(*v),
        Value::I32(v) => query.bind(*v),
        Value::I64(v) => query.bind(*v),
        Value::F64(v) => query.bind(*v),
        Value::Text(v) => query.bind(v.as_str()),
        Value::Blob(v) => query.bind(v.as_slice()),
    }
}

fn collect_rows(rows: Vec<PgRow>) -> Result<Rows, Error> {
    let columns = rows
        .first()
        .map(|row| {
            row.columns()
                .iter()
                .map(|column| column.name().to_string())
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    let mut out_rows = Vec::with_capacity(rows.len());
    for row in &rows {
        let mut out = Vec::with_capacity(row.columns().len());
        for idx in 0..row.columns().len() {
            out.push(map_value(row, idx)?);
        }
        out_rows.push(out);
    }
    Rows::new(QueryResult {
        columns,
        rows: out_rows,
    })
}

fn map_value(row: &PgRow, index: usize) -> Result<Value, Error> {
    if row
        .try_get_raw(index)
        .map_err(|err| Error::backend(err.to_string()))?
        .is_null()
    {
        return Ok(Value::Null);
    }

    if let Ok(value) = row.try_get::<i64, _>(index) {
        return Ok(Value::I64(value));
    }
    if let Ok(value) = row.try_get::<i32, _>(index) {
        return Ok(Value::I32(value));
    }
    if let Ok(value) = row.try_get::<i16, _>(index) {
        return Ok(Value::I32(value.into()));
    }
    if let Ok(value) = row.try_get::<f64, _>(index) {
        return Ok(Value::F64(value));
    }
    if let Ok(value) = row.try_get::<f32, _>(index) {
        return Ok(Value::F64(value.into()));
    }
    if let Ok(value) = row.try_get::<bool, _>(index) {
        return Ok(Value::Bool(value));
    }
    if let Ok(value) = row.try_get::<String, _>(index) {
        return Ok(Value::Text(value));
    }
    if let Ok(value) = row.try_get::<Vec<u8>, _>(index) {
        return Ok(Value::Blob(value));
    }

    // Unknown column types fail fast instead of coercing to a wrong variant.
    Err(Error::encoding(format!(
        "postgres column {index} has no wire representation"
    )))
}

fn backend_error(err: sqlx::Error) -> Error {
    match err {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            Error::connectivity(err.to_string())
        }
        other => Error::backend(other.to_string()),
    }
}

fn acquire_error(err: sqlx::Error) -> Error {
    Error::connectivity(err.to_string())
}
