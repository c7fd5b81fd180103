use async_trait::async_trait;

use crate::wire::QueryResult;
use crate::{Error, FromValue, Value};

/// Cursor over a materialized [`QueryResult`]. Construction checks the arity
/// invariant once so every row handed out is well formed.
#[derive(Debug)]
pub struct Rows {
    result: QueryResult,
    cursor: usize,
}

impl Rows {
    pub fn new(result: QueryResult) -> Result<Self, Error> {
        result.check_arity()?;
        Ok(Self { result, cursor: 0 })
    }

    pub fn columns(&self) -> &[String] {
        &self.result.columns
    }

    pub fn len(&self) -> usize {
        self.result.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.result.rows.is_empty()
    }

    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<Row<'_>> {
        let values = self.result.rows.get(self.cursor)?;
        self.cursor += 1;
        Some(Row {
            columns: &self.result.columns,
            values,
        })
    }

    /// Consumes the cursor and returns the first row. Zero rows is the
    /// distinct not-found error, never a null dereference.
    pub fn into_first(mut self) -> Result<OwnedRow, Error> {
        if self.result.rows.is_empty() {
            return Err(Error::not_found("query returned no rows"));
        }
        Ok(OwnedRow {
            columns: self.result.columns,
            values: self.result.rows.swap_remove(0),
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    columns: &'a [String],
    values: &'a [Value],
}

fn column_index(columns: &[String], name: &str) -> Result<usize, Error> {
    columns
        .iter()
        .position(|column| column == name)
        .ok_or_else(|| Error::not_found(format!("no column named '{name}' in result")))
}

fn get_at<T: FromValue>(values: &[Value], index: usize) -> Result<T, Error> {
    let value = values.get(index).ok_or_else(|| {
        Error::not_found(format!(
            "column index {index} out of range for row of {} values",
            values.len()
        ))
    })?;
    T::from_value(value)
}

impl Row<'_> {
    pub fn columns(&self) -> &[String] {
        self.columns
    }

    pub fn values(&self) -> &[Value] {
        self.values
    }

    pub fn get<T: FromValue>(&self, index: usize) -> Result<T, Error> {
        get_at(self.values, index)
    }

    pub fn get_by_name<T: FromValue>(&self, name: &str) -> Result<T, Error> {
        get_at(self.values, column_index(self.columns, name)?)
    }
}

/// A row detached from its cursor, as returned by `query_row`.
#[derive(Debug, Clone, PartialEq)]
pub struct OwnedRow {
    columns: Vec<String>,
    values: Vec<Value>,
}

impl OwnedRow {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn get<T: FromValue>(&self, index: usize) -> Result<T, Error> {
        get_at(&self.values, index)
    }

    pub fn get_by_name<T: FromValue>(&self, name: &str) -> Result<T, Error> {
        get_at(&self.values, column_index(&self.columns, name)?)
    }
}

/// Outcome of a mutating statement. `rows_affected` is always available;
/// `last_insert_id` fails on backends that cannot supply it so callers never
/// trust a meaningless zero.
#[derive(Debug, Clone, Copy)]
pub struct ExecResult {
    rows_affected: u64,
    last_insert_id: Option<i64>,
    backend: &'static str,
}

impl ExecResult {
    pub fn new(rows_affected: u64, last_insert_id: Option<i64>, backend: &'static str) -> Self {
        Self {
            rows_affected,
            last_insert_id,
            backend,
        }
    }

    pub fn rows_affected(&self) -> u64 {
        self.rows_affected
    }

    pub fn last_insert_id(&self) -> Result<i64, Error> {
        self.last_insert_id
            .ok_or_else(|| Error::unsupported("last_insert_id", self.backend))
    }
}

/// The database capability. One identical contract for every adapter; call
/// sites never know which backend is underneath.
#[async_trait(?Send)]
pub trait Database: Send + Sync {
    fn backend_name(&self) -> &'static str;

    /// Liveness check. Must not mutate state.
    async fn ping(&self) -> Result<(), Error>;

    async fn begin(&self) -> Result<Box<dyn Transaction + '_>, Error>;

    async fn query(&self, sql: &str, args: &[Value]) -> Result<Rows, Error>;

    async fn query_row(&self, sql: &str, args: &[Value]) -> Result<OwnedRow, Error> {
        self.query(sql, args).await?.into_first()
    }

    async fn exec(&self, sql: &str, args: &[Value]) -> Result<ExecResult, Error>;

    /// Backends that cannot prepare must fail explicitly rather than silently
    /// executing unprepared.
    async fn prepare(&self, sql: &str) -> Result<Box<dyn Statement + '_>, Error>;

    /// Structural scan convenience, kept for interface parity across
    /// adapters. No adapter in this layer implements it.
    async fn select_maps(
        &self,
        sql: &str,
        args: &[Value],
    ) -> Result<Vec<serde_json::Map<String, serde_json::Value>>, Error> {
        let _ = (sql, args);
        Err(Error::unsupported("select_maps", self.backend_name()))
    }
}

/// A live transaction. `commit` and `rollback` are terminal: any call after
/// either one returns the invalid-handle error.
#[async_trait(?Send)]
pub trait Transaction {
    async fn query(&mut self, sql: &str, args: &[Value]) -> Result<Rows, Error>;

    async fn query_row(&mut self, sql: &str, args: &[Value]) -> Result<OwnedRow, Error> {
        self.query(sql, args).await?.into_first()
    }

    async fn exec(&mut self, sql: &str, args: &[Value]) -> Result<ExecResult, Error>;

    async fn commit(&mut self) -> Result<(), Error>;

    async fn rollback(&mut self) -> Result<(), Error>;
}

/// A prepared statement bound to its originating connection.
#[async_trait(?Send)]
pub trait Statement {
    async fn query(&mut self, args: &[Value]) -> Result<Rows, Error>;

    async fn exec(&mut self, args: &[Value]) -> Result<ExecResult, Error>;
}
