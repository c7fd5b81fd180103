use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::{params_from_iter, Connection};
use skiff_core::{
    Database, Error, ExecResult, QueryResult, Rows, Statement, Transaction, Value,
    SQLITE_MEMORY_PATH,
};

const BACKEND: &str = "sqlite";

/// Embedded single-file backend. A mutex serializes all access (single-writer
/// discipline); WAL mode lets readers outside this process proceed.
pub struct SqliteDatabase {
    conn: Mutex<Connection>,
}

impl SqliteDatabase {
    pub fn open(path: &str, wal: bool, busy_timeout_ms: u64) -> Result<Self, Error> {
        let conn = if path == SQLITE_MEMORY_PATH {
            Connection::open_in_memory()
        } else {
            Connection::open(path)
        }
        .map_err(|err| Error::connectivity(format!("failed to open sqlite at {path}: {err}")))?;

        conn.busy_timeout(Duration::from_millis(busy_timeout_ms))
            .map_err(backend_error)?;
        if wal && path != SQLITE_MEMORY_PATH {
            // journal_mode reports the resulting mode as a row, so it cannot
            // go through execute.
            let mode: String = conn
                .query_row("PRAGMA journal_mode=wal", [], |row| row.get(0))
                .map_err(backend_error)?;
            if !mode.eq_ignore_ascii_case("wal") {
                return Err(Error::backend(format!(
                    "failed to enable wal mode for {path}: journal_mode is {mode}"
                )));
            }
        }

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> Result<Self, Error> {
        Self::open(SQLITE_MEMORY_PATH, false, 0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, Error> {
        self.conn
            .lock()
            .map_err(|_| Error::backend("sqlite mutex poisoned"))
    }
}

#[async_trait(?Send)]
impl Database for SqliteDatabase {
    fn backend_name(&self) -> &'static str {
        BACKEND
    }

    async fn ping(&self) -> Result<(), Error> {
        let conn = self.lock()?;
        conn.query_row("SELECT 1", [], |_| Ok(()))
            .map_err(|err| Error::connectivity(err.to_string()))
    }

    async fn begin(&self) -> Result<Box<dyn Transaction + '_>, Error> {
        let conn = self.lock()?;
        conn.execute_batch("BEGIN").map_err(backend_error)?;
        Ok(Box::new(SqliteTransaction { conn, done: false }))
    }

    async fn query(&self, sql: &str, args: &[Value]) -> Result<Rows, Error> {
        let conn = self.lock()?;
        run_query(&conn, sql, args)
    }

    async fn exec(&self, sql: &str, args: &[Value]) -> Result<ExecResult, Error> {
        let conn = self.lock()?;
        run_exec(&conn, sql, args)
    }

    async fn prepare(&self, sql: &str) -> Result<Box<dyn Statement + '_>, Error> {
        let conn = self.lock()?;
        // Compile now so malformed SQL fails at prepare time; the connection's
        // statement cache keeps the compiled form for reuse.
        conn.prepare_cached(sql).map_err(backend_error)?;
        Ok(Box::new(SqliteStatement {
            conn,
            sql: sql.to_string(),
        }))
    }
}

/// Holds the connection mutex for its whole lifetime, so nothing else can
/// interleave with the transaction.
struct SqliteTransaction<'a> {
    conn: MutexGuard<'a, Connection>,
    done: bool,
}

impl SqliteTransaction<'_> {
    fn live(&self) -> Result<(), Error> {
        if self.done {
            return Err(Error::invalid_handle(
                "sqlite transaction already committed or rolled back",
            ));
        }
        Ok(())
    }
}

#[async_trait(?Send)]
impl Transaction for SqliteTransaction<'_> {
    async fn query(&mut self, sql: &str, args: &[Value]) -> Result<Rows, Error> {
        self.live()?;
        run_query(&self.conn, sql, args)
    }

    async fn exec(&mut self, sql: &str, args: &[Value]) -> Result<ExecResult, Error> {
        self.live()?;
        run_exec(&self.conn, sql, args)
    }

    async fn commit(&mut self) -> Result<(), Error> {
        self.live()?;
        self.conn.execute_batch("COMMIT").map_err(backend_error)?;
        self.done = true;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), Error> {
        self.live()?;
        self.conn.execute_batch("ROLLBACK").map_err(backend_error)?;
        self.done = true;
        Ok(())
    }
}

impl Drop for SqliteTransaction<'_> {
    fn drop(&mut self) {
        // A dropped, unresolved transaction must not leak into later calls on
        // the same connection.
        if !self.done {
            let _ = self.conn.execute_batch("ROLLBACK");
        }
    }
}

struct SqliteStatement<'a> {
    conn: MutexGuard<'a, Connection>,
    sql: String,
}

#[async_trait(?Send)]
impl Statement for SqliteStatement<'_> {
    async fn query(&mut self, args: &[Value]) -> Result<Rows, Error> {
        run_query(&self.conn, &self.sql, args)
    }

    async fn exec(&mut self, args: &[Value]) -> Result<ExecResult, Error> {
        run_exec(&self.conn, &self.sql, args)
    }
}

fn run_query(conn: &Connection, sql: &str, args: &[Value]) -> Result<Rows, Error> {
    let mut stmt = conn.prepare_cached(sql).map_err(backend_error)?;
    let columns = stmt
        .column_names()
        .into_iter()
        .map(|name| name.to_string())
        .collect::<Vec<_>>();
    let mut rows = stmt
        .query(params_from_iter(args.iter().map(to_sql_value)))
        .map_err(backend_error)?;
    let mut out_rows = Vec::new();
    while let Some(row) = rows.next().map_err(backend_error)? {
        let mut out = Vec::with_capacity(columns.len());
        for idx in 0..columns.len() {
            let value = row.get_ref(idx).map_err(backend_error)?;
            out.push(from_sql_value(value));
        }
        out_rows.push(out);
    }
    Rows::new(QueryResult {
        columns,
        rows: out_rows,
    })
}

fn run_exec(conn: &Connection, sql: &str, args: &[Value]) -> Result<ExecResult, Error> {
    let mut stmt = conn.prepare_cached(sql).map_err(backend_error)?;
    let affected = stmt
        .execute(params_from_iter(args.iter().map(to_sql_value)))
        .map_err(backend_error)?;
    Ok(ExecResult::new(
        affected as u64,
        Some(conn.last_insert_rowid()),
        BACKEND,
    ))
}

fn to_sql_value(value: &Value) -> rusqlite::types::Value {
    match value {
        Value::Null => rusqlite::types::Value::Null,
        Value::Bool(v) => rusqlite::types::Value::Integer((*v).into()),
        Value::I32(v) => rusqlite::types::Value::Integer((*v).into()),
        Value::I64(v) => rusqlite::types::Value::Integer(*v),
        Value::F64(v) => rusqlite::types::Value::Real(*v),
        Value::Text(v) => rusqlite::types::Value::Text(v.clone()),
        Value::Blob(v) => rusqlite::types::Value::Blob(v.clone()),
    }
}

// SQLite has exactly five storage classes, so this mapping is total. Integers
// always widen to I64.
fn from_sql_value(value: rusqlite::types::ValueRef<'_>) -> Value {
    match value {
        rusqlite::types::ValueRef::Null => Value::Null,
        rusqlite::types::ValueRef::Integer(v) => Value::I64(v),
        rusqlite::types::ValueRef::Real(v) => Value::F64(v),
        rusqlite::types::ValueRef::Text(v) => Value::Text(String::from_utf8_lossy(v).to_string()),
        rusqlite::types::ValueRef::Blob(v) => Value::Blob(v.to_vec()),
    }
}

fn backend_error(err: rusqlite::Error) -> Error {
    Error::backend(err.to_string())
}
