//! An in-process host that speaks the real wire envelope through the real
//! `HostCalls` seam, backed by rusqlite and an in-memory object map. Lets the
//! whole encode/invoke/decode path run natively.

use std::collections::BTreeMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params_from_iter, Connection};
use skiff_bridge::{HostCalls, HostOp};
use skiff_core::{
    encode_reply_err, encode_reply_ok, BeginReply, Error, ExecReply, ExistsReply, HeadObjectReply,
    ListObjectsReply, ObjectInfo, ObjectReply, QueryRequest, QueryResult, StorageRequest,
    TxRequest, Value,
};

struct StoredObject {
    data: Vec<u8>,
    content_type: Option<String>,
    uploaded_at: DateTime<Utc>,
}

struct HostState {
    conn: Connection,
    next_tx: u32,
    open_tx: Option<u32>,
    buckets: BTreeMap<String, BTreeMap<String, StoredObject>>,
    calls: u64,
    garble_next_reply: bool,
}

pub struct FakeHost {
    state: Mutex<HostState>,
}

impl FakeHost {
    pub fn new() -> Self {
        let conn = Connection::open_in_memory().expect("in-memory sqlite should open");
        Self {
            state: Mutex::new(HostState {
                conn,
                next_tx: 1,
                open_tx: None,
                buckets: BTreeMap::new(),
                calls: 0,
                garble_next_reply: false,
            }),
        }
    }

    /// Number of imports the guest has invoked so far.
    pub fn calls(&self) -> u64 {
        self.state.lock().expect("host state lock").calls
    }

    /// Makes the next reply undecodable, to exercise the protocol error path.
    pub fn garble_next_reply(&self) {
        self.state.lock().expect("host state lock").garble_next_reply = true;
    }
}

impl HostCalls for FakeHost {
    fn call(&self, op: HostOp, request: &[u8]) -> Result<Vec<u8>, Error> {
        let mut state = self.state.lock().expect("host state lock");
        state.calls += 1;
        if state.garble_next_reply {
            state.garble_next_reply = false;
            return Ok(b"}{ definitely not a reply".to_vec());
        }
        // The request buffer belongs to the guest; copy what we need and
        // never hold onto the slice.
        let request = request.to_vec();
        let reply = dispatch(&mut state, op, &request);
        match reply {
            Ok(payload) => Ok(payload),
            Err(err) => Ok(encode_reply_err(&err).expect("error reply should encode")),
        }
    }
}

fn dispatch(state: &mut HostState, op: HostOp, request: &[u8]) -> Result<Vec<u8>, Error> {
    match op {
        HostOp::DbQuery => {
            let req: QueryRequest = parse(request)?;
            check_tx(state, req.tx)?;
            let result = run_query(&state.conn, &req.sql, &req.args)?;
            encode_reply_ok(&result)
        }
        HostOp::DbExecute => {
            let req: QueryRequest = parse(request)?;
            check_tx(state, req.tx)?;
            let rows_affected = run_exec(&state.conn, &req.sql, &req.args)?;
            encode_reply_ok(&ExecReply { rows_affected })
        }
        HostOp::DbBegin => {
            if state.open_tx.is_some() {
                return Err(Error::backend("host supports one open transaction"));
            }
            state
                .conn
                .execute_batch("BEGIN")
                .map_err(|err| Error::backend(err.to_string()))?;
            let tx = state.next_tx;
            state.next_tx += 1;
            state.open_tx = Some(tx);
            encode_reply_ok(&BeginReply { tx })
        }
        HostOp::DbCommit | HostOp::DbRollback => {
            let req: TxRequest = parse(request)?;
            check_tx(state, Some(req.tx))?;
            let sql = if op == HostOp::DbCommit { "COMMIT" } else { "ROLLBACK" };
            state
                .conn
                .execute_batch(sql)
                .map_err(|err| Error::backend(err.to_string()))?;
            state.open_tx = None;
            encode_reply_ok(&())
        }
        HostOp::StorageCreateBucket => match parse(request)? {
            StorageRequest::CreateBucket { bucket } => {
                state.buckets.entry(bucket).or_default();
                encode_reply_ok(&())
            }
            other => Err(bad_request(op, &other)),
        },
        HostOp::StorageBucketExists => match parse(request)? {
            StorageRequest::BucketExists { bucket } => encode_reply_ok(&ExistsReply {
                exists: state.buckets.contains_key(&bucket),
            }),
            other => Err(bad_request(op, &other)),
        },
        HostOp::StoragePutObject => match parse(request)? {
            StorageRequest::PutObject {
                bucket,
                key,
                data,
                content_type,
            } => {
                let bucket = state
                    .buckets
                    .get_mut(&bucket)
                    .ok_or_else(|| Error::not_found(format!("bucket '{bucket}' does not exist")))?;
                bucket.insert(
                    key,
                    StoredObject {
                        data,
                        content_type,
                        uploaded_at: Utc::now(),
                    },
                );
                encode_reply_ok(&())
            }
            other => Err(bad_request(op, &other)),
        },
        HostOp::StorageGetObject => match parse(request)? {
            StorageRequest::GetObject { bucket, key } => {
                let object = find_object(state, &bucket, &key)?;
                encode_reply_ok(&ObjectReply {
                    data: object.data.clone(),
                })
            }
            other => Err(bad_request(op, &other)),
        },
        HostOp::StorageHeadObject => match parse(request)? {
            StorageRequest::HeadObject { bucket, key } => {
                let object = find_object(state, &bucket, &key)?;
                encode_reply_ok(&HeadObjectReply {
                    info: object_info(&key, object),
                })
            }
            other => Err(bad_request(op, &other)),
        },
        HostOp::StorageListObjects => match parse(request)? {
            StorageRequest::ListObjects { bucket, prefix } => {
                let objects = state
                    .buckets
                    .get(&bucket)
                    .ok_or_else(|| Error::not_found(format!("bucket '{bucket}' does not exist")))?;
                let infos = objects
                    .iter()
                    .filter(|(key, _)| {
                        prefix.as_deref().map_or(true, |prefix| key.starts_with(prefix))
                    })
                    .map(|(key, object)| object_info(key, object))
                    .collect::<Vec<_>>();
                encode_reply_ok(&ListObjectsReply { objects: infos })
            }
            other => Err(bad_request(op, &other)),
        },
        HostOp::StorageDeleteObject => match parse(request)? {
            StorageRequest::DeleteObject { bucket, key } => {
                let objects = state
                    .buckets
                    .get_mut(&bucket)
                    .ok_or_else(|| Error::not_found(format!("bucket '{bucket}' does not exist")))?;
                objects
                    .remove(&key)
                    .ok_or_else(|| Error::not_found(format!("object '{key}' does not exist")))?;
                encode_reply_ok(&())
            }
            other => Err(bad_request(op, &other)),
        },
    }
}

fn parse<T: serde::de::DeserializeOwned>(request: &[u8]) -> Result<T, Error> {
    serde_json::from_slice(request)
        .map_err(|err| Error::protocol(format!("malformed request payload: {err}")))
}

fn bad_request(op: HostOp, request: &StorageRequest) -> Error {
    Error::protocol(format!("import '{}' got request {request:?}", op.name()))
}

fn check_tx(state: &HostState, tx: Option<u32>) -> Result<(), Error> {
    match tx {
        None => Ok(()),
        Some(handle) if state.open_tx == Some(handle) => Ok(()),
        Some(handle) => Err(Error::invalid_handle(format!(
            "transaction handle {handle} is not open on the host"
        ))),
    }
}

fn find_object<'a>(
    state: &'a HostState,
    bucket: &str,
    key: &str,
) -> Result<&'a StoredObject, Error> {
    state
        .buckets
        .get(bucket)
        .ok_or_else(|| Error::not_found(format!("bucket '{bucket}' does not exist")))?
        .get(key)
        .ok_or_else(|| Error::not_found(format!("object '{key}' does not exist")))
}

fn object_info(key: &str, object: &StoredObject) -> ObjectInfo {
    ObjectInfo {
        key: key.to_string(),
        size: object.data.len() as u64,
        content_type: object.content_type.clone(),
        etag: None,
        last_modified: Some(object.uploaded_at),
    }
}

fn run_query(conn: &Connection, sql: &str, args: &[Value]) -> Result<QueryResult, Error> {
    let mut stmt = conn
        .prepare(sql)
        .map_err(|err| Error::backend(err.to_string()))?;
    let columns = stmt
        .column_names()
        .into_iter()
        .map(|name| name.to_string())
        .collect::<Vec<_>>();
    let mut rows = stmt
        .query(params_from_iter(args.iter().map(to_sql_value)))
        .map_err(|err| Error::backend(err.to_string()))?;
    let mut out_rows = Vec::new();
    while let Some(row) = rows
        .next()
        .map_err(|err| Error::backend(err.to_string()))?
    {
        let mut out = Vec::with_capacity(columns.len());
        for idx in 0..columns.len() {
            let value = row
                .get_ref(idx)
                .map_err(|err| Error::backend(err.to_string()))?;
            out.push(match value {
                rusqlite::types::ValueRef::Null => Value::Null,
                rusqlite::types::ValueRef::Integer(v) => Value::I64(v),
                rusqlite::types::ValueRef::Real(v) => Value::F64(v),
                rusqlite::types::ValueRef::Text(v) => {
                    Value::Text(String::from_utf8_lossy(v).to_string())
                }
                rusqlite::types::ValueRef::Blob(v) => Value::Blob(v.to_vec()),
            });
        }
        out_rows.push(out);
    }
    Ok(QueryResult {
        columns,
        rows: out_rows,
    })
}

fn run_exec(conn: &Connection, sql: &str, args: &[Value]) -> Result<u64, Error> {
    conn.execute(sql, params_from_iter(args.iter().map(to_sql_value)))
        .map(|affected| affected as u64)
        .map_err(|err| Error::backend(err.to_string()))
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
