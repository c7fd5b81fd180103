use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::storage::ObjectInfo;
use crate::{Error, ErrorKind, Value};

/// A fully materialized result set. The whole set crosses the boundary in a
/// single call; there is no streaming cursor in this layer.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl QueryResult {
    /// Every row must have exactly one value per column. A violating result
    /// is rejected as a protocol error, never truncated or padded.
    pub fn check_arity(&self) -> Result<(), Error> {
        for (index, row) in self.rows.iter().enumerate() {
            if row.len() != self.columns.len() {
                return Err(Error::protocol(format!(
                    "row {index} has {} values but the result has {} columns",
                    row.len(),
                    self.columns.len()
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub sql: String,
    pub args: Vec<Value>,
    /// Transaction handle assigned by the host `begin` import, if any.
    pub tx: Option<u32>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TxRequest {
    pub tx: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BeginReply {
    pub tx: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ExecReply {
    pub rows_affected: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StorageRequest {
    CreateBucket {
        bucket: String,
    },
    BucketExists {
        bucket: String,
    },
    PutObject {
        bucket: String,
        key: String,
        data: Vec<u8>,
        content_type: Option<String>,
    },
    GetObject {
        bucket: String,
        key: String,
    },
    HeadObject {
        bucket: String,
        key: String,
    },
    ListObjects {
        bucket: String,
        prefix: Option<String>,
    },
    DeleteObject {
        bucket: String,
        key: String,
    },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ExistsReply {
    pub exists: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectReply {
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeadObjectReply {
    pub info: ObjectInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListObjectsReply {
    pub objects: Vec<ObjectInfo>,
}

/// The structured error half of every import reply. Codes are the stable
/// `SKIFF_ERROR_*` strings so the kind survives the boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireError {
    pub code: String,
    pub message: String,
}

impl From<&Error> for WireError {
    fn from(error: &Error) -> Self {
        Self {
            code: error.kind.as_str().to_string(),
            message: error.message.clone(),
        }
    }
}

impl From<WireError> for Error {
    fn from(wire: WireError) -> Self {
        match ErrorKind::from_code(&wire.code) {
            Some(kind) => Error::new(kind, wire.message),
            // A host backend may surface its own codes; keep them as backend
            // failures rather than declaring a contract violation.
            None => Error::backend(format!("{}: {}", wire.code, wire.message)),
        }
    }
}

/// Every import replies with either a success payload or a structured error,
/// never a bare boolean or a silent default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Reply<T> {
    Ok(T),
    Err(WireError),
}

pub fn encode_request<T: Serialize>(request: &T) -> Result<Vec<u8>, Error> {
    serde_json::to_vec(request)
        .map_err(|error| Error::encoding(format!("failed to encode request payload: {error}")))
}

pub fn encode_reply_ok<T: Serialize>(value: &T) -> Result<Vec<u8>, Error> {
    serde_json::to_vec(&Reply::Ok(value))
        .map_err(|error| Error::encoding(format!("failed to encode reply payload: {error}")))
}

pub fn encode_reply_err(error: &Error) -> Result<Vec<u8>, Error> {
    serde_json::to_vec(&Reply::<()>::Err(WireError::from(error)))
        .map_err(|error| Error::encoding(format!("failed to encode reply payload: {error}")))
}

/// Decodes an import reply, surfacing the wire error with its original kind.
/// A payload that fails to parse is a contract violation, logged and fatal.
pub fn decode_reply<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, Error> {
    let reply: Reply<T> = serde_json::from_slice(bytes).map_err(|error| {
        let err = Error::protocol(format!("malformed boundary reply: {error}"));
        tracing::error!(%err, "rejecting boundary reply");
        err
    })?;
    match reply {
        Reply::Ok(value) => Ok(value),
        Reply::Err(wire) => Err(wire.into()),
    }
}

pub fn decode_query_result(bytes: &[u8]) -> Result<QueryResult, Error> {
    let result: QueryResult = decode_reply(bytes)?;
    result.check_arity()?;
    Ok(result)
}
