mod config;
mod db;
mod error;
mod storage;
mod value;
mod wire;

pub use config::{DataConfig, DatabaseConfig, PoolConfig, StorageConfig, SQLITE_MEMORY_PATH};
pub use db::{Database, ExecResult, OwnedRow, Row, Rows, Statement, Transaction};
pub use error::{Error, ErrorKind};
pub use storage::{check_put_size, BucketInfo, ObjectInfo, StorageProvider};
pub use value::{FromValue, Value};
pub use wire::{
    decode_query_result, decode_reply, encode_reply_err, encode_reply_ok, encode_request,
    BeginReply, ExecReply, ExistsReply, HeadObjectReply, ListObjectsReply, ObjectReply,
    QueryRequest, QueryResult, Reply, StorageRequest, TxRequest, WireError,
};
