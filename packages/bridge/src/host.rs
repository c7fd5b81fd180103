use skiff_core::Error;

/// Numeric handles for the host import surface. The discriminants are the
/// import table indices and must not be reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum HostOp {
    DbQuery = 0,
    DbExecute = 1,
    DbBegin = 2,
    DbCommit = 3,
    DbRollback = 4,
    StorageCreateBucket = 5,
    StorageBucketExists = 6,
    StoragePutObject = 7,
    StorageGetObject = 8,
    StorageHeadObject = 9,
    StorageListObjects = 10,
    StorageDeleteObject = 11,
}

impl HostOp {
    pub const fn name(self) -> &'static str {
        match self {
            Self::DbQuery => "query",
            Self::DbExecute => "execute",
            Self::DbBegin => "begin-transaction",
            Self::DbCommit => "commit",
            Self::DbRollback => "rollback",
            Self::StorageCreateBucket => "create-bucket",
            Self::StorageBucketExists => "bucket-exists",
            Self::StoragePutObject => "put-object",
            Self::StorageGetObject => "get-object",
            Self::StorageHeadObject => "head-object",
            Self::StorageListObjects => "list-objects",
            Self::StorageDeleteObject => "delete-object",
        }
    }
}

/// Seam between the bridge adapters and the raw import surface: one encoded
/// request in, one encoded reply out. The wasm implementation performs the
/// full linear-memory transfer; tests plug an in-process host so the whole
/// encode/invoke/decode path runs natively.
///
/// An `Err` from `call` is a transport failure; host-side domain errors
/// travel inside the reply payload as `{code, message}`.
pub trait HostCalls: Send + Sync {
    fn call(&self, op: HostOp, request: &[u8]) -> Result<Vec<u8>, Error>;
}

#[cfg(target_arch = "wasm32")]
pub use wasm::WasmHost;

#[cfg(target_arch = "wasm32")]
mod wasm {
    use skiff_core::Error;

    use super::{HostCalls, HostOp};
    use crate::mem::{unpack_reply, ReplyBuf};

    #[link(wasm_import_module = "skiff_host")]
    extern "C" {
        fn db_query(req_ptr: u32, req_len: u32) -> u64;
        fn db_execute(req_ptr: u32, req_len: u32) -> u64;
        fn db_begin(req_ptr: u32, req_len: u32) -> u64;
        fn db_commit(req_ptr: u32, req_len: u32) -> u64;
        fn db_rollback(req_ptr: u32, req_len: u32) -> u64;
        fn storage_create_bucket(req_ptr: u32, req_len: u32) -> u64;
        fn storage_bucket_exists(req_ptr: u32, req_len: u32) -> u64;
        fn storage_put_object(req_ptr: u32, req_len: u32) -> u64;
        fn storage_get_object(req_ptr: u32, req_len: u32) -> u64;
        fn storage_head_object(req_ptr: u32, req_len: u32) -> u64;
        fn storage_list_objects(req_ptr: u32, req_len: u32) -> u64;
        fn storage_delete_object(req_ptr: u32, req_len: u32) -> u64;
    }

    /// The real boundary. Request buffers stay owned by this side and live
    /// until the import returns; reply buffers are host-written blocks from
    /// our `allocate` export, released by [`ReplyBuf`] once consumed.
    pub struct WasmHost;

    impl HostCalls for WasmHost {
        fn call(&self, op: HostOp, request: &[u8]) -> Result<Vec<u8>, Error> {
            let (req_ptr, req_len) = if request.is_empty() {
                (0, 0)
            } else {
                (request.as_ptr() as u32, request.len() as u32)
            };

            let packed = unsafe {
                match op {
                    HostOp::DbQuery => db_query(req_ptr, req_len),
                    HostOp::DbExecute => db_execute(req_ptr, req_len),
                    HostOp::DbBegin => db_begin(req_ptr, req_len),
                    HostOp::DbCommit => db_commit(req_ptr, req_len),
                    HostOp::DbRollback => db_rollback(req_ptr, req_len),
                    HostOp::StorageCreateBucket => storage_create_bucket(req_ptr, req_len),
                    HostOp::StorageBucketExists => storage_bucket_exists(req_ptr, req_len),
                    HostOp::StoragePutObject => storage_put_object(req_ptr, req_len),
                    HostOp::StorageGetObject => storage_get_object(req_ptr, req_len),
                    HostOp::StorageHeadObject => storage_head_object(req_ptr, req_len),
                    HostOp::StorageListObjects => storage_list_objects(req_ptr, req_len),
                    HostOp::StorageDeleteObject => storage_delete_object(req_ptr, req_len),
                }
            };

            let (addr, len) = unpack_reply(packed);
            match unsafe { ReplyBuf::from_raw(addr as *mut u8, len as usize) } {
                Some(reply) => Ok(reply.into_vec()),
                None => {
                    // Every import replies with a structured payload; the
                    // sentinel here means the host broke the contract.
                    let err = Error::protocol(format!(
                        "host import '{}' returned no reply payload",
                        op.name()
                    ));
                    tracing::error!(%err, "boundary contract violation");
                    Err(err)
                }
            }
        }
    }
}
