//! Boundary bridge adapters: the same capability contracts as the native
//! adapters, satisfied by encoding every call, shuttling it across the
//! guest/host boundary as linear-memory buffers, and decoding the reply.

mod db;
mod host;
mod mem;
mod storage;

pub use db::BridgeDatabase;
pub use host::{HostCalls, HostOp};
pub use mem::{allocate, pack_reply, release, unpack_reply, ReplyBuf};
pub use storage::BridgeStorage;

#[cfg(target_arch = "wasm32")]
pub use host::WasmHost;
