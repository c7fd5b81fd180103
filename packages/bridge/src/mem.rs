//! The memory transfer protocol: how variable-length payloads move across a
//! boundary that only understands integers.
//!
//! Every block handed out by [`allocate`] carries a hidden length prefix so
//! [`release`] needs nothing but the address. Replies come back as a single
//! u64 with the address in the high 32 bits and the length in the low 32;
//! zero address or zero length is the "no payload" sentinel, never a validly
//! addressable empty buffer.

use std::alloc::{alloc, dealloc, Layout};

const HEADER: usize = std::mem::size_of::<u64>();

fn block_layout(size: usize) -> Option<Layout> {
    Layout::from_size_align(HEADER.checked_add(size)?, HEADER).ok()
}

/// Allocates a transfer block of `size` bytes and returns the payload
/// address. Returns null for `size == 0` (the sentinel) or on allocation
/// failure; callers must treat null as "no buffer".
///
/// Exported to the host so it can place reply buffers inside guest memory.
pub fn allocate(size: usize) -> *mut u8 {
    if size == 0 {
        return std::ptr::null_mut();
    }
    let Some(layout) = block_layout(size) else {
        return std::ptr::null_mut();
    };
    unsafe {
        let base = alloc(layout);
        if base.is_null() {
            return std::ptr::null_mut();
        }
        (base as *mut u64).write(size as u64);
        base.add(HEADER)
    }
}

/// Frees a block previously returned by [`allocate`]. Null is a no-op.
///
/// # Safety
/// `ptr` must be null or an address returned by [`allocate`] that has not
/// been released yet.
pub unsafe fn release(ptr: *mut u8) {
    if ptr.is_null() {
        return;
    }
    let base = ptr.sub(HEADER);
    let size = (base as *const u64).read() as usize;
    if let Some(layout) = block_layout(size) {
        dealloc(base, layout);
    }
}

/// Packs a reply (address, length) pair into the single integer the import
/// signatures return.
pub fn pack_reply(addr: u32, len: u32) -> u64 {
    (u64::from(addr) << 32) | u64::from(len)
}

pub fn unpack_reply(packed: u64) -> (u32, u32) {
    ((packed >> 32) as u32, packed as u32)
}

/// Owning guard for a reply buffer the host placed in guest memory via
/// [`allocate`]. The buffer is released when the guard drops, on every exit
/// path; nothing is retained across calls.
pub struct ReplyBuf {
    ptr: *mut u8,
    len: usize,
}

impl ReplyBuf {
    /// Interprets an (address, length) reply pair. Returns `None` for the
    /// no-payload sentinel.
    ///
    /// # Safety
    /// A non-sentinel pair must describe an unreleased block from
    /// [`allocate`] holding at least `len` initialized bytes, and ownership
    /// of that block transfers to the guard.
    pub unsafe fn from_raw(ptr: *mut u8, len: usize) -> Option<Self> {
        if ptr.is_null() || len == 0 {
            return None;
        }
        Some(Self { ptr, len })
    }

    pub fn bytes(&self) -> &[u8] {
        // Bounded by the transferred length; reading beyond it is forbidden.
        unsafe { std::slice::from_raw_parts(self.ptr, self.len) }
    }

    /// Copies the payload out and releases the block.
    pub fn into_vec(self) -> Vec<u8> {
        self.bytes().to_vec()
    }
}

impl Drop for ReplyBuf {
    fn drop(&mut self) {
        unsafe { release(self.ptr) };
    }
}

/// Raw exports for the host side of the boundary.
#[cfg(target_arch = "wasm32")]
mod exports {
    #[export_name = "allocate"]
    extern "C" fn allocate(size: u32) -> u32 {
        super::allocate(size as usize) as u32
    }

    #[export_name = "release"]
    extern "C" fn release(ptr: u32) {
        unsafe { super::release(ptr as *mut u8) }
    }
}
