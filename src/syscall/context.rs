//! Calling Thread Context
//!
//! Everything the interposer needs from the kernel for one call, as seen
//! from the thread that trapped into it.

use crate::cap::{Handle, HandleTable};
use crate::ipc::{CommandBuffer, ResultCode};

use super::validate::UserMemory;

/// The real synchronous request primitive.
pub trait SyncTransport {
    /// Send `cmdbuf` over `handle` and block until the reply overwrites it.
    fn send_sync_request(&self, handle: Handle, cmdbuf: &mut CommandBuffer) -> ResultCode;
}

/// The trapping thread: its process's handle table, address space and
/// the un-hooked send primitive.
pub trait ThreadContext: HandleTable + SyncTransport + UserMemory {
    /// Numeric id of the calling process.
    fn pid(&self) -> u32;
}
