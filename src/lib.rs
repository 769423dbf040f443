//! IPC Interpose - Synchronous Request Interposition Engine
//!
//! Sits in front of the microkernel's synchronous IPC primitive and lets the
//! host apply compatibility shims to requests made to system services,
//! without modifying the services themselves.
//!
//! # What It Does
//! - Names sessions as clients connect to services
//! - Rewrites, answers, or reroutes specific (service, command) pairs
//! - Consults an optional plugin supervisor for watched operations
//! - Passes everything else through untouched
//!
//! # Safety Properties
//! - Every borrowed kernel object reference is released exactly once
//! - Rewrites that may not apply are undone from fixed-size snapshots
//! - The caller always receives exactly one result
//! - No allocation anywhere on the interception path
//!
//! # Integration
//! The host kernel owns the trap. Its hook calls
//! [`Interposer::send_sync_request`] with a [`ThreadContext`] for the
//! trapping thread and the thread's IPC window:
//!
//! ```ignore
//! let cmdbuf = unsafe { CommandBuffer::from_raw(tls.add(0x80) as *mut u32) };
//! Interposer::new(&SESSIONS, &HOST, &side).send_sync_request(&ctx, handle, cmdbuf)
//! ```

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod cap;
pub mod config;
pub mod console;
pub mod ipc;
pub mod session;
pub mod syscall;

#[cfg(test)]
mod testing;

pub use cap::{Handle, SessionId};
pub use config::{Features, HostState, KernelVersion};
pub use ipc::{CommandBuffer, CommandHeader, ResultCode};
pub use session::{ServiceName, SessionRegistry};
pub use syscall::{Interposer, SideFeatures, ThreadContext};

/// Named sessions known system-wide. Empty at boot.
pub static SESSIONS: SessionRegistry = SessionRegistry::new();

/// Host configuration and milestones. Zero at boot.
pub static HOST: HostState = HostState::new();
