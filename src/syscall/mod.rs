//! Synchronous Request Interception
//!
//! Every synchronous IPC request a process sends traps into
//! [`Interposer::send_sync_request`] before the kernel dispatches it.
//!
//! # Model
//! - Only requests on client sessions with a known service name are candidates
//! - A fixed rule table picks at most one action per request
//! - Anything unrecognized goes to the real service untouched
//! - The interposer never reports an error code of its own
//!
//! # Seams
//! - [`ThreadContext`]: handle table, address space and the real primitive
//! - [`SideFeatures`]: language emulation, error hook, plugin loader state

mod context;
pub mod delegate;
mod handler;
pub mod rules;
mod side;
pub mod validate;

pub use context::{SyncTransport, ThreadContext};
pub use delegate::{Gateway, SupervisorRequest, Verdict, WatchedOp};
pub use handler::{Disposition, Interposer, LOGO_PATH_LEN, LOGO_SD_PATH};
pub use side::{NoSideFeatures, PluginState, SideFeatures};
pub use validate::{MemoryFault, UserMemory};
