//! IPC Wire Primitives
//!
//! The pieces of the synchronous request protocol the interposer has to
//! read and rewrite in place.
//!
//! # Layout
//! - Word 0 of every request and reply is a [`CommandHeader`]
//! - Words 1.. are the command-specific payload
//! - Replies carry the service's [`ResultCode`] in word 1
//!
//! All buffers are fixed-size values; nothing here allocates.

pub mod cmdbuf;
pub mod header;
pub mod result;

pub use cmdbuf::{CommandBuffer, WordSnapshot, CMDBUF_WORDS};
pub use header::CommandHeader;
pub use result::ResultCode;
