//! Session Registry
//!
//! Remembers which named service each known session talks to. Records are
//! added when a client's connect-to-service call succeeds and removed when
//! the kernel destroys the session.
//!
//! # Concurrency
//! - Lookups take a shared lock and never block on each other
//! - Inserts take the write lock briefly
//! - Only the connect-response path adds a record for a given session,
//!   so two inserts for the same session never race

pub mod registry;

pub use registry::{ServiceName, SessionRecord, SessionRegistry, MAX_SESSIONS};
