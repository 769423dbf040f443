//! Kernel Object Handles
//!
//! The interposer sees the kernel through a per-process handle table.
//! Resolving a handle borrows a reference on the underlying object, and
//! every borrow must be returned exactly once.
//!
//! # Design
//! - [`AutoObject`] is the reference-counted kernel object seam
//! - [`ObjectKind`] is a closed tag checked once at the type boundary
//! - [`ObjectRef`] releases its reference on drop, on every exit path
//! - [`OwnedHandle`] closes a handle the interposer created itself

pub mod handle;
pub mod object;

pub use handle::{
    resolve, resolve_client_session, Handle, HandleTable, OwnedHandle, ResolveError,
};
pub use object::{AutoObject, ObjectKind, ObjectRef, SessionId};
