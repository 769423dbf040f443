//! Handle Resolution
//!
//! A handle is a process-local index into the kernel handle table. The
//! interposer resolves handles to objects, checks their dynamic type, and
//! creates short-lived handles of its own for nested calls.

use super::object::{AutoObject, ObjectRef, SessionId};
use crate::ipc::ResultCode;

/// A process-local handle value.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[repr(transparent)]
pub struct Handle(u32);

impl Handle {
    /// The null handle.
    pub const INVALID: Self = Self(0);

    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn is_invalid(self) -> bool {
        self.0 == 0
    }
}

/// Error type for handle resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveError {
    /// The handle does not name a live object.
    InvalidHandle,
    /// The object exists but is not a client session.
    TypeMismatch,
}

impl core::fmt::Display for ResolveError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InvalidHandle => write!(f, "invalid handle"),
            Self::TypeMismatch => write!(f, "object is not a client session"),
        }
    }
}

/// The calling process's handle table.
pub trait HandleTable {
    /// Look up the object behind `handle`.
    ///
    /// On `Some`, the object's reference count has been incremented and the
    /// caller owns that reference. Use [`resolve`] rather than calling this
    /// directly so the reference is always returned.
    fn lookup_object(&self, handle: Handle) -> Option<&dyn AutoObject>;

    /// Create a new client handle to `session` in the calling process.
    fn open_session(&self, session: SessionId) -> Result<Handle, ResultCode>;

    fn close_handle(&self, handle: Handle);
}

/// Resolve a handle, borrowing a reference for the guard's lifetime.
pub fn resolve<T: HandleTable + ?Sized>(
    table: &T,
    handle: Handle,
) -> Result<ObjectRef<'_>, ResolveError> {
    if handle.is_invalid() {
        return Err(ResolveError::InvalidHandle);
    }
    table
        .lookup_object(handle)
        .map(ObjectRef::adopt)
        .ok_or(ResolveError::InvalidHandle)
}

/// Resolve a handle that must be a client session.
///
/// A wrong-typed object is released before the error is returned.
pub fn resolve_client_session<T: HandleTable + ?Sized>(
    table: &T,
    handle: Handle,
) -> Result<(ObjectRef<'_>, SessionId), ResolveError> {
    let object = resolve(table, handle)?;
    match object.kind().parent_session() {
        Some(session) => Ok((object, session)),
        None => Err(ResolveError::TypeMismatch),
    }
}

/// A handle created by the interposer, closed on drop.
pub struct OwnedHandle<'a, T: HandleTable + ?Sized> {
    table: &'a T,
    handle: Handle,
}

impl<'a, T: HandleTable + ?Sized> OwnedHandle<'a, T> {
    /// Open a client handle to `session` in the calling process.
    pub fn open(table: &'a T, session: SessionId) -> Result<Self, ResultCode> {
        let handle = table.open_session(session)?;
        Ok(Self { table, handle })
    }

    #[inline]
    pub fn handle(&self) -> Handle {
        self.handle
    }
}

impl<T: HandleTable + ?Sized> Drop for OwnedHandle<'_, T> {
    fn drop(&mut self) {
        self.table.close_handle(self.handle);
    }
}
