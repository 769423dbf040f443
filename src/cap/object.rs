//! Reference-Counted Kernel Objects
//!
//! ```text
//! ┌───────────────────────────────┐
//! │          ObjectRef<'a>        │
//! ├───────────────────────────────┤
//! │  object: &'a dyn AutoObject   │  one borrowed reference
//! │  Drop -> decrement_ref()      │  released exactly once
//! └───────────────────────────────┘
//! ```

/// Opaque identity of a kernel session (the parent of a client endpoint).
///
/// In the kernel this is the session object's address; the registry only
/// ever compares it.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[repr(transparent)]
pub struct SessionId(usize);

impl SessionId {
    #[inline]
    pub const fn new(raw: usize) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> usize {
        self.0
    }
}

/// Dynamic type of a kernel object.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ObjectKind {
    /// Client end of a session, with the session it belongs to.
    ClientSession { parent: SessionId },
    ServerSession,
    Event,
    Process,
    Thread,
    AddressArbiter,
    /// Anything the interposer has no reason to distinguish.
    Other,
}

impl ObjectKind {
    #[inline]
    pub const fn is_client_session(self) -> bool {
        matches!(self, Self::ClientSession { .. })
    }

    /// Parent session, if this is a client session.
    #[inline]
    pub const fn parent_session(self) -> Option<SessionId> {
        match self {
            Self::ClientSession { parent } => Some(parent),
            _ => None,
        }
    }
}

/// A kernel object with an atomic reference count.
pub trait AutoObject {
    fn kind(&self) -> ObjectKind;

    fn increment_ref(&self);

    /// Drop one reference. The kernel may destroy the object when it hits zero.
    fn decrement_ref(&self);
}

/// A borrowed reference on a kernel object, returned on drop.
pub struct ObjectRef<'a> {
    object: &'a dyn AutoObject,
}

impl<'a> ObjectRef<'a> {
    /// Take ownership of a reference the caller has already acquired.
    ///
    /// The handle table's lookup increments the count; this guard is the
    /// only place it gets decremented.
    #[inline]
    pub fn adopt(object: &'a dyn AutoObject) -> Self {
        Self { object }
    }

    /// Acquire a fresh reference on an object.
    pub fn acquire(object: &'a dyn AutoObject) -> Self {
        object.increment_ref();
        Self { object }
    }

    #[inline]
    pub fn kind(&self) -> ObjectKind {
        self.object.kind()
    }

    #[inline]
    pub fn is_client_session(&self) -> bool {
        self.kind().is_client_session()
    }
}

impl Drop for ObjectRef<'_> {
    fn drop(&mut self) {
        self.object.decrement_ref();
    }
}

impl core::fmt::Debug for ObjectRef<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "ObjectRef({:?})", self.kind())
    }
}
