//! Registry Table and Service Names

use log::{trace, warn};
use spin::RwLock;

use crate::cap::SessionId;

/// Capacity of the registry table.
pub const MAX_SESSIONS: usize = 0x100;

/// Longest service name the port protocol carries.
pub const SERVICE_NAME_LEN: usize = 8;

/// A short, fixed-length service name such as `cfg:u` or `fs:USER`.
///
/// Stored inline and compared byte-for-byte (case-sensitive).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServiceName {
    bytes: [u8; SERVICE_NAME_LEN],
    len: u8,
}

impl ServiceName {
    /// Build a name from raw bytes, stopping at the first NUL.
    ///
    /// Returns `None` for an empty name. Bytes past `SERVICE_NAME_LEN`
    /// are ignored, matching the 8-byte field in the request.
    pub fn from_bytes(raw: &[u8]) -> Option<Self> {
        let limit = raw.len().min(SERVICE_NAME_LEN);
        let len = raw[..limit].iter().position(|&b| b == 0).unwrap_or(limit);
        if len == 0 {
            return None;
        }
        let mut bytes = [0u8; SERVICE_NAME_LEN];
        bytes[..len].copy_from_slice(&raw[..len]);
        Some(Self { bytes, len: len as u8 })
    }

    /// Build a name from a string literal.
    pub fn new(name: &str) -> Option<Self> {
        if name.len() > SERVICE_NAME_LEN {
            return None;
        }
        Self::from_bytes(name.as_bytes())
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    /// The name as text; names are ASCII on the wire, anything else reads as empty.
    pub fn as_str(&self) -> &str {
        core::str::from_utf8(self.as_bytes()).unwrap_or("")
    }

    #[inline]
    pub fn matches(&self, name: &str) -> bool {
        self.as_bytes() == name.as_bytes()
    }

    #[inline]
    pub fn starts_with(&self, prefix: &str) -> bool {
        self.as_bytes().starts_with(prefix.as_bytes())
    }
}

impl core::fmt::Debug for ServiceName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

impl core::fmt::Display for ServiceName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One established client-service session.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct SessionRecord {
    pub session: SessionId,
    pub name: ServiceName,
}

/// Process-wide table of named sessions.
pub struct SessionRegistry {
    slots: RwLock<[Option<SessionRecord>; MAX_SESSIONS]>,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub const fn new() -> Self {
        const EMPTY: Option<SessionRecord> = None;
        Self {
            slots: RwLock::new([EMPTY; MAX_SESSIONS]),
        }
    }

    /// Name of the service behind `session`, if known.
    pub fn lookup(&self, session: SessionId) -> Option<ServiceName> {
        self.slots
            .read()
            .iter()
            .flatten()
            .find(|record| record.session == session)
            .map(|record| record.name)
    }

    /// First session registered under `name`.
    ///
    /// Used to locate singleton services such as the plugin supervisor.
    pub fn lookup_first(&self, name: &str) -> Option<SessionRecord> {
        self.slots
            .read()
            .iter()
            .flatten()
            .find(|record| record.name.matches(name))
            .copied()
    }

    /// Record that `session` talks to `name`.
    ///
    /// Re-adding a known session is a no-op; the first name wins. When the
    /// table is full the record is dropped and the session stays unknown.
    pub fn add(&self, session: SessionId, name: ServiceName) {
        let mut slots = self.slots.write();

        if let Some(existing) = slots.iter().flatten().find(|r| r.session == session) {
            if existing.name != name {
                warn!(
                    "session {:#x} already registered as {}, ignoring {}",
                    session.raw(),
                    existing.name,
                    name
                );
            }
            return;
        }

        match slots.iter_mut().find(|slot| slot.is_none()) {
            Some(slot) => {
                trace!("session {:#x} -> {}", session.raw(), name);
                *slot = Some(SessionRecord { session, name });
            }
            None => warn!("session registry full, dropping {}", name),
        }
    }

    /// Forget `session`. Returns the removed record.
    pub fn remove(&self, session: SessionId) -> Option<SessionRecord> {
        let mut slots = self.slots.write();
        slots
            .iter_mut()
            .find(|slot| matches!(slot, Some(r) if r.session == session))
            .and_then(Option::take)
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        self.slots.read().iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> ServiceName {
        ServiceName::new(s).unwrap()
    }

    #[test]
    fn test_service_name_parsing() {
        assert_eq!(ServiceName::from_bytes(b"srv:\0\0\0\0").unwrap().as_str(), "srv:");
        assert_eq!(ServiceName::from_bytes(b"fs:USERxx").unwrap().as_str(), "fs:USERx");
        assert!(ServiceName::from_bytes(b"\0abc").is_none());
        assert!(ServiceName::new("too:long:").is_none());
    }

    #[test]
    fn test_matching_is_exact_and_case_sensitive() {
        let apt = name("APT:U");
        assert!(apt.matches("APT:U"));
        assert!(!apt.matches("apt:u"));
        assert!(!apt.matches("APT:"));
        assert!(apt.starts_with("APT:"));
    }

    #[test]
    fn test_lookup_unknown_is_none() {
        let registry = SessionRegistry::new();
        assert_eq!(registry.lookup(SessionId::new(1)), None);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_add_and_lookup() {
        let registry = SessionRegistry::new();
        registry.add(SessionId::new(1), name("cfg:u"));
        registry.add(SessionId::new(2), name("plg:ldr"));

        assert_eq!(registry.lookup(SessionId::new(1)), Some(name("cfg:u")));
        let aux = registry.lookup_first("plg:ldr").unwrap();
        assert_eq!(aux.session, SessionId::new(2));
        assert_eq!(registry.lookup_first("plg:"), None);
    }

    #[test]
    fn test_add_is_idempotent() {
        let registry = SessionRegistry::new();
        registry.add(SessionId::new(7), name("srv:"));
        registry.add(SessionId::new(7), name("srv:"));
        registry.add(SessionId::new(7), name("srv:pm"));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.lookup(SessionId::new(7)), Some(name("srv:")));
    }

    #[test]
    fn test_lookup_first_returns_earliest() {
        let registry = SessionRegistry::new();
        registry.add(SessionId::new(10), name("plg:ldr"));
        registry.add(SessionId::new(11), name("plg:ldr"));
        assert_eq!(registry.lookup_first("plg:ldr").unwrap().session, SessionId::new(10));
    }

    #[test]
    fn test_remove_reclaims_slot() {
        let registry = SessionRegistry::new();
        registry.add(SessionId::new(3), name("ndm:u"));
        assert!(registry.remove(SessionId::new(3)).is_some());
        assert!(registry.remove(SessionId::new(3)).is_none());
        assert_eq!(registry.lookup(SessionId::new(3)), None);
    }

    #[test]
    fn test_full_table_drops_new_records() {
        let registry = SessionRegistry::new();
        for i in 0..MAX_SESSIONS {
            registry.add(SessionId::new(i + 1), name("soc:U"));
        }
        registry.add(SessionId::new(MAX_SESSIONS + 1), name("cam:u"));

        assert_eq!(registry.len(), MAX_SESSIONS);
        assert_eq!(registry.lookup(SessionId::new(MAX_SESSIONS + 1)), None);
    }

    #[test]
    fn test_concurrent_lookup_and_insert() {
        use std::sync::Arc;
        use std::thread;

        let registry = Arc::new(SessionRegistry::new());
        let writers: std::vec::Vec<_> = (0..4)
            .map(|t| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    for i in 0..32 {
                        registry.add(SessionId::new(t * 100 + i + 1), name("cfg:s"));
                        let _ = registry.lookup(SessionId::new(i + 1));
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }
        assert_eq!(registry.len(), 128);
    }
}
