//! User Memory Access
//!
//! A few rules follow pointers found in the request payload into the
//! caller's address space. Those pointers come straight from user code, so
//! every access is checked before use.
//!
//! # Principles
//! - Validate before touching: null, overflow, and window checks first
//! - Fail closed: a rejected pointer means the rule does not apply
//! - Copy into fixed-size kernel buffers, never hold user references

/// Known user-space windows.
pub mod regions {
    use core::ops::Range;

    /// Application heap and linear memory. Socket address structures
    /// handed to the plugin supervisor must live here.
    pub const APPLICATION_DATA: Range<u32> = 0x0600_0000..0x0800_0000;
}

/// Error type for user memory access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryFault {
    /// Null pointer.
    NullPointer,
    /// Pointer outside the window the rule allows.
    OutOfRange,
    /// Address plus length overflows.
    Overflow,
    /// The kernel could not map the address.
    Unmapped,
}

impl core::fmt::Display for MemoryFault {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NullPointer => write!(f, "null pointer"),
            Self::OutOfRange => write!(f, "pointer outside allowed window"),
            Self::Overflow => write!(f, "address range overflows"),
            Self::Unmapped => write!(f, "address not mapped"),
        }
    }
}

/// The calling process's address space.
pub trait UserMemory {
    /// Copy `out.len()` bytes from `addr`.
    fn read(&self, addr: u32, out: &mut [u8]) -> Result<(), MemoryFault>;

    /// Copy `data` to `addr`.
    fn write(&self, addr: u32, data: &[u8]) -> Result<(), MemoryFault>;
}

/// A user range that passed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserRange {
    start: u32,
    len: u32,
}

impl UserRange {
    #[inline]
    pub fn start(&self) -> u32 {
        self.start
    }

    #[inline]
    pub fn len(&self) -> u32 {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Validate a user pointer against an allowed window.
///
/// # Checks
/// 1. Pointer is not null
/// 2. Pointer + length does not overflow
/// 3. The whole range lies inside `window`
pub fn validate_user_range(
    addr: u32,
    len: u32,
    window: core::ops::Range<u32>,
) -> Result<UserRange, MemoryFault> {
    if addr == 0 {
        return Err(MemoryFault::NullPointer);
    }

    let end = addr.checked_add(len).ok_or(MemoryFault::Overflow)?;

    if addr < window.start || end > window.end {
        return Err(MemoryFault::OutOfRange);
    }

    Ok(UserRange { start: addr, len })
}

/// Validate a non-null pointer with no window restriction.
pub fn validate_user_pointer(addr: u32, len: u32) -> Result<UserRange, MemoryFault> {
    validate_user_range(addr, len, 0..u32::MAX)
}

/// Read a little-endian word from a validated range.
pub fn read_u32<M: UserMemory + ?Sized>(memory: &M, range: UserRange) -> Result<u32, MemoryFault> {
    if range.len() < 4 {
        return Err(MemoryFault::OutOfRange);
    }
    let mut bytes = [0u8; 4];
    memory.read(range.start(), &mut bytes)?;
    Ok(u32::from_le_bytes(bytes))
}

/// Copy `N` bytes from a validated range into a stack buffer.
pub fn read_array<M: UserMemory + ?Sized, const N: usize>(
    memory: &M,
    range: UserRange,
) -> Result<[u8; N], MemoryFault> {
    if (range.len() as usize) < N {
        return Err(MemoryFault::OutOfRange);
    }
    let mut bytes = [0u8; N];
    memory.read(range.start(), &mut bytes)?;
    Ok(bytes)
}
