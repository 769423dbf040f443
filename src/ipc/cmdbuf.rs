//! Thread-Local Command Buffer
//!
//! Every thread owns a 0x100-byte IPC window in its TLS (at offset 0x80).
//! Requests are written there before the synchronous call and the kernel
//! writes the reply back over the same words.
//!
//! # Ownership
//! The interposer holds the single `&mut CommandBuffer` for the duration of
//! one call. Rewrites that may need undoing take a [`WordSnapshot`] first;
//! restoring it is a plain array copy and cannot fail.

use super::header::CommandHeader;

/// Number of words in the IPC window.
pub const CMDBUF_WORDS: usize = 64;

/// The fixed-size IPC parameter window.
#[derive(Clone, PartialEq, Eq)]
#[repr(transparent)]
pub struct CommandBuffer([u32; CMDBUF_WORDS]);

impl CommandBuffer {
    /// Create a zeroed buffer.
    pub const fn new() -> Self {
        Self([0; CMDBUF_WORDS])
    }

    /// Build a buffer from leading words; the rest are zero.
    ///
    /// Words beyond the window are ignored.
    pub fn from_words(words: &[u32]) -> Self {
        let mut buf = Self::new();
        let count = words.len().min(CMDBUF_WORDS);
        buf.0[..count].copy_from_slice(&words[..count]);
        buf
    }

    /// View the thread-local IPC window as a command buffer.
    ///
    /// # Safety
    /// - `ptr` must point to `CMDBUF_WORDS` readable and writable words
    /// - No other reference to that window may exist while the returned
    ///   borrow is alive (the calling thread is blocked in the hook)
    pub unsafe fn from_raw<'a>(ptr: *mut u32) -> &'a mut Self {
        // SAFETY: CommandBuffer is repr(transparent) over [u32; CMDBUF_WORDS];
        // the caller guarantees size, alignment and exclusivity.
        unsafe { &mut *(ptr as *mut Self) }
    }

    #[inline]
    pub fn header(&self) -> CommandHeader {
        CommandHeader::from_raw(self.0[0])
    }

    #[inline]
    pub fn set_header(&mut self, header: CommandHeader) {
        self.0[0] = header.raw();
    }

    /// Read a word. Out-of-window indices read as zero.
    #[inline]
    pub fn word(&self, index: usize) -> u32 {
        self.0.get(index).copied().unwrap_or(0)
    }

    /// Write a word. Out-of-window indices are ignored.
    #[inline]
    pub fn set_word(&mut self, index: usize, value: u32) {
        if let Some(slot) = self.0.get_mut(index) {
            *slot = value;
        }
    }

    /// Copy `N` consecutive words starting at `start` as little-endian bytes.
    ///
    /// Used for short inline strings such as service names.
    pub fn bytes_le<const N: usize>(&self, start: usize) -> [u8; N] {
        let mut out = [0u8; N];
        for (i, chunk) in out.chunks_mut(4).enumerate() {
            let bytes = self.word(start + i).to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
        out
    }

    /// Save the first `N` words.
    pub fn snapshot<const N: usize>(&self) -> WordSnapshot<N> {
        let mut words = [0u32; N];
        let count = N.min(CMDBUF_WORDS);
        words[..count].copy_from_slice(&self.0[..count]);
        WordSnapshot { words }
    }

    /// Put back the first `N` words exactly as they were snapshotted.
    pub fn restore<const N: usize>(&mut self, snapshot: &WordSnapshot<N>) {
        let count = N.min(CMDBUF_WORDS);
        self.0[..count].copy_from_slice(&snapshot.words[..count]);
    }

    pub fn as_words(&self) -> &[u32; CMDBUF_WORDS] {
        &self.0
    }
}

impl Default for CommandBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for CommandBuffer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let header = self.header();
        let shown = header.total_words().min(CMDBUF_WORDS);
        f.debug_struct("CommandBuffer")
            .field("header", &header)
            .field("payload", &&self.0[1..shown])
            .finish()
    }
}

/// A by-value copy of the leading words of a command buffer.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct WordSnapshot<const N: usize> {
    words: [u32; N],
}

impl<const N: usize> WordSnapshot<N> {
    #[inline]
    pub fn word(&self, index: usize) -> u32 {
        self.words.get(index).copied().unwrap_or(0)
    }
}
