//! Command Header Encoding
//!
//! ```text
//! ┌────────────────────────┬──────────────┬──────────────┐
//! │ 31                  16 │ 11         6 │ 5          0 │
//! │   command id           │ normal words │ translate    │
//! └────────────────────────┴──────────────┴──────────────┘
//! ```
//!
//! Bits 12..15 are unused by the protocol but are preserved by [`CommandHeader::raw`],
//! so a header read from a buffer and written back is bit-for-bit identical.

/// Mask for the 6-bit word count fields.
const COUNT_MASK: u32 = 0x3F;

/// Packed command header (word 0 of a command buffer).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct CommandHeader(u32);

impl CommandHeader {
    /// Build a header from its fields.
    ///
    /// Counts wider than 6 bits are truncated, matching the kernel's encoder.
    #[inline]
    pub const fn new(command_id: u16, normal_words: u32, translate_words: u32) -> Self {
        Self(
            ((command_id as u32) << 16)
                | ((normal_words & COUNT_MASK) << 6)
                | (translate_words & COUNT_MASK),
        )
    }

    /// Wrap a raw header word.
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn command_id(self) -> u16 {
        (self.0 >> 16) as u16
    }

    /// Number of plain parameter words following the header.
    #[inline]
    pub const fn normal_words(self) -> u32 {
        (self.0 >> 6) & COUNT_MASK
    }

    /// Number of translate (handle/buffer descriptor) words after the plain words.
    #[inline]
    pub const fn translate_words(self) -> u32 {
        self.0 & COUNT_MASK
    }

    /// Total words in the message, header included.
    #[inline]
    pub const fn total_words(self) -> usize {
        1 + self.normal_words() as usize + self.translate_words() as usize
    }

    /// The reply header a service sends when it only returns a result code.
    #[inline]
    pub const fn result_only_reply(self) -> Self {
        Self::new(self.command_id(), 1, 0)
    }
}

impl core::fmt::Debug for CommandHeader {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "Header(0x{:08x}: id=0x{:x}, normal={}, translate={})",
            self.0,
            self.command_id(),
            self.normal_words(),
            self.translate_words()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_open_file_directly() {
        let header = CommandHeader::from_raw(0x0803_0204);
        assert_eq!(header.command_id(), 0x803);
        assert_eq!(header.normal_words(), 8);
        assert_eq!(header.translate_words(), 4);
        assert_eq!(header.total_words(), 13);
    }

    #[test]
    fn test_encode_matches_kernel_layout() {
        assert_eq!(CommandHeader::new(100, 4, 0).raw(), 0x0064_0100);
        assert_eq!(CommandHeader::new(100, 3, 0).raw(), 0x0064_00C0);
        assert_eq!(CommandHeader::new(100, 2, 0).raw(), 0x0064_0080);
        assert_eq!(CommandHeader::new(5, 4, 0).raw(), 0x0005_0100);
    }

    #[test]
    fn test_result_only_reply() {
        assert_eq!(CommandHeader::from_raw(0x10042).result_only_reply().raw(), 0x10040);
        assert_eq!(CommandHeader::from_raw(0x20002).result_only_reply().raw(), 0x20040);
        assert_eq!(CommandHeader::from_raw(0x90000).result_only_reply().raw(), 0x90040);
        assert_eq!(CommandHeader::from_raw(0xC0080).result_only_reply().raw(), 0xC0040);
        assert_eq!(CommandHeader::from_raw(0x80040).result_only_reply().raw(), 0x80040);
    }

    #[test]
    fn test_counts_truncate() {
        assert_eq!(CommandHeader::new(1, 0x41, 0).normal_words(), 1);
    }
}
