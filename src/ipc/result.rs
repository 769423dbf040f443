//! Kernel Result Codes

/// Signed result code returned by the synchronous call primitive.
///
/// Zero or positive means success, negative means failure. The interposer
/// never invents failure codes of its own.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(transparent)]
pub struct ResultCode(i32);

impl ResultCode {
    /// Plain success, used for synthesized replies.
    pub const SUCCESS: Self = Self(0);

    /// Wrap a raw kernel result.
    #[inline]
    pub const fn from_raw(raw: i32) -> Self {
        Self(raw)
    }

    /// Get the raw value.
    #[inline]
    pub const fn raw(self) -> i32 {
        self.0
    }

    #[inline]
    pub const fn is_success(self) -> bool {
        self.0 >= 0
    }

    #[inline]
    pub const fn is_failure(self) -> bool {
        self.0 < 0
    }
}

impl Default for ResultCode {
    fn default() -> Self {
        Self::SUCCESS
    }
}

impl core::fmt::Display for ResultCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "0x{:08x}", self.0 as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_decides_success() {
        assert!(ResultCode::SUCCESS.is_success());
        assert!(ResultCode::from_raw(1).is_success());
        assert!(ResultCode::from_raw(0xD8E0_6406_u32 as i32).is_failure());
    }

    #[test]
    fn test_display_is_hex_word() {
        assert_eq!(ResultCode::from_raw(-1).to_string(), "0xffffffff");
    }
}
