//! Domain types providing compile-time safety and self-documentation
//!
//! These newtype wrappers keep a frame index from being passed where an
//! address is expected and fix how each is rendered in rewritten lines.

use std::fmt;
use std::ops::Range;

/// Raw code address taken from a backtrace frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(pub u64);

impl fmt::Display for Address {
    /// Normalized `0x`-prefixed lowercase hex, no padding
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl fmt::LowerHex for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

/// Position of a frame in the backtrace (0 = innermost)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameIndex(pub u64);

impl fmt::Display for FrameIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A `#<index> at <hex>` occurrence found in a log line
///
/// `span` is the byte range the occurrence covers in the line it was
/// scanned from, so the caller can splice a replacement in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BacktraceReference {
    pub index: FrameIndex,
    pub address: Address,
    pub span: Range<usize>,
}

impl BacktraceReference {
    /// Text that replaces the raw occurrence once `location` is known
    #[must_use]
    pub fn render(&self, location: &str) -> String {
        format!("{}: {} {}", self.index, self.address, location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_display_is_normalized_hex() {
        assert_eq!(Address(0x1a2b3c).to_string(), "0x1a2b3c");
        assert_eq!(Address(0).to_string(), "0x0");
        assert_eq!(format!("{:x}", Address(0xdead_beef)), "deadbeef");
    }

    #[test]
    fn test_render_replacement() {
        let frame =
            BacktraceReference { index: FrameIndex(3), address: Address(0xff), span: 0..10 };
        assert_eq!(frame.render("kmain (main.c:42)"), "3: 0xff kmain (main.c:42)");
    }
}
