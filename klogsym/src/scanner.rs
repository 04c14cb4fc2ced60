//! Backtrace frame recognition
//!
//! Kernel panic handlers print one frame per line as `#<index> at <hex>`,
//! e.g. `    #3 at ffff800000081a2c`. The scanner works on raw bytes so that
//! lines with invalid UTF-8 elsewhere still match and pass through intact.

use crate::domain::{Address, BacktraceReference, FrameIndex};
use regex::bytes::{Captures, Regex};

/// `#`, decimal frame index, ` at `, lowercase hex without `0x`
const FRAME_PATTERN: &str = r"#([0-9]+) at ([0-9a-f]+)";

/// Finds the backtrace frame reference in a log line
pub struct LineScanner {
    frame_pattern: Regex,
}

impl LineScanner {
    /// Compile the frame pattern
    ///
    /// # Errors
    /// Returns an error if the regex engine rejects the pattern
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self { frame_pattern: Regex::new(FRAME_PATTERN)? })
    }

    /// Scan one line (terminator included) for a frame reference
    ///
    /// Only the first occurrence whose index and address both fit in a
    /// `u64` is reported. Occurrences with out-of-range digits are skipped
    /// rather than treated as errors.
    #[must_use]
    pub fn scan(&self, line: &[u8]) -> Option<BacktraceReference> {
        self.frame_pattern.captures_iter(line).find_map(|caps| parse_frame(&caps))
    }
}

fn parse_frame(caps: &Captures<'_>) -> Option<BacktraceReference> {
    let whole = caps.get(0)?;
    let index = std::str::from_utf8(caps.get(1)?.as_bytes()).ok()?.parse::<u64>().ok()?;
    let address =
        u64::from_str_radix(std::str::from_utf8(caps.get(2)?.as_bytes()).ok()?, 16).ok()?;

    Some(BacktraceReference {
        index: FrameIndex(index),
        address: Address(address),
        span: whole.start()..whole.end(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scanner() -> LineScanner {
        LineScanner::new().unwrap()
    }

    #[test]
    fn test_scan_simple_frame() {
        let frame = scanner().scan(b"#0 at 1a2b3c\n").unwrap();
        assert_eq!(frame.index, FrameIndex(0));
        assert_eq!(frame.address, Address(0x1a2b3c));
        assert_eq!(frame.span, 0..12);
    }

    #[test]
    fn test_scan_reports_span_inside_line() {
        let line = b"[kernel] WARN:   #12 at ffff800000081a2c (from trap)\n";
        let frame = scanner().scan(line).unwrap();
        assert_eq!(frame.index, FrameIndex(12));
        assert_eq!(frame.address, Address(0xffff_8000_0008_1a2c));
        assert_eq!(&line[frame.span], b"#12 at ffff800000081a2c");
    }

    #[test]
    fn test_scan_no_match() {
        let scanner = scanner();
        assert!(scanner.scan(b"panic: division by zero\n").is_none());
        assert!(scanner.scan(b"").is_none());
        // Uppercase hex and 0x prefixes are not part of the format
        assert!(scanner.scan(b"#1 at DEADBEEF\n").is_none());
        assert!(scanner.scan(b"#1 at\n").is_none());
        assert!(scanner.scan(b"# 1 at abc\n").is_none());
    }

    #[test]
    fn test_scan_prefixed_address_stops_at_x() {
        // `0x10` only matches up to the `0`
        let frame = scanner().scan(b"#1 at 0x10\n").unwrap();
        assert_eq!(frame.address, Address(0));
        assert_eq!(frame.span, 0..7);
    }

    #[test]
    fn test_scan_first_occurrence_wins() {
        let frame = scanner().scan(b"#1 at aa #2 at bb\n").unwrap();
        assert_eq!(frame.index, FrameIndex(1));
        assert_eq!(frame.address, Address(0xaa));
    }

    #[test]
    fn test_scan_overflowing_digits_is_no_match() {
        let scanner = scanner();
        assert!(scanner.scan(b"#0 at 1ffffffffffffffff\n").is_none());
        assert!(scanner.scan(b"#99999999999999999999999 at 10\n").is_none());
    }

    #[test]
    fn test_scan_skips_malformed_occurrence() {
        let frame = scanner().scan(b"#0 at 1ffffffffffffffff #1 at 20\n").unwrap();
        assert_eq!(frame.index, FrameIndex(1));
        assert_eq!(frame.address, Address(0x20));
    }

    #[test]
    fn test_scan_tolerates_invalid_utf8() {
        let frame = scanner().scan(b"\xff\xfe #4 at 40\n").unwrap();
        assert_eq!(frame.span, 3..11);
    }
}
