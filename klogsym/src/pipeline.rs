//! Streaming log rewrite
//!
//! Reads the log one line at a time, replaces the first backtrace frame
//! reference on each line with `<index>: 0x<addr> <location>` and writes
//! everything else through byte for byte.

use crate::domain::SymbolizeError;
use crate::scanner::LineScanner;
use crate::symbolization::{AddressResolver, Symbolizer};
use log::{debug, info};
use std::borrow::Cow;
use std::io::{BufRead, Write};

/// Counters for a completed run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub lines: usize,
    pub frames: usize,
    pub distinct_addresses: usize,
}

/// Drives the scanner and symbolizer over an input stream
pub struct Pipeline<'a, R> {
    scanner: &'a LineScanner,
    symbolizer: &'a Symbolizer<R>,
}

impl<'a, R: AddressResolver> Pipeline<'a, R> {
    pub fn new(scanner: &'a LineScanner, symbolizer: &'a Symbolizer<R>) -> Self {
        Self { scanner, symbolizer }
    }

    /// Rewrite one line; `line_no` is 1-based and only used for errors
    ///
    /// # Errors
    /// Returns an error if the frame's address cannot be resolved
    pub fn rewrite_line<'l>(
        &self,
        line: &'l [u8],
        line_no: usize,
    ) -> Result<Cow<'l, [u8]>, SymbolizeError> {
        let Some(frame) = self.scanner.scan(line) else {
            return Ok(Cow::Borrowed(line));
        };

        let location = self
            .symbolizer
            .resolve(frame.address)
            .map_err(|e| SymbolizeError::from_resolver(e, frame.address, line_no))?;
        debug!("line {line_no}: #{} {} -> {location}", frame.index, frame.address);

        let replacement = frame.render(&location);
        let mut rewritten = Vec::with_capacity(line.len() + replacement.len());
        rewritten.extend_from_slice(&line[..frame.span.start]);
        rewritten.extend_from_slice(replacement.as_bytes());
        rewritten.extend_from_slice(&line[frame.span.end..]);
        Ok(Cow::Owned(rewritten))
    }

    /// Stream `input` to `output`, stopping at the first failure
    ///
    /// Lines before a failing one have already been written when the
    /// error is returned; nothing after it is.
    ///
    /// # Errors
    /// Returns an error on I/O failure or when an address cannot be resolved
    pub fn run<B: BufRead, W: Write>(
        &self,
        mut input: B,
        mut output: W,
    ) -> Result<RunStats, SymbolizeError> {
        let mut stats = RunStats::default();
        let mut line = Vec::new();

        loop {
            line.clear();
            if input.read_until(b'\n', &mut line)? == 0 {
                break;
            }
            stats.lines += 1;

            let result = self.rewrite_line(&line, stats.lines);
            let rewritten = match result {
                Ok(rewritten) => rewritten,
                Err(e) => {
                    output.flush()?;
                    return Err(e);
                }
            };
            if matches!(rewritten, Cow::Owned(_)) {
                stats.frames += 1;
            }
            output.write_all(&rewritten)?;
        }

        output.flush()?;
        stats.distinct_addresses = self.symbolizer.cached_len();
        info!(
            "{} lines, {} frames symbolicated, {} distinct addresses",
            stats.lines, stats.frames, stats.distinct_addresses
        );
        Ok(stats)
    }
}
