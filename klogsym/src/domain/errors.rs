//! Structured error types for klogsym
//!
//! Using thiserror for automatic Display implementation and error chaining.

use super::types::Address;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failure reported by an address resolver backend for a single lookup
#[derive(Error, Debug)]
pub enum ResolverError {
    #[error("Failed to launch `{program}`")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot load symbols from {}: {reason}", path.display())]
    Load { path: PathBuf, reason: String },

    #[error("`{program}` did not finish within {}s", timeout.as_secs())]
    Timeout { program: String, timeout: Duration },

    #[error("`{program}` exited with {}{}", describe_code(*code), describe_stderr(stderr))]
    ExitFailure { program: String, code: Option<i32>, stderr: String },

    #[error("`{program}` produced no output")]
    EmptyOutput { program: String },

    #[error("No debug info or symbol covers {0}")]
    Unresolved(Address),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ResolverError {
    /// Whether this failure means no address can be resolved at all
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Launch { .. } | Self::Load { .. })
    }
}

fn describe_code(code: Option<i32>) -> String {
    code.map_or_else(|| "a signal".to_string(), |c| format!("status {c}"))
}

fn describe_stderr(stderr: &str) -> String {
    let stderr = stderr.trim();
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {stderr}")
    }
}

/// Fatal failure of a symbolication run
#[derive(Error, Debug)]
pub enum SymbolizeError {
    #[error("Log file not found: {}", path.display())]
    InputNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Resolver unavailable")]
    ResolverUnavailable {
        #[source]
        source: ResolverError,
    },

    #[error("Resolver timed out on line {line} resolving {address}")]
    ResolverTimeout {
        address: Address,
        line: usize,
        #[source]
        source: ResolverError,
    },

    #[error("Failed to resolve address {address} on line {line}")]
    ResolutionFailure {
        address: Address,
        line: usize,
        #[source]
        source: ResolverError,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SymbolizeError {
    /// Classify a resolver failure for `address` seen on `line`
    #[must_use]
    pub fn from_resolver(source: ResolverError, address: Address, line: usize) -> Self {
        if source.is_unavailable() {
            Self::ResolverUnavailable { source }
        } else if matches!(source, ResolverError::Timeout { .. }) {
            Self::ResolverTimeout { address, line, source }
        } else {
            Self::ResolutionFailure { address, line, source }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_failure_names_address_and_line() {
        let err = SymbolizeError::from_resolver(
            ResolverError::ExitFailure {
                program: "llvm-addr2line".to_string(),
                code: Some(1),
                stderr: "no such address\n".to_string(),
            },
            Address(0xdead_beef),
            7,
        );
        assert_eq!(err.to_string(), "Failed to resolve address 0xdeadbeef on line 7");
        let cause = std::error::Error::source(&err).unwrap().to_string();
        assert_eq!(cause, "`llvm-addr2line` exited with status 1: no such address");
    }

    #[test]
    fn test_launch_failure_is_unavailable() {
        let err = SymbolizeError::from_resolver(
            ResolverError::Launch {
                program: "llvm-addr2line".to_string(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            },
            Address(0x10),
            1,
        );
        assert!(matches!(err, SymbolizeError::ResolverUnavailable { .. }));
    }

    #[test]
    fn test_timeout_is_classified() {
        let err = SymbolizeError::from_resolver(
            ResolverError::Timeout {
                program: "sh".to_string(),
                timeout: Duration::from_secs(2),
            },
            Address(0x10),
            4,
        );
        assert!(matches!(
            err,
            SymbolizeError::ResolverTimeout { address: Address(0x10), line: 4, .. }
        ));
        assert_eq!(err.to_string(), "Resolver timed out on line 4 resolving 0x10");
        let cause = std::error::Error::source(&err).unwrap().to_string();
        assert_eq!(cause, "`sh` did not finish within 2s");
    }

    #[test]
    fn test_killed_resolver_message() {
        let err = ResolverError::ExitFailure {
            program: "addr2line".to_string(),
            code: None,
            stderr: String::new(),
        };
        assert_eq!(err.to_string(), "`addr2line` exited with a signal");
    }
}
