//! # Address Resolution
//!
//! Turns the raw return addresses printed in a kernel backtrace into
//! human-readable locations (function, file, line). The text a backend
//! returns is never interpreted; it is spliced into the log verbatim.
//!
//! ## Backends
//!
//! - **`external`**: runs an addr2line-compatible tool (default
//!   `llvm-addr2line`) as `<tool> -e <image> 0x<addr>` and takes its trimmed
//!   stdout. Optional per-invocation timeout.
//! - **`dwarf`**: resolves in-process from the image's DWARF line tables,
//!   with an ELF symbol table fallback.
//!
//! Both sit behind [`AddressResolver`], which is also the seam tests use to
//! substitute deterministic fakes.
//!
//! ## Caching
//!
//! [`Symbolizer`] wraps a backend with a per-run `address -> text` cache.
//! The executable path is fixed for the run, so it is not part of the key.
//! The cache only grows; it is dropped with the symbolizer.

pub mod dwarf;
pub mod external;
pub mod symbolizer;

use crate::domain::{Address, ResolverError};
use std::path::Path;

pub use dwarf::DwarfResolver;
pub use external::{ExternalResolver, DEFAULT_RESOLVER};
pub use symbolizer::{CacheStats, Symbolizer};

/// Maps an address in an executable image to displayable location text
pub trait AddressResolver {
    /// Resolve `address` against `executable`
    ///
    /// # Errors
    /// Returns an error if the backend cannot run or has nothing for `address`
    fn resolve_address(&self, executable: &Path, address: Address) -> Result<String, ResolverError>;
}

impl<R: AddressResolver + ?Sized> AddressResolver for Box<R> {
    fn resolve_address(&self, executable: &Path, address: Address) -> Result<String, ResolverError> {
        (**self).resolve_address(executable, address)
    }
}
