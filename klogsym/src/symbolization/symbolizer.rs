use crate::domain::{Address, ResolverError};
use log::debug;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::path::PathBuf;

use super::AddressResolver;

/// Symbolizer for resolving backtrace addresses against one executable image
///
/// Includes a cache so each distinct address reaches the underlying resolver
/// at most once per run. Kernel backtraces repeat the same return addresses
/// across panics and nested traces, and every miss may cost a process spawn.
pub struct Symbolizer<R> {
    resolver: R,
    executable: PathBuf,
    /// Cache of resolved locations by address
    cache: RefCell<HashMap<Address, String>>,
    hits: Cell<usize>,
    misses: Cell<usize>,
}

/// Cache counters for a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
}

impl<R: AddressResolver> Symbolizer<R> {
    /// Create a new symbolizer resolving against `executable`
    pub fn new(resolver: R, executable: impl Into<PathBuf>) -> Self {
        Self {
            resolver,
            executable: executable.into(),
            cache: RefCell::new(HashMap::new()),
            hits: Cell::new(0),
            misses: Cell::new(0),
        }
    }

    /// Resolve an address to its location text
    ///
    /// Uses a cache to avoid re-resolving the same address multiple times.
    /// Failures are not cached.
    ///
    /// # Errors
    /// Returns whatever the underlying resolver reports on a cache miss
    pub fn resolve(&self, address: Address) -> Result<String, ResolverError> {
        // Check cache first
        if let Some(cached) = self.cache.borrow().get(&address) {
            self.hits.set(self.hits.get() + 1);
            debug!("cache hit for {address}");
            return Ok(cached.clone());
        }

        // Cache miss - perform actual resolution
        self.misses.set(self.misses.get() + 1);
        debug!("cache miss for {address}, resolving against {}", self.executable.display());
        let location = self.resolver.resolve_address(&self.executable, address)?;

        self.cache.borrow_mut().insert(address, location.clone());
        Ok(location)
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats { hits: self.hits.get(), misses: self.misses.get() }
    }

    /// Number of distinct addresses resolved so far
    #[must_use]
    pub fn cached_len(&self) -> usize {
        self.cache.borrow().len()
    }
}
