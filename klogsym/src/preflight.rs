//! Pre-flight checks for klogsym
//!
//! Validates the inputs before any output is produced. A missing log file
//! is fatal; problems with the executable image only warn, since the
//! resolver has the final say on what it can symbolicate.

use crate::domain::SymbolizeError;
use log::warn;
use object::{Object, ObjectSection, ReadCache};
use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

/// Run all pre-flight checks and open the log for streaming
///
/// `inspect_image` can be turned off when the resolver parses the image
/// itself and reports its own problems.
///
/// # Errors
/// Returns [`SymbolizeError::InputNotFound`] if the log cannot be opened
pub fn run_preflight_checks(
    log_path: &Path,
    executable: &Path,
    inspect_image: bool,
) -> Result<BufReader<File>, SymbolizeError> {
    let log = open_log(log_path)?;
    if inspect_image {
        check_executable(executable);
    }
    Ok(log)
}

/// Open the log file, rejecting directories
///
/// # Errors
/// Returns [`SymbolizeError::InputNotFound`] if the path is missing,
/// unreadable or not a regular file
pub fn open_log(path: &Path) -> Result<BufReader<File>, SymbolizeError> {
    let not_found = |source| SymbolizeError::InputNotFound { path: path.to_path_buf(), source };

    let file = File::open(path).map_err(not_found)?;
    let metadata = file.metadata().map_err(not_found)?;
    if !metadata.is_file() {
        return Err(not_found(io::Error::new(io::ErrorKind::InvalidInput, "not a regular file")));
    }
    Ok(BufReader::new(file))
}

/// Debug sections present in an executable image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSymbols {
    pub has_debug_info: bool,
    pub has_symtab: bool,
}

/// Look up the image's debug sections without reading the whole file
///
/// Only the headers and section table are read. Returns `None` for files
/// that aren't object files.
///
/// # Errors
/// Returns an error if the image cannot be opened
pub fn inspect_image(executable: &Path) -> io::Result<Option<ImageSymbols>> {
    let cache = ReadCache::new(File::open(executable)?);
    let Ok(obj) = object::File::parse(&cache) else {
        return Ok(None);
    };

    Ok(Some(ImageSymbols {
        // DWARF debug info
        has_debug_info: obj.section_by_name(".debug_info").is_some_and(|s| s.size() > 0),
        // Symbol table, present in non-stripped binaries
        has_symtab: obj.section_by_name(".symtab").is_some_and(|s| s.size() > 0),
    }))
}

/// Warn about an image that is unlikely to symbolicate well
fn check_executable(executable: &Path) {
    if !executable.is_file() {
        warn!(
            "executable {} not found, resolution will likely fail (use -e to pick the image)",
            executable.display()
        );
        return;
    }

    match inspect_image(executable) {
        Ok(Some(ImageSymbols { has_debug_info: false, has_symtab: false })) => {
            warn!("{} is stripped, frames will not resolve", executable.display());
        }
        Ok(Some(ImageSymbols { has_debug_info: false, .. })) => {
            warn!("{} has no DWARF debug info, source locations unavailable", executable.display());
        }
        // Not an object file; let the resolver decide
        Ok(_) => {}
        Err(e) => warn!("cannot read {}: {e}", executable.display()),
    }
}
