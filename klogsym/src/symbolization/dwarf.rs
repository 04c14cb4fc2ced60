//! In-process address resolution from the image's DWARF debug info
//!
//! Used with `--builtin` when no addr2line tool is installed. Falls back to
//! the ELF symbol table for code compiled without line info.

use crate::domain::{Address, ResolverError};
use addr2line::Context;
use gimli::{EndianRcSlice, RunTimeEndian};
use log::{debug, info};
use object::{Object, ObjectSection, ObjectSymbol, SymbolKind};
use rustc_demangle::demangle;
use std::cell::OnceCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use super::AddressResolver;

/// Resolves addresses against the DWARF info of one executable image
///
/// The image is read lazily on the first lookup. Output looks like
/// `function (file:line)`; inlined callers follow, separated by ` <- `.
#[derive(Default)]
pub struct DwarfResolver {
    image: OnceCell<LoadedImage>,
}

struct LoadedImage {
    path: PathBuf,
    ctx: Context<EndianRcSlice<RunTimeEndian>>,
    /// Function symbols sorted by start address
    symbols: Vec<FunctionSymbol>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct FunctionSymbol {
    start: u64,
    /// 0 when the symbol table doesn't record a size
    size: u64,
    name: String,
}

impl DwarfResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn image(&self, executable: &Path) -> Result<&LoadedImage, ResolverError> {
        if let Some(image) = self.image.get() {
            if image.path != executable {
                return Err(load_error(executable, "a different image is already loaded"));
            }
            return Ok(image);
        }
        let image = LoadedImage::load(executable)?;
        Ok(self.image.get_or_init(|| image))
    }
}

impl LoadedImage {
    fn load(path: &Path) -> Result<Self, ResolverError> {
        let binary_data = fs::read(path).map_err(|e| load_error(path, e))?;
        let obj_file = object::File::parse(&*binary_data).map_err(|e| load_error(path, e))?;

        let endian =
            if obj_file.is_little_endian() { RunTimeEndian::Little } else { RunTimeEndian::Big };

        let load_section =
            |id: gimli::SectionId| -> Result<EndianRcSlice<RunTimeEndian>, gimli::Error> {
                let data = obj_file
                    .section_by_name(id.name())
                    .and_then(|section| section.uncompressed_data().ok())
                    .unwrap_or(std::borrow::Cow::Borrowed(&[][..]));
                Ok(EndianRcSlice::new(Rc::from(&*data), endian))
            };

        let dwarf = gimli::Dwarf::load(&load_section).map_err(|e| load_error(path, e))?;
        let ctx = Context::from_dwarf(dwarf).map_err(|e| load_error(path, e))?;

        let mut symbols: Vec<FunctionSymbol> = obj_file
            .symbols()
            .filter(|sym| sym.kind() == SymbolKind::Text && sym.address() != 0)
            .filter_map(|sym| {
                let name = sym.name().ok()?.to_string();
                Some(FunctionSymbol { start: sym.address(), size: sym.size(), name })
            })
            .collect();
        symbols.sort_unstable_by_key(|sym| sym.start);

        info!("Loaded {} ({} function symbols)", path.display(), symbols.len());
        Ok(Self { path: path.to_path_buf(), ctx, symbols })
    }

    fn frames(&self, addr: u64) -> Vec<String> {
        let mut result = Vec::new();

        if let Ok(mut frame_iter) = self.ctx.find_frames(addr).skip_all_loads() {
            while let Ok(Some(frame)) = frame_iter.next() {
                let function = frame
                    .function
                    .and_then(|f| f.demangle().ok().map(|s| s.to_string()))
                    .or_else(|| self.symbol_for(addr));

                let location = frame.location.and_then(|loc| {
                    let file = loc.file?;
                    Some(match loc.line {
                        Some(line) => format!("{file}:{line}"),
                        None => file.to_string(),
                    })
                });

                match (function, location) {
                    (Some(function), Some(location)) => {
                        result.push(format!("{function} ({location})"));
                    }
                    (Some(function), None) => result.push(function),
                    (None, Some(location)) => result.push(format!("?? ({location})")),
                    (None, None) => {}
                }
            }
        }

        if result.is_empty() {
            if let Some(function) = self.symbol_for(addr) {
                result.push(function);
            }
        }
        result
    }

    /// Demangled name of the function symbol covering `addr`
    fn symbol_for(&self, addr: u64) -> Option<String> {
        let sym = covering_symbol(&self.symbols, addr)?;
        Some(format!("{:#}", demangle(&sym.name)))
    }
}

/// The symbol in sorted `symbols` whose extent contains `addr`
///
/// A sized symbol covers `start..start + size`. An unsized one extends to
/// the next symbol's start; the last symbol without a size covers nothing
/// beyond its own start address.
fn covering_symbol(symbols: &[FunctionSymbol], addr: u64) -> Option<&FunctionSymbol> {
    let idx = symbols.partition_point(|sym| sym.start <= addr);
    let sym = symbols.get(idx.checked_sub(1)?)?;
    let end = if sym.size > 0 {
        sym.start.saturating_add(sym.size)
    } else {
        symbols[idx..]
            .iter()
            .map(|next| next.start)
            .find(|start| *start > sym.start)
            .unwrap_or(sym.start.saturating_add(1))
    };
    (addr < end).then_some(sym)
}

impl AddressResolver for DwarfResolver {
    fn resolve_address(&self, executable: &Path, address: Address) -> Result<String, ResolverError> {
        let image = self.image(executable)?;
        let frames = image.frames(address.0);
        debug!("{address} -> {} frame(s)", frames.len());

        if frames.is_empty() {
            return Err(ResolverError::Unresolved(address));
        }
        Ok(frames.join(" <- "))
    }
}

fn load_error(path: &Path, reason: impl ToString) -> ResolverError {
    ResolverError::Load { path: path.to_path_buf(), reason: reason.to_string() }
}
