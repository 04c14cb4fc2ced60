//! CLI argument definitions

use crate::symbolization::DEFAULT_RESOLVER;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Image name the kernel build produces
pub const DEFAULT_EXECUTABLE: &str = "ftl.elf";

#[derive(Parser, Debug)]
#[command(
    name = "klogsym",
    version,
    about = "Symbolicate backtrace frames in a kernel log",
    after_help = "\
EXAMPLES:
    klogsym serial.log                           Resolve against ./ftl.elf
    klogsym -e build/kernel.elf serial.log       Explicit kernel image
    klogsym --resolver-arg=-f --resolver-arg=-C serial.log
                                                 Include demangled function names
    klogsym --builtin -e build/kernel.elf serial.log
                                                 No llvm-addr2line needed"
)]
pub struct Args {
    /// Kernel log to symbolicate
    #[arg(value_name = "LOG_FILE")]
    pub log_file: PathBuf,

    /// Executable image used for symbol resolution
    #[arg(short = 'e', long, value_name = "PATH", default_value = DEFAULT_EXECUTABLE)]
    pub executable: PathBuf,

    /// addr2line-compatible tool used to resolve addresses
    #[arg(long, value_name = "PROGRAM", default_value = DEFAULT_RESOLVER)]
    pub resolver: String,

    /// Extra argument for the resolver, placed before `-e` (repeatable)
    #[arg(long = "resolver-arg", value_name = "ARG", allow_hyphen_values = true)]
    pub resolver_args: Vec<String>,

    /// Resolve in-process from the image's DWARF info instead of running a tool
    #[arg(long, conflicts_with_all = ["resolver", "resolver_args"])]
    pub builtin: bool,

    /// Kill a resolver invocation after N seconds (0 = unlimited)
    #[arg(long, value_name = "SECS", default_value = "0")]
    pub timeout: u64,
}

impl Args {
    /// Per-invocation resolver limit, if any
    #[must_use]
    pub fn resolver_timeout(&self) -> Option<Duration> {
        (self.timeout > 0).then(|| Duration::from_secs(self.timeout))
    }
}
