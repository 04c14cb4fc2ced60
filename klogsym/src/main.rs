//! # klogsym - Main Entry Point
//!
//! Streams a kernel log to stdout with every backtrace frame symbolicated.
//! Logging goes to stderr and is controlled with `RUST_LOG`.

use anyhow::{Context, Result};
use clap::Parser;
use klogsym::cli::Args;
use klogsym::domain::SymbolizeError;
use klogsym::pipeline::Pipeline;
use klogsym::preflight::run_preflight_checks;
use klogsym::scanner::LineScanner;
use klogsym::symbolization::{AddressResolver, DwarfResolver, ExternalResolver, Symbolizer};
use log::info;
use std::io::{self, BufWriter};

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_NOINPUT: i32 = 66;
const EXIT_UNAVAILABLE: i32 = 69;

fn main() {
    env_logger::init();
    std::process::exit(match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            exit_code_for(&e)
        }
    });
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    match err.chain().find_map(|cause| cause.downcast_ref::<SymbolizeError>()) {
        Some(SymbolizeError::InputNotFound { .. }) => EXIT_NOINPUT,
        Some(SymbolizeError::ResolverUnavailable { .. } | SymbolizeError::ResolverTimeout { .. }) => {
            EXIT_UNAVAILABLE
        }
        _ => EXIT_ERROR,
    }
}

fn build_resolver(args: &Args) -> Box<dyn AddressResolver> {
    if args.builtin {
        info!("resolving with built-in DWARF reader");
        return Box::new(DwarfResolver::new());
    }
    info!("resolving with {}", args.resolver);
    Box::new(
        ExternalResolver::new(args.resolver.clone())
            .with_args(args.resolver_args.clone())
            .with_timeout(args.resolver_timeout()),
    )
}

fn run() -> Result<()> {
    let args = Args::parse();

    // The built-in resolver parses the image itself and reports load failures
    let input = run_preflight_checks(&args.log_file, &args.executable, !args.builtin)?;

    let scanner = LineScanner::new().context("Failed to compile backtrace pattern")?;
    let symbolizer = Symbolizer::new(build_resolver(&args), &args.executable);
    let pipeline = Pipeline::new(&scanner, &symbolizer);

    let stdout = io::stdout();
    let output = BufWriter::new(stdout.lock());
    let result = pipeline.run(input, output);

    let cache = symbolizer.stats();
    info!("address cache: {} hits, {} misses", cache.hits, cache.misses);

    result.with_context(|| format!("Failed to symbolicate {}", args.log_file.display()))?;
    Ok(())
}
