//! # klogsym - Kernel Log Symbolication
//!
//! klogsym rewrites the backtraces a kernel prints on panic into readable
//! source locations. Each frame line such as
//!
//! ```text
//!     #3 at ffff800000081a2c
//! ```
//!
//! becomes
//!
//! ```text
//!     3: 0xffff800000081a2c kmain (kernel/src/main.rs:42)
//! ```
//!
//! where the location text comes from an addr2line-compatible tool (or the
//! built-in DWARF resolver) run against the kernel image.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────┐  line   ┌──────────────┐  address  ┌──────────────┐
//! │  Log reader  │────────▶│ LineScanner  │──────────▶│  Symbolizer  │
//! │  (BufRead)   │         │  (regex)     │           │   (cache)    │
//! └──────────────┘         └──────────────┘           └──────┬───────┘
//!        ▲                        │ no match                 │ miss
//!        │                        ▼                          ▼
//!        │                 ┌──────────────┐          ┌───────────────┐
//!        └─────────────────│   Pipeline   │          │AddressResolver│
//!          next line       │  (splice +   │          │ external/dwarf│
//!                          │   write)     │          └───────────────┘
//!                          └──────────────┘
//! ```
//!
//! ## Module Structure
//!
//! - [`scanner`]: recognizes `#<index> at <hex>` and reports its byte span
//! - [`symbolization`]: resolver backends and the per-run address cache
//! - [`pipeline`]: streams the log, splices resolved frames, keeps everything else
//! - [`preflight`]: opens the log and sanity-checks the image before any output
//! - [`cli`]: command-line arguments
//! - [`domain`]: address/frame newtypes and error types
//!
//! ## Failure Policy
//!
//! Any resolver failure ends the run with a non-zero exit. Output is
//! streamed, so a failed run may already have written a prefix of the log;
//! treat the output of a failed run as untrustworthy.

pub mod cli;
pub mod domain;
pub mod pipeline;
pub mod preflight;
pub mod scanner;
pub mod symbolization;
