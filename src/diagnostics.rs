//! Diagnostic producers and the rules for combining them.
//!
//! - [`quick_validate`]: heuristics that need no external tool
//! - [`run_diagnostics`]: one `qcc -fsyntax-only` pass over the buffer
//! - [`fuse`]: clangd and local diagnostics merged into one published set
//!
//! [`VersionGate`] and [`GenerationCounter`] keep slow results from
//! overwriting newer ones.

mod fusion;
mod gcc_output;
mod heuristics;
mod noise;
mod qcc;
mod staleness;

/// `source` of heuristic and synthetic diagnostics.
pub const SOURCE_LOCAL: &str = "basilisk-lsp";
pub const SOURCE_QCC: &str = "qcc";
pub const SOURCE_CLANGD: &str = "clangd";

pub use fusion::{dedupe_and_cap, fuse, normalize_source, select_peer_diagnostics};
pub use gcc_output::{CompilerMessage, CompilerSeverity, parse_gcc_output};
pub use heuristics::quick_validate;
pub use noise::{filter_noise, looks_like_basilisk};
pub use qcc::{
    QCC_TIMEOUT, QccRun, check_qcc_available, qcc_not_found_diagnostic, qcc_version,
    run_diagnostics,
};
pub use staleness::{CycleTicket, GenerationCounter, PushTag, VersionGate};
