//! Shared CLI presentation utilities.
//!
//! Format-only: no domain decisions are made here.

pub mod environment;
pub mod reports;
pub mod tables;

pub use environment::print_snapshot;
pub use reports::{print_diagnostic_report, print_install_report};
pub use tables::{format_optional, print_separator, status_glyph};

// ANSI color codes
pub(crate) const GREEN: &str = "\x1b[32m";
pub(crate) const RED: &str = "\x1b[31m";
pub(crate) const YELLOW: &str = "\x1b[33m";
pub(crate) const BOLD: &str = "\x1b[1m";
pub(crate) const RESET: &str = "\x1b[0m";
