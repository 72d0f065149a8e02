//! Table formatting helpers.

use forge3d_core::DependencyStatus;

use super::{GREEN, RED, RESET, YELLOW};

/// Print a horizontal separator line.
pub fn print_separator(width: usize) {
    println!("{}", "-".repeat(width));
}

/// Format an optional value for table display, returning a default if None.
pub fn format_optional<T: std::fmt::Display>(value: Option<&T>, default: &str) -> String {
    value.map_or_else(|| default.to_string(), ToString::to_string)
}

/// Colored marker for a dependency row. Optional packages never show red.
pub fn status_glyph(status: DependencyStatus, required: bool) -> String {
    match status {
        DependencyStatus::Installed => format!("{GREEN}✓ {status}{RESET}"),
        DependencyStatus::NotInstalled | DependencyStatus::Error if required => {
            format!("{RED}✗ {status}{RESET}")
        }
        _ => format!("{YELLOW}○ {status}{RESET}"),
    }
}
