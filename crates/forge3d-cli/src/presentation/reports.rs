//! Summaries printed after `install` and `diagnose`.

use forge3d_core::{ExtensionOutcome, SessionState};
use forge3d_runtime::{DiagnosticReport, OrchestrationReport, PackageOutcome};

use super::tables::{print_separator, status_glyph};
use super::{BOLD, GREEN, RED, RESET, YELLOW};

/// Per-group import status, then the verdict.
pub fn print_diagnostic_report(report: &DiagnosticReport) {
    println!(
        "{BOLD}Dependency check{RESET} ({})",
        report.generated_at.format("%Y-%m-%d %H:%M:%S")
    );
    for group in &report.groups {
        println!();
        let kind = if group.required { "required" } else { "optional" };
        println!("{BOLD}{}{RESET} ({kind})", group.name);
        print_separator(50);
        for package in &group.packages {
            println!(
                "  {:<22} {}",
                package.name,
                status_glyph(package.status, group.required)
            );
        }
    }

    if let Some(torch) = &report.torch {
        println!();
        println!("{BOLD}torch runtime{RESET}");
        print_separator(50);
        println!("  {:<22} {}", "version", torch.version);
        let cuda = if torch.cuda_available {
            format!("{GREEN}✓ available ({} device(s)){RESET}", torch.device_count)
        } else {
            format!("{YELLOW}○ not available{RESET}")
        };
        println!("  {:<22} {cuda}", "CUDA");
        if report.torch_misses_gpu() {
            println!(
                "  {YELLOW}An NVIDIA GPU is present but this torch build cannot use it. \
                 Reinstall with `forge3d install --mode cuda12` (or cuda11).{RESET}"
            );
        }
    }

    println!();
    print_separator(50);
    if report.is_healthy() {
        println!("{GREEN}✓ All required packages import cleanly.{RESET}");
    } else if !report.snapshot.has_interpreter() {
        println!("{RED}✗ No interpreter found. Set one with `forge3d config set interpreter <path>`.{RESET}");
    } else {
        println!(
            "{RED}✗ Missing required packages: {}{RESET}",
            report.missing_required().join(", ")
        );
        println!("Run `forge3d install` to fix.");
    }
}

fn outcome_line(outcome: PackageOutcome) -> String {
    match outcome {
        PackageOutcome::Installed => format!("{GREEN}✓ installed{RESET}"),
        PackageOutcome::Failed => format!("{RED}✗ failed{RESET}"),
        PackageOutcome::TimedOut => format!("{RED}✗ timed out{RESET}"),
        PackageOutcome::Ambiguous => format!("{YELLOW}? unconfirmed{RESET}"),
    }
}

fn extension_line(outcome: &ExtensionOutcome) -> String {
    if outcome.is_available() {
        format!("{GREEN}✓ {outcome}{RESET}")
    } else {
        format!("{YELLOW}○ {outcome}{RESET}")
    }
}

/// Summary of a finished session. `report` is `None` when the session failed.
pub fn print_install_report(report: Option<&OrchestrationReport>, state: &SessionState) {
    println!();
    println!("{BOLD}Installation summary{RESET} ({})", state.aggregate);
    print_separator(50);
    if let Some(mode) = state.resolved_mode {
        println!("  {:<26} {mode}", "Mode");
    }

    if let Some(report) = report {
        for group in &report.groups {
            let failed: Vec<&str> = group.failed().collect();
            if failed.is_empty() {
                println!(
                    "  {:<26} {GREEN}✓ {}/{}{RESET}",
                    group.group,
                    group.installed_count(),
                    group.packages.len()
                );
            } else {
                println!("  {:<26} {RED}✗ {}{RESET}", group.group, failed.join(", "));
                for (name, outcome) in group.packages.iter().filter(|(_, o)| o.is_error()) {
                    println!("    {name:<24} {}", outcome_line(*outcome));
                }
            }
        }
    }

    for (extension, outcome) in &state.extensions {
        println!("  {:<26} {}", extension.name(), extension_line(outcome));
    }
    if state.extensions.iter().any(|(_, o)| !o.is_available()) {
        println!("  {YELLOW}Texture generation needs both native extensions.{RESET}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_line_colors() {
        assert!(extension_line(&ExtensionOutcome::Built).contains(GREEN));
        assert!(extension_line(&ExtensionOutcome::Skipped).contains(YELLOW));
        assert!(outcome_line(PackageOutcome::TimedOut).contains("timed out"));
    }
}
