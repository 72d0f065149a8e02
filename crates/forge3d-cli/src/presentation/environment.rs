//! Environment snapshot display.

use forge3d_core::{EnvironmentSnapshot, InstallationMode, NonInteractiveModePrompt, ResolvedMode};
use forge3d_runtime::resolve_mode;

use super::tables::{format_optional, print_separator};
use super::{BOLD, GREEN, RED, RESET, YELLOW};

fn yes_no(present: bool) -> String {
    if present {
        format!("{GREEN}✓ yes{RESET}")
    } else {
        format!("{RED}✗ no{RESET}")
    }
}

/// Print the probe result and the mode `auto` would pick without asking.
pub fn print_snapshot(snapshot: &EnvironmentSnapshot) {
    println!("{BOLD}Environment{RESET}");
    print_separator(60);

    let interpreter = snapshot.interpreter.as_ref().map(|p| p.display());
    println!(
        "  {:<22} {}",
        "Interpreter",
        format_optional(interpreter.as_ref(), &format!("{RED}not found{RESET}"))
    );
    println!(
        "  {:<22} {}",
        "Version",
        format_optional(snapshot.interpreter_version.as_ref(), "-")
    );
    let venv = snapshot.virtual_env.as_ref().map(|p| p.display());
    println!("  {:<22} {}", "Virtual environment", format_optional(venv.as_ref(), "none"));

    let managers: Vec<String> = snapshot
        .package_managers
        .iter()
        .map(ToString::to_string)
        .collect();
    println!(
        "  {:<22} {}",
        "Package managers",
        if managers.is_empty() {
            format!("{RED}none{RESET}")
        } else {
            managers.join(", ")
        }
    );
    println!("  {:<22} {}", "C++ compiler", yes_no(snapshot.compiler_present));

    let accelerator = &snapshot.accelerator;
    println!();
    println!("{BOLD}Accelerator{RESET}");
    print_separator(60);
    println!("  {:<22} {}", "NVIDIA hardware", yes_no(accelerator.nvidia_hardware));
    println!(
        "  {:<22} {}",
        "Driver",
        format_optional(accelerator.driver_version.as_ref(), "-")
    );
    match &accelerator.toolkit {
        Some(toolkit) => println!(
            "  {:<22} {} (via {})",
            "CUDA toolkit", toolkit.version, toolkit.source
        ),
        None => println!("  {:<22} {YELLOW}not installed{RESET}", "CUDA toolkit"),
    }
    println!(
        "  {:<22} {}",
        "Driver supports up to",
        format_optional(accelerator.recommended_toolkit.as_ref(), "-")
    );

    let auto = resolve_mode(InstallationMode::Auto, snapshot, &NonInteractiveModePrompt);
    println!();
    println!("  {:<22} {BOLD}{auto}{RESET}", "Auto mode would pick");
    if auto == ResolvedMode::Cpu && accelerator.nvidia_hardware {
        println!("  {YELLOW}No CUDA version found; `forge3d install` will ask or use --mode.{RESET}");
    }
}
