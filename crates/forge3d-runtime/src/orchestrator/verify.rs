//! Final import check of the generator.

use std::path::Path;
use std::time::Duration;

use forge3d_core::{CommandSpec, ProcessResult};

/// Module whose import proves the generator can start.
pub const VERIFY_MODULE: &str = "hy3dgen.shapegen";
pub const VERIFY_MARKER: &str = "[OK]";

/// Importing torch-backed modules can take a while on a cold cache.
const VERIFY_TIMEOUT: Duration = Duration::from_secs(5 * 60);

pub fn verification_command(
    interpreter: &Path,
    repo_root: &Path,
    pythonpath: Option<&str>,
) -> CommandSpec {
    let script = format!("import {VERIFY_MODULE}; print('{VERIFY_MARKER}')");
    let mut spec = CommandSpec::new(interpreter)
        .args(["-c", script.as_str()])
        .cwd(repo_root)
        .timeout(VERIFY_TIMEOUT)
        .label("verify generator import");
    if let Some(value) = pythonpath {
        spec = spec.env("PYTHONPATH", value);
    }
    spec
}

pub fn verification_passed(result: &ProcessResult) -> bool {
    result.success() && result.contains(VERIFY_MARKER)
}
