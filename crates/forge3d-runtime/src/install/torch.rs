//! Runtime check of the installed torch build.

use serde::Serialize;

/// Prefix of the line the check script prints.
pub const TORCH_RUNTIME_MARKER: &str = "[TORCH]";

/// Prints the torch version, whether CUDA is usable and how many devices it sees.
pub const TORCH_RUNTIME_SCRIPT: &str = "import torch; print('[TORCH]', torch.__version__, \
     torch.cuda.is_available(), torch.cuda.device_count())";

/// What the installed torch build reports about the accelerator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TorchRuntime {
    pub version: String,
    pub cuda_available: bool,
    pub device_count: u32,
}

/// Parse the `[TORCH] <version> <True|False> <count>` line.
pub fn parse_torch_runtime(output: &str) -> Option<TorchRuntime> {
    let line = output
        .lines()
        .find_map(|l| l.trim().strip_prefix(TORCH_RUNTIME_MARKER))?;
    let mut fields = line.split_whitespace();
    let version = fields.next()?.to_string();
    let cuda_available = match fields.next()? {
        "True" => true,
        "False" => false,
        _ => return None,
    };
    let device_count = fields.next()?.parse().ok()?;
    Some(TorchRuntime {
        version,
        cuda_available,
        device_count,
    })
}
