//! Output parsers for toolkit and driver commands.

use std::sync::LazyLock;

use forge3d_core::CudaVersion;
use regex::Regex;

static NVCC_RELEASE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"release\s+(\d+)\.(\d+)").expect("NVCC_RELEASE is valid")
});

static SMI_CUDA_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"CUDA Version:\s*(\d+)\.(\d+)").expect("SMI_CUDA_VERSION is valid")
});

static SMI_DRIVER_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Driver Version:\s*([0-9][0-9.]*)").expect("SMI_DRIVER_VERSION is valid")
});

/// Driver-side signals from `nvidia-smi`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriverReport {
    pub driver_version: Option<String>,
    /// Highest toolkit the driver supports.
    pub cuda_version: Option<CudaVersion>,
}

fn version_from_captures(re: &Regex, text: &str) -> Option<CudaVersion> {
    let caps = re.captures(text)?;
    let major = caps.get(1)?.as_str().parse().ok()?;
    let minor = caps.get(2)?.as_str().parse().ok()?;
    Some(CudaVersion::new(major, minor))
}

/// `Cuda compilation tools, release 12.1, V12.1.105` -> `12.1`.
pub fn parse_nvcc_release(output: &str) -> Option<CudaVersion> {
    version_from_captures(&NVCC_RELEASE, output)
}

/// Parse the `nvidia-smi` banner.
pub fn parse_nvidia_smi(output: &str) -> DriverReport {
    DriverReport {
        driver_version: SMI_DRIVER_VERSION
            .captures(output)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim_end_matches('.').to_string()),
        cuda_version: version_from_captures(&SMI_CUDA_VERSION, output),
    }
}

/// `Python 3.10.12` -> `3.10.12`.
pub fn parse_interpreter_version(output: &str) -> Option<String> {
    output
        .lines()
        .find_map(|l| l.trim().strip_prefix("Python "))
        .map(|v| v.trim().to_string())
}

/// Oldest interpreter the generator runs on.
pub const MIN_PYTHON: (u32, u32) = (3, 8);

/// `(major, minor)` from a version such as `3.10.12` or `3.13.0rc1`.
pub fn python_major_minor(version: &str) -> Option<(u32, u32)> {
    let mut parts = version.trim().split('.');
    let major = parts.next()?.parse().ok()?;
    let minor: String = parts
        .next()?
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    Some((major, minor.parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    const NVCC: &str = "nvcc: NVIDIA (R) Cuda compiler driver\n\
        Copyright (c) 2005-2023 NVIDIA Corporation\n\
        Built on Mon_Apr__3_17:16:06_PDT_2023\n\
        Cuda compilation tools, release 12.1, V12.1.105\n\
        Build cuda_12.1.r12.1/compiler.32688072_0\n";

    const SMI: &str = "+-----------------------------------------------------------------------------+\n\
        | NVIDIA-SMI 535.104.05   Driver Version: 535.104.05   CUDA Version: 12.2     |\n\
        |-------------------------------+----------------------+----------------------+\n";

    #[test]
    fn test_nvcc_release() {
        assert_eq!(parse_nvcc_release(NVCC), Some(CudaVersion::new(12, 1)));
        assert_eq!(parse_nvcc_release("command not found"), None);
    }

    #[test]
    fn test_nvidia_smi() {
        let report = parse_nvidia_smi(SMI);
        assert_eq!(report.driver_version.as_deref(), Some("535.104.05"));
        assert_eq!(report.cuda_version, Some(CudaVersion::new(12, 2)));
        assert_eq!(parse_nvidia_smi("No devices were found"), DriverReport::default());
    }

    #[test]
    fn test_interpreter_version() {
        assert_eq!(
            parse_interpreter_version("Python 3.10.12\n").as_deref(),
            Some("3.10.12")
        );
        assert_eq!(parse_interpreter_version("pyenv: no such command"), None);
    }

    #[test]
    fn test_python_major_minor() {
        assert_eq!(python_major_minor("3.10.12"), Some((3, 10)));
        assert_eq!(python_major_minor("3.13.0rc1"), Some((3, 13)));
        assert_eq!(python_major_minor("2.7.18"), Some((2, 7)));
        assert!(python_major_minor("3.6.9").unwrap() < MIN_PYTHON);
        assert_eq!(python_major_minor("unknown"), None);
    }
}
