//! Installation mode and its resolved form.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Package index used for CPU-only accelerator packages.
pub const TORCH_INDEX_CPU: &str = "https://download.pytorch.org/whl/cpu";
/// Package index for the CUDA 11.8 builds.
pub const TORCH_INDEX_CUDA11: &str = "https://download.pytorch.org/whl/cu118";
/// Package index for the CUDA 12.1 builds.
pub const TORCH_INDEX_CUDA12: &str = "https://download.pytorch.org/whl/cu121";

/// Operator-selected installation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallationMode {
    #[default]
    Auto,
    Cpu,
    Cuda11,
    Cuda12,
}

impl InstallationMode {
    /// The concrete mode, or `None` for `Auto`.
    pub const fn concrete(self) -> Option<ResolvedMode> {
        match self {
            Self::Auto => None,
            Self::Cpu => Some(ResolvedMode::Cpu),
            Self::Cuda11 => Some(ResolvedMode::Cuda11),
            Self::Cuda12 => Some(ResolvedMode::Cuda12),
        }
    }
}

impl fmt::Display for InstallationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Auto => "auto",
            Self::Cpu => "cpu",
            Self::Cuda11 => "cuda11",
            Self::Cuda12 => "cuda12",
        })
    }
}

impl FromStr for InstallationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "cpu" => Ok(Self::Cpu),
            "cuda11" | "cu118" => Ok(Self::Cuda11),
            "cuda12" | "cu121" => Ok(Self::Cuda12),
            other => Err(format!(
                "unknown installation mode '{other}' (expected auto, cpu, cuda11 or cuda12)"
            )),
        }
    }
}

/// A mode with `Auto` already resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolvedMode {
    Cpu,
    Cuda11,
    Cuda12,
}

impl ResolvedMode {
    pub const fn index_url(self) -> &'static str {
        match self {
            Self::Cpu => TORCH_INDEX_CPU,
            Self::Cuda11 => TORCH_INDEX_CUDA11,
            Self::Cuda12 => TORCH_INDEX_CUDA12,
        }
    }

    pub const fn is_accelerated(self) -> bool {
        !matches!(self, Self::Cpu)
    }

    /// Map a CUDA major version to a mode. Unknown majors fall back to CPU.
    pub const fn from_cuda_major(major: u32) -> Self {
        match major {
            11 => Self::Cuda11,
            m if m >= 12 => Self::Cuda12,
            _ => Self::Cpu,
        }
    }
}

impl fmt::Display for ResolvedMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Cpu => "cpu",
            Self::Cuda11 => "cuda11",
            Self::Cuda12 => "cuda12",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mode() {
        assert_eq!("CPU".parse::<InstallationMode>(), Ok(InstallationMode::Cpu));
        assert_eq!(
            "cu121".parse::<InstallationMode>(),
            Ok(InstallationMode::Cuda12)
        );
        assert!("rocm".parse::<InstallationMode>().is_err());
    }

    #[test]
    fn test_index_urls() {
        assert!(ResolvedMode::Cpu.index_url().ends_with("/whl/cpu"));
        assert!(ResolvedMode::Cuda11.index_url().ends_with("/whl/cu118"));
        assert!(ResolvedMode::Cuda12.index_url().ends_with("/whl/cu121"));
    }

    #[test]
    fn test_from_cuda_major() {
        assert_eq!(ResolvedMode::from_cuda_major(11), ResolvedMode::Cuda11);
        assert_eq!(ResolvedMode::from_cuda_major(12), ResolvedMode::Cuda12);
        assert_eq!(ResolvedMode::from_cuda_major(13), ResolvedMode::Cuda12);
        assert_eq!(ResolvedMode::from_cuda_major(10), ResolvedMode::Cpu);
    }
}
