//! Environment snapshot types produced by the probe.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::mode::ResolvedMode;

/// A `major.minor` toolkit version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CudaVersion {
    pub major: u32,
    pub minor: u32,
}

impl CudaVersion {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Parse `"12.1"`, `"12.1.105"` or `"v11.8"`. A bare major is accepted.
    pub fn parse(input: &str) -> Option<Self> {
        let trimmed = input.trim().trim_start_matches(['v', 'V']);
        let mut parts = trimmed.split('.');
        let major = parts.next()?.trim().parse().ok()?;
        let minor = parts
            .next()
            .map(|m| {
                m.chars()
                    .take_while(char::is_ascii_digit)
                    .collect::<String>()
            })
            .and_then(|m| m.parse().ok())
            .unwrap_or(0);
        Some(Self { major, minor })
    }

    pub const fn mode(self) -> ResolvedMode {
        ResolvedMode::from_cuda_major(self.major)
    }
}

impl fmt::Display for CudaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// How an installed toolkit was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToolkitSource {
    /// `nvcc --version` reported a release.
    Compiler,
    /// A versioned install root was found on disk.
    Filesystem,
}

impl fmt::Display for ToolkitSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Compiler => "nvcc",
            Self::Filesystem => "filesystem",
        })
    }
}

/// An installed accelerator toolkit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolkitInfo {
    pub version: CudaVersion,
    pub root: Option<PathBuf>,
    pub source: ToolkitSource,
}

/// Accelerator signals gathered from the driver, the toolkit compiler and the filesystem.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceleratorInfo {
    /// NVIDIA hardware answered `nvidia-smi`.
    pub nvidia_hardware: bool,
    pub driver_version: Option<String>,
    /// Installed toolkit, if any.
    pub toolkit: Option<ToolkitInfo>,
    /// Highest toolkit version the driver supports. A recommendation, not an install.
    pub recommended_toolkit: Option<CudaVersion>,
}

impl AcceleratorInfo {
    pub const fn has_toolkit(&self) -> bool {
        self.toolkit.is_some()
    }
}

/// Alternative package managers able to install into the interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageManager {
    Pip,
    Uv,
}

impl fmt::Display for PackageManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pip => "pip",
            Self::Uv => "uv",
        })
    }
}

/// Immutable result of one probe pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnvironmentSnapshot {
    /// Interpreter used for every install and check this session.
    pub interpreter: Option<PathBuf>,
    /// Selected virtual environment root.
    pub virtual_env: Option<PathBuf>,
    /// Interpreter version string as reported by `--version`.
    pub interpreter_version: Option<String>,
    pub accelerator: AcceleratorInfo,
    pub compiler_present: bool,
    pub package_managers: Vec<PackageManager>,
}

impl EnvironmentSnapshot {
    pub fn has_interpreter(&self) -> bool {
        self.interpreter.is_some()
    }

    pub fn supports(&self, manager: PackageManager) -> bool {
        self.package_managers.contains(&manager)
    }

    /// Preferred manager given the operator's preference.
    pub fn package_manager(&self, prefer_uv: bool) -> Option<PackageManager> {
        if prefer_uv && self.supports(PackageManager::Uv) {
            return Some(PackageManager::Uv);
        }
        if self.supports(PackageManager::Pip) {
            return Some(PackageManager::Pip);
        }
        self.package_managers.first().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cuda_version() {
        assert_eq!(CudaVersion::parse("12.1"), Some(CudaVersion::new(12, 1)));
        assert_eq!(CudaVersion::parse("v11.8"), Some(CudaVersion::new(11, 8)));
        assert_eq!(
            CudaVersion::parse("12.4.131"),
            Some(CudaVersion::new(12, 4))
        );
        assert_eq!(CudaVersion::parse("12"), Some(CudaVersion::new(12, 0)));
        assert_eq!(CudaVersion::parse("abc"), None);
    }

    #[test]
    fn test_version_ordering() {
        assert!(CudaVersion::new(12, 1) > CudaVersion::new(11, 8));
        assert!(CudaVersion::new(12, 10) > CudaVersion::new(12, 2));
    }

    #[test]
    fn test_package_manager_preference() {
        let snapshot = EnvironmentSnapshot {
            package_managers: vec![PackageManager::Pip, PackageManager::Uv],
            ..Default::default()
        };
        assert_eq!(snapshot.package_manager(true), Some(PackageManager::Uv));
        assert_eq!(snapshot.package_manager(false), Some(PackageManager::Pip));

        let uv_only = EnvironmentSnapshot {
            package_managers: vec![PackageManager::Uv],
            ..Default::default()
        };
        assert_eq!(uv_only.package_manager(false), Some(PackageManager::Uv));
        assert_eq!(EnvironmentSnapshot::default().package_manager(true), None);
    }
}
