//! Accelerator toolkit discovery and child-process environment.

use std::env;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use forge3d_core::CudaVersion;
use tokio::process::Command;
use tracing::debug;

/// One place a toolkit may live.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Candidate {
    /// A fixed root, used if it exists.
    Root(PathBuf),
    /// Subdirectories of `parent` whose names start with `prefix`; the
    /// lexicographically greatest wins.
    Versioned { parent: PathBuf, prefix: String },
}

/// A discovered toolkit install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolkitLocation {
    pub root: PathBuf,
    /// Parsed from the directory name when it carries one.
    pub version: Option<CudaVersion>,
}

impl ToolkitLocation {
    pub fn bin_dir(&self) -> PathBuf {
        self.root.join("bin")
    }

    /// `PATH` with the toolkit's `bin` prepended.
    pub fn path_with_bin(&self, current: Option<OsString>) -> OsString {
        let bin = self.bin_dir();
        let rest = current
            .as_deref()
            .map(|p| env::split_paths(p).filter(|e| *e != bin).collect::<Vec<_>>())
            .unwrap_or_default();
        env::join_paths(std::iter::once(bin.clone()).chain(rest))
            .unwrap_or_else(|_| bin.into_os_string())
    }

    /// Point a child at this toolkit: home variables plus `PATH` prefix.
    pub fn apply(&self, cmd: &mut Command) {
        cmd.env("CUDA_HOME", &self.root)
            .env("CUDA_PATH", &self.root)
            .env("PATH", self.path_with_bin(env::var_os("PATH")));
    }
}

/// Scans a prioritized list of well-known install roots.
#[derive(Debug, Clone)]
pub struct ToolkitLocator {
    candidates: Vec<Candidate>,
}

impl ToolkitLocator {
    /// Candidates for this machine, in priority order:
    /// `CUDA_PATH`/`CUDA_HOME`, `/usr/local/cuda`, `/opt/cuda`, versioned
    /// `/usr/local/cuda-*`, then the Windows toolkit directory.
    pub fn from_system() -> Self {
        let mut candidates: Vec<Candidate> = ["CUDA_PATH", "CUDA_HOME"]
            .iter()
            .filter_map(|var| env::var_os(var))
            .filter(|v| !v.is_empty())
            .map(|v| Candidate::Root(PathBuf::from(v)))
            .collect();

        #[cfg(unix)]
        {
            candidates.push(Candidate::Root(PathBuf::from("/usr/local/cuda")));
            candidates.push(Candidate::Root(PathBuf::from("/opt/cuda")));
            candidates.push(Candidate::Versioned {
                parent: PathBuf::from("/usr/local"),
                prefix: "cuda-".to_string(),
            });
        }

        #[cfg(windows)]
        {
            let program_files =
                env::var_os("ProgramFiles").map_or_else(|| PathBuf::from("C:\\Program Files"), PathBuf::from);
            candidates.push(Candidate::Versioned {
                parent: program_files.join("NVIDIA GPU Computing Toolkit").join("CUDA"),
                prefix: "v".to_string(),
            });
        }

        Self { candidates }
    }

    /// Locator over explicit roots, for tests and overrides.
    pub fn with_roots(roots: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            candidates: roots.into_iter().map(Candidate::Root).collect(),
        }
    }

    /// Add a versioned parent directory scanned after the existing candidates.
    #[must_use]
    pub fn with_versioned(mut self, parent: impl Into<PathBuf>, prefix: &str) -> Self {
        self.candidates.push(Candidate::Versioned {
            parent: parent.into(),
            prefix: prefix.to_string(),
        });
        self
    }

    /// First existing candidate, or `None`.
    pub fn locate(&self) -> Option<ToolkitLocation> {
        for candidate in &self.candidates {
            let found = match candidate {
                Candidate::Root(root) => root.is_dir().then(|| ToolkitLocation {
                    version: version_from_root(root),
                    root: root.clone(),
                }),
                Candidate::Versioned { parent, prefix } => newest_versioned(parent, prefix),
            };
            if let Some(location) = found {
                debug!(root = %location.root.display(), version = ?location.version, "Found accelerator toolkit");
                return Some(location);
            }
        }
        None
    }

    /// Greatest versioned install across the versioned candidates only.
    ///
    /// Used as the filesystem signal of the accelerator probe, where an
    /// unversioned root says nothing about which toolkit is installed.
    pub fn newest_versioned_install(&self) -> Option<ToolkitLocation> {
        self.candidates
            .iter()
            .filter_map(|c| match c {
                Candidate::Versioned { parent, prefix } => newest_versioned(parent, prefix),
                Candidate::Root(root) => root.is_dir().then(|| ToolkitLocation {
                    version: version_from_root(root),
                    root: root.clone(),
                }),
            })
            .filter(|l| l.version.is_some())
            .max_by_key(|l| l.version)
    }
}

fn newest_versioned(parent: &Path, prefix: &str) -> Option<ToolkitLocation> {
    fs::read_dir(parent)
        .ok()?
        .filter_map(Result::ok)
        .filter(|e| e.path().is_dir())
        .filter_map(|e| {
            let name = e.file_name().to_string_lossy().into_owned();
            let version = CudaVersion::parse(name.strip_prefix(prefix)?)?;
            Some(ToolkitLocation {
                root: e.path(),
                version: Some(version),
            })
        })
        .max_by_key(|l| l.version)
}

/// `/usr/local/cuda` is usually a symlink to `cuda-X.Y`; read the version off the target.
fn version_from_root(root: &Path) -> Option<CudaVersion> {
    let resolved = fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());
    let name = resolved.file_name()?.to_string_lossy().into_owned();
    let suffix = name
        .strip_prefix("cuda-")
        .or_else(|| name.strip_prefix('v'))?;
    CudaVersion::parse(suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_first_existing_root_wins() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing");
        let present = dir.path().join("cuda-12.1");
        fs::create_dir(&present).unwrap();

        let locator = ToolkitLocator::with_roots([missing, present.clone()]);
        let found = locator.locate().unwrap();
        assert_eq!(found.root, present);
        assert_eq!(found.version, Some(CudaVersion::new(12, 1)));
    }

    #[test]
    fn test_versioned_scan_takes_greatest() {
        let dir = tempdir().unwrap();
        for name in ["cuda-11.8", "cuda-12.1", "cuda-12.0", "other"] {
            fs::create_dir(dir.path().join(name)).unwrap();
        }
        let locator = ToolkitLocator::with_roots([]).with_versioned(dir.path(), "cuda-");
        let found = locator.locate().unwrap();
        assert_eq!(found.root, dir.path().join("cuda-12.1"));
        assert_eq!(found.version, Some(CudaVersion::new(12, 1)));
    }

    #[test]
    fn test_versioned_scan_ignores_unversioned_names() {
        let dir = tempdir().unwrap();
        for name in ["cuda-12.1", "cuda-latest", "cuda-backup", "cuda-9.2"] {
            fs::create_dir(dir.path().join(name)).unwrap();
        }
        let locator = ToolkitLocator::with_roots([]).with_versioned(dir.path(), "cuda-");
        let found = locator.locate().unwrap();
        assert_eq!(found.root, dir.path().join("cuda-12.1"));
        assert_eq!(found.version, Some(CudaVersion::new(12, 1)));

        let only_junk = tempdir().unwrap();
        fs::create_dir(only_junk.path().join("cuda-latest")).unwrap();
        let locator = ToolkitLocator::with_roots([]).with_versioned(only_junk.path(), "cuda-");
        assert!(locator.locate().is_none());
    }

    #[test]
    fn test_none_found() {
        let dir = tempdir().unwrap();
        let locator = ToolkitLocator::with_roots([dir.path().join("nope")])
            .with_versioned(dir.path(), "cuda-");
        assert!(locator.locate().is_none());
        assert!(locator.newest_versioned_install().is_none());
    }

    #[test]
    fn test_path_prefix_deduplicates() {
        let location = ToolkitLocation {
            root: PathBuf::from("/opt/cuda"),
            version: None,
        };
        let current = env::join_paths([PathBuf::from("/usr/bin"), PathBuf::from("/opt/cuda/bin")])
            .unwrap();
        let joined = location.path_with_bin(Some(current));
        let parts: Vec<PathBuf> = env::split_paths(&joined).collect();
        assert_eq!(
            parts,
            vec![PathBuf::from("/opt/cuda/bin"), PathBuf::from("/usr/bin")]
        );
    }
}
