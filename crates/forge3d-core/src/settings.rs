//! Persisted operator settings.
//!
//! A flat JSON record loaded at session start and written only when the
//! operator changes a value explicitly (`forge3d config set`).

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{GenerationParams, InstallationMode, MeshFormat};
use crate::paths::{default_repo_dir, normalize_user_path};

/// Upstream location of the generator repository.
pub const DEFAULT_REPO_URL: &str = "https://github.com/Tencent/Hunyuan3D-2";

/// Directory (under the project root) holding the generation scripts.
pub const DEFAULT_SCRIPTS_DIR: &str = "Scripts";

/// Script invoked for generation, relative to the scripts dir.
pub const DEFAULT_GENERATION_SCRIPT: &str = "batch_hunyuan3d.py";

/// Image preprocessing script that strips backgrounds before generation.
pub const DEFAULT_BACKGROUND_SCRIPT: &str = "remove_background.py";

/// What the orchestrator does when a required group reports an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Abort the remaining steps and report `Failed`.
    #[default]
    FailFast,
    /// Keep going and let the final verification decide.
    BestEffort,
}

impl std::str::FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fail-fast" | "failfast" => Ok(Self::FailFast),
            "best-effort" | "besteffort" => Ok(Self::BestEffort),
            other => Err(format!(
                "unknown failure policy '{other}' (expected fail-fast or best-effort)"
            )),
        }
    }
}

/// Application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Interpreter tried before any discovered one.
    pub interpreter: Option<PathBuf>,

    /// Root holding the virtual environment, scripts and repository checkout.
    pub project_root: Option<PathBuf>,

    /// Generator repository checkout.
    pub repo_dir: Option<PathBuf>,

    pub repo_url: Option<String>,

    pub scripts_dir: Option<PathBuf>,

    /// Default output directory for generation.
    pub output_dir: Option<PathBuf>,

    pub installation_mode: InstallationMode,

    /// Use `uv` instead of `pip` when both are available.
    pub prefer_uv: bool,

    pub failure_policy: FailurePolicy,

    pub generation: GenerationParams,
}

/// Keys accepted by [`Settings::set`].
pub const SETTING_KEYS: &[&str] = &[
    "interpreter",
    "project_root",
    "repo_dir",
    "repo_url",
    "scripts_dir",
    "output_dir",
    "installation_mode",
    "prefer_uv",
    "failure_policy",
    "steps",
    "guidance_scale",
    "seed",
    "octree_resolution",
    "file_type",
    "low_vram_mode",
];

impl Settings {
    /// Load from `path`. A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            debug!(path = %path.display(), "No settings file, using defaults");
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path).map_err(|e| SettingsError::Io {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let settings: Self = serde_json::from_str(&raw).map_err(|e| SettingsError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Write to `path`, creating the parent directory.
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        self.validate()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| SettingsError::Io {
                path: parent.to_path_buf(),
                reason: e.to_string(),
            })?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| SettingsError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        fs::write(path, json).map_err(|e| SettingsError::Io {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Set one value from its string form. On error `self` is left untouched.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), SettingsError> {
        let mut next = self.clone();
        next.apply(key, value)?;
        next.validate()?;
        *self = next;
        Ok(())
    }

    fn apply(&mut self, key: &str, value: &str) -> Result<(), SettingsError> {
        let invalid = |reason: String| SettingsError::InvalidValue {
            key: key.to_string(),
            reason,
        };
        let path = |v: &str| normalize_user_path(v).map_err(|e| invalid(e.to_string()));

        match key {
            "interpreter" => self.interpreter = Some(path(value)?),
            "project_root" => self.project_root = Some(path(value)?),
            "repo_dir" => self.repo_dir = Some(path(value)?),
            "repo_url" => self.repo_url = Some(value.trim().to_string()),
            "scripts_dir" => self.scripts_dir = Some(path(value)?),
            "output_dir" => self.output_dir = Some(path(value)?),
            "installation_mode" | "mode" => {
                self.installation_mode = value.parse().map_err(invalid)?;
            }
            "prefer_uv" => self.prefer_uv = parse_bool(value).map_err(invalid)?,
            "failure_policy" => self.failure_policy = value.parse().map_err(invalid)?,
            "steps" => {
                self.generation.steps = value.trim().parse().map_err(|e| invalid(format!("{e}")))?;
            }
            "guidance_scale" => {
                self.generation.guidance_scale =
                    value.trim().parse().map_err(|e| invalid(format!("{e}")))?;
            }
            "seed" => {
                self.generation.seed = value.trim().parse().map_err(|e| invalid(format!("{e}")))?;
            }
            "octree_resolution" => {
                self.generation.octree_resolution =
                    value.trim().parse().map_err(|e| invalid(format!("{e}")))?;
            }
            "file_type" => {
                self.generation.file_type = value.parse::<MeshFormat>().map_err(invalid)?;
            }
            "low_vram_mode" => {
                self.generation.low_vram_mode = parse_bool(value).map_err(invalid)?;
            }
            _ => return Err(SettingsError::UnknownKey(key.to_string())),
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        let g = &self.generation;
        if !(1..=500).contains(&g.steps) {
            return Err(SettingsError::InvalidValue {
                key: "steps".to_string(),
                reason: format!("must be between 1 and 500, got {}", g.steps),
            });
        }
        if !g.guidance_scale.is_finite() || g.guidance_scale <= 0.0 {
            return Err(SettingsError::InvalidValue {
                key: "guidance_scale".to_string(),
                reason: format!("must be positive, got {}", g.guidance_scale),
            });
        }
        if !(16..=1024).contains(&g.octree_resolution) {
            return Err(SettingsError::InvalidValue {
                key: "octree_resolution".to_string(),
                reason: format!("must be between 16 and 1024, got {}", g.octree_resolution),
            });
        }
        if let Some(url) = &self.repo_url {
            if url.trim().is_empty() {
                return Err(SettingsError::InvalidValue {
                    key: "repo_url".to_string(),
                    reason: "cannot be empty".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Project root, falling back to `fallback` (normally the current dir).
    pub fn effective_project_root(&self, fallback: &Path) -> PathBuf {
        self.project_root
            .clone()
            .unwrap_or_else(|| fallback.to_path_buf())
    }

    pub fn effective_repo_dir(&self, project_root: &Path) -> PathBuf {
        self.repo_dir
            .clone()
            .unwrap_or_else(|| default_repo_dir(project_root))
    }

    pub fn effective_repo_url(&self) -> &str {
        self.repo_url.as_deref().unwrap_or(DEFAULT_REPO_URL)
    }

    pub fn effective_scripts_dir(&self, project_root: &Path) -> PathBuf {
        self.scripts_dir
            .clone()
            .unwrap_or_else(|| project_root.join(DEFAULT_SCRIPTS_DIR))
    }
}

fn parse_bool(value: &str) -> Result<bool, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(format!("expected true or false, got '{other}'")),
    }
}

/// Settings load, save and validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SettingsError {
    #[error("Unknown setting '{0}'")]
    UnknownKey(String),

    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Failed to access settings file {path}: {reason}")]
    Io { path: PathBuf, reason: String },

    #[error("Malformed settings file {path}: {reason}")]
    Parse { path: PathBuf, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let settings = Settings::load(&dir.path().join("settings.json")).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.failure_policy, FailurePolicy::FailFast);
        assert_eq!(settings.installation_mode, InstallationMode::Auto);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/settings.json");
        let mut settings = Settings::default();
        settings.set("installation_mode", "cuda12").unwrap();
        settings.set("prefer_uv", "yes").unwrap();
        settings.set("failure_policy", "best-effort").unwrap();
        settings.set("steps", "50").unwrap();
        settings.save(&path).unwrap();

        let loaded = Settings::load(&path).unwrap();
        assert_eq!(loaded.installation_mode, InstallationMode::Cuda12);
        assert!(loaded.prefer_uv);
        assert_eq!(loaded.failure_policy, FailurePolicy::BestEffort);
        assert_eq!(loaded.generation.steps, 50);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"prefer_uv": true}"#).unwrap();
        let loaded = Settings::load(&path).unwrap();
        assert!(loaded.prefer_uv);
        assert_eq!(loaded.generation.steps, 30);
    }

    #[test]
    fn test_set_rejects_bad_values() {
        let mut settings = Settings::default();
        assert!(matches!(
            settings.set("nope", "1"),
            Err(SettingsError::UnknownKey(_))
        ));
        assert!(matches!(
            settings.set("installation_mode", "rocm"),
            Err(SettingsError::InvalidValue { .. })
        ));
        assert!(matches!(
            settings.set("steps", "0"),
            Err(SettingsError::InvalidValue { .. })
        ));
        assert_eq!(settings.generation.steps, 30);
    }

    #[test]
    fn test_effective_paths() {
        let settings = Settings::default();
        let root = Path::new("/proj");
        assert_eq!(settings.effective_repo_dir(root), root.join("Hunyuan3D-2"));
        assert_eq!(settings.effective_scripts_dir(root), root.join("Scripts"));
        assert_eq!(settings.effective_repo_url(), DEFAULT_REPO_URL);
    }
}
