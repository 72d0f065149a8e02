//! Platform-specific path resolution.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use super::error::PathError;

/// Environment variable overriding the config root.
pub const CONFIG_DIR_ENV: &str = "FORGE3D_CONFIG_DIR";

/// Directory name of the generator repository under the project root.
pub const REPO_DIR_NAME: &str = "Hunyuan3D-2";

const SETTINGS_FILE: &str = "settings.json";

/// Resolve the config root from an optional override.
///
/// Resolution order:
/// 1. the override (normally `FORGE3D_CONFIG_DIR`)
/// 2. the platform config directory (e.g. `~/.config/forge3d`)
pub fn config_root_from(override_dir: Option<&str>) -> Result<PathBuf, PathError> {
    if let Some(dir) = override_dir.filter(|d| !d.trim().is_empty()) {
        return normalize_user_path(dir);
    }
    let base = dirs::config_dir().ok_or(PathError::NoConfigDir)?;
    Ok(base.join("forge3d"))
}

/// Config root honoring `FORGE3D_CONFIG_DIR`.
pub fn config_root() -> Result<PathBuf, PathError> {
    config_root_from(env::var(CONFIG_DIR_ENV).ok().as_deref())
}

/// Location of the persisted settings record.
pub fn settings_path() -> Result<PathBuf, PathError> {
    Ok(config_root()?.join(SETTINGS_FILE))
}

/// Project root used when no setting names one: the current directory.
pub fn default_project_root() -> Result<PathBuf, PathError> {
    env::current_dir().map_err(|e| PathError::CurrentDirError(e.to_string()))
}

/// Default checkout location of the generator repository.
pub fn default_repo_dir(project_root: &Path) -> PathBuf {
    project_root.join(REPO_DIR_NAME)
}

/// Create a directory (and parents) if missing; reject non-directories.
pub fn ensure_directory(path: &Path) -> Result<(), PathError> {
    if path.exists() {
        if !path.is_dir() {
            return Err(PathError::NotADirectory(path.to_path_buf()));
        }
        return Ok(());
    }
    fs::create_dir_all(path).map_err(|e| PathError::CreateFailed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Normalize a user-provided path, expanding `~` and making it absolute.
pub fn normalize_user_path(raw: &str) -> Result<PathBuf, PathError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(PathError::EmptyPath);
    }

    let expanded = if trimmed.starts_with("~/") || trimmed == "~" {
        let home = dirs::home_dir().ok_or(PathError::NoHomeDir)?;
        if trimmed == "~" {
            home
        } else {
            home.join(trimmed.trim_start_matches("~/"))
        }
    } else {
        PathBuf::from(trimmed)
    };

    if expanded.is_absolute() {
        Ok(expanded)
    } else {
        env::current_dir()
            .map(|cwd| cwd.join(expanded))
            .map_err(|e| PathError::CurrentDirError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_override_wins() {
        let dir = tempdir().unwrap();
        let root = config_root_from(dir.path().to_str()).unwrap();
        assert_eq!(root, dir.path());
    }

    #[test]
    fn test_blank_override_ignored() {
        if let Ok(root) = config_root_from(Some("  ")) {
            assert!(root.ends_with("forge3d"));
        }
    }

    #[test]
    fn test_normalize_rejects_empty() {
        assert!(matches!(normalize_user_path(""), Err(PathError::EmptyPath)));
    }

    #[test]
    fn test_normalize_relative_is_absolute() {
        let path = normalize_user_path("some/dir").unwrap();
        assert!(path.is_absolute());
        assert!(path.ends_with("some/dir"));
    }

    #[test]
    fn test_ensure_directory() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a/b");
        ensure_directory(&nested).unwrap();
        assert!(nested.is_dir());

        let file = dir.path().join("f");
        fs::write(&file, "x").unwrap();
        assert!(matches!(
            ensure_directory(&file),
            Err(PathError::NotADirectory(_))
        ));
    }

    #[test]
    fn test_default_repo_dir() {
        assert_eq!(
            default_repo_dir(Path::new("/proj")),
            PathBuf::from("/proj/Hunyuan3D-2")
        );
    }
}
