//! Generator repository checkout.

use std::path::Path;

use forge3d_core::{CLONE_TIMEOUT, CommandRunner, CommandSpec};
use tracing::{debug, info};

use super::OrchestrationError;
use crate::session::OrchestrationSession;

/// Importable package provided by the repository.
pub const TARGET_PACKAGE: &str = "hy3dgen";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoState {
    Present,
    Cloned,
}

/// A directory that looks like a checkout of the generator repository.
pub fn repository_present(dir: &Path) -> bool {
    dir.join("setup.py").is_file() || dir.join(TARGET_PACKAGE).is_dir()
}

fn is_empty_dir(dir: &Path) -> bool {
    std::fs::read_dir(dir).is_ok_and(|mut entries| entries.next().is_none())
}

/// Clone the repository into `dir` unless a checkout is already there.
pub async fn ensure_repository(
    runner: &dyn CommandRunner,
    session: &OrchestrationSession,
    dir: &Path,
    url: &str,
) -> Result<RepoState, OrchestrationError> {
    if repository_present(dir) {
        debug!(repo = %dir.display(), "Generator repository present");
        return Ok(RepoState::Present);
    }
    if dir.exists() && !is_empty_dir(dir) {
        return Err(OrchestrationError::RepositoryUnavailable(format!(
            "{} exists but is not a checkout of {url}",
            dir.display()
        )));
    }
    if let Some(parent) = dir.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            OrchestrationError::RepositoryUnavailable(format!(
                "cannot create {}: {e}",
                parent.display()
            ))
        })?;
    }

    info!(%url, repo = %dir.display(), "Cloning generator repository");
    session.log_info(format!("Cloning {url}"));
    let dest = dir.to_string_lossy().into_owned();
    let spec = CommandSpec::new("git")
        .args(["clone", "--depth", "1", url, dest.as_str()])
        .timeout(CLONE_TIMEOUT)
        .label("git clone");
    let result = runner.run(&spec, session.cancel_token()).await?;

    if result.timed_out {
        return Err(OrchestrationError::RepositoryUnavailable(format!(
            "clone did not finish within {} minutes",
            CLONE_TIMEOUT.as_secs() / 60
        )));
    }
    if !result.success() || !repository_present(dir) {
        return Err(OrchestrationError::RepositoryUnavailable(format!(
            "clone failed: {}",
            result.tail(3).trim()
        )));
    }
    session.log_info(format!("Cloned into {}", dir.display()));
    Ok(RepoState::Cloned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_repository_present() {
        let dir = tempdir().unwrap();
        assert!(!repository_present(dir.path()));
        std::fs::create_dir(dir.path().join(TARGET_PACKAGE)).unwrap();
        assert!(repository_present(dir.path()));
    }

    #[test]
    fn test_empty_dir() {
        let dir = tempdir().unwrap();
        assert!(is_empty_dir(dir.path()));
        std::fs::write(dir.path().join("x"), "").unwrap();
        assert!(!is_empty_dir(dir.path()));
        assert!(!is_empty_dir(&dir.path().join("missing")));
    }
}
