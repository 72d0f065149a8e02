//! `PYTHONPATH` assembly for generator and verification processes.

use std::env;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

/// Join candidate directories into a `PYTHONPATH` value.
///
/// Order is scripts dir, repository root, project root, then the entries of
/// the inherited `PYTHONPATH`. Duplicates are dropped, first occurrence
/// wins. Returns `None` when there is nothing to set.
pub fn build_pythonpath(
    scripts_dir: Option<&Path>,
    repo_root: Option<&Path>,
    project_root: Option<&Path>,
    existing: Option<&OsStr>,
) -> Option<String> {
    let mut entries: Vec<PathBuf> = Vec::with_capacity(4);
    let mut push = |p: PathBuf| {
        if !p.as_os_str().is_empty() && !entries.contains(&p) {
            entries.push(p);
        }
    };

    for dir in [scripts_dir, repo_root, project_root].into_iter().flatten() {
        push(dir.to_path_buf());
    }
    if let Some(existing) = existing {
        for p in env::split_paths(existing) {
            push(p);
        }
    }

    if entries.is_empty() {
        return None;
    }
    env::join_paths(&entries)
        .ok()
        .map(|joined| joined.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_and_dedup() {
        let existing = env::join_paths(["/proj", "/site"]).unwrap();
        let value = build_pythonpath(
            Some(Path::new("/proj/Scripts")),
            Some(Path::new("/proj/Hunyuan3D-2")),
            Some(Path::new("/proj")),
            Some(&existing),
        )
        .unwrap();
        let parts: Vec<PathBuf> = env::split_paths(&value).collect();
        assert_eq!(
            parts,
            vec![
                PathBuf::from("/proj/Scripts"),
                PathBuf::from("/proj/Hunyuan3D-2"),
                PathBuf::from("/proj"),
                PathBuf::from("/site"),
            ]
        );
    }

    #[test]
    fn test_nothing_to_set() {
        assert_eq!(build_pythonpath(None, None, None, None), None);
    }
}
