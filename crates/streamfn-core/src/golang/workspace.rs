//! Isolated build workspaces.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Prefix of every workspace directory name.
pub const WORKSPACE_PREFIX: &str = "streamfn_";

/// File name of the finalized program inside a workspace.
pub const SOURCE_FILE: &str = "app.go";

/// A uniquely named temporary directory owned by one backend instance.
///
/// The directory outlives this value; it is only removed through a
/// [`CleanupGuard`].
#[derive(Debug, Clone)]
pub struct Workspace {
    dir: PathBuf,
}

impl Workspace {
    /// Allocate a fresh directory under `parent`.
    pub fn create_in(parent: impl AsRef<Path>) -> Result<Self> {
        let parent = parent.as_ref();
        let dir = tempfile::Builder::new()
            .prefix(WORKSPACE_PREFIX)
            .tempdir_in(parent)
            .map_err(|e| {
                Error::workspace(
                    format!("failed to create workspace in {}", parent.display()),
                    e,
                )
            })?
            .keep();

        tracing::debug!("created workspace {}", dir.display());
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Where the finalized program lives.
    pub fn source_path(&self) -> PathBuf {
        self.dir.join(SOURCE_FILE)
    }

    /// Write the finalized program and return its path.
    pub fn write_source(&self, code: &str) -> Result<PathBuf> {
        let path = self.source_path();
        fs::write(&path, code)
            .map_err(|e| Error::workspace(format!("write file {}", path.display()), e))?;
        Ok(path)
    }

    /// Guard that deletes the workspace when dropped.
    pub fn cleanup_guard(&self) -> CleanupGuard {
        CleanupGuard {
            dir: self.dir.clone(),
        }
    }
}

/// Removes a workspace directory on drop, whatever path control flow takes.
///
/// Removal is best effort: failures are logged, not returned.
#[derive(Debug)]
pub struct CleanupGuard {
    dir: PathBuf,
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        match fs::remove_dir_all(&self.dir) {
            Ok(()) => tracing::debug!("removed workspace {}", self.dir.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("failed to remove workspace {}: {}", self.dir.display(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_workspaces_are_unique() {
        let temp = TempDir::new().unwrap();
        let a = Workspace::create_in(temp.path()).unwrap();
        let b = Workspace::create_in(temp.path()).unwrap();

        assert_ne!(a.dir(), b.dir());
        assert!(a.dir().is_dir());
        assert!(b.dir().is_dir());
        assert!(a
            .dir()
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with(WORKSPACE_PREFIX));
    }

    #[test]
    fn test_workspace_survives_drop() {
        let temp = TempDir::new().unwrap();
        let dir = {
            let ws = Workspace::create_in(temp.path()).unwrap();
            ws.dir().to_path_buf()
        };
        assert!(dir.is_dir());
    }

    #[test]
    fn test_write_source() {
        let temp = TempDir::new().unwrap();
        let ws = Workspace::create_in(temp.path()).unwrap();
        let path = ws.write_source("package main\n").unwrap();

        assert_eq!(path, ws.dir().join("app.go"));
        assert_eq!(fs::read_to_string(path).unwrap(), "package main\n");
    }

    #[test]
    fn test_cleanup_guard_removes_directory() {
        let temp = TempDir::new().unwrap();
        let ws = Workspace::create_in(temp.path()).unwrap();
        ws.write_source("package main\n").unwrap();

        drop(ws.cleanup_guard());
        assert!(!ws.dir().exists());

        // A second guard on a removed directory is a no-op.
        drop(ws.cleanup_guard());
    }

    #[test]
    fn test_create_in_missing_parent_fails() {
        let temp = TempDir::new().unwrap();
        let err = Workspace::create_in(temp.path().join("missing")).unwrap_err();
        assert!(matches!(err, Error::Workspace { .. }));
    }
}
