//! Ephemeral per-run working directories
//!
//! Every stage run gets its own directory, removed when the [`Workspace`] is
//! dropped. Early returns and panics release it the same way a normal exit
//! does.

use super::StoreError;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
    path: PathBuf,
}

impl Workspace {
    /// Create a fresh workspace under `root` (or the system temp dir)
    pub fn create(root: Option<&Path>, label: &str) -> Result<Self, StoreError> {
        let prefix = format!("repropack-{}-", label);
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix);

        let dir = match root {
            Some(root) => {
                fs::create_dir_all(root).map_err(|e| {
                    StoreError::io(format!("create scratch root {}", root.display()), e)
                })?;
                builder.tempdir_in(root)
            }
            None => builder.tempdir(),
        }
        .map_err(|e| StoreError::io("create workspace", e))?;

        // Tools run with this as cwd and receive absolute paths into it
        let path = dir
            .path()
            .canonicalize()
            .map_err(|e| StoreError::io("resolve workspace path", e))?;

        debug!(workspace = %path.display(), "Created workspace");
        Ok(Self { dir, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn join(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    pub fn write_file(&self, name: &str, content: &str) -> Result<PathBuf, StoreError> {
        let path = self.join(name);
        fs::write(&path, content)
            .map_err(|e| StoreError::io(format!("write {}", path.display()), e))?;
        Ok(path)
    }

    pub fn copy_in(&self, source: &Path, name: &str) -> Result<PathBuf, StoreError> {
        let path = self.join(name);
        fs::copy(source, &path).map_err(|e| {
            StoreError::io(
                format!("copy {} into workspace", source.display()),
                e,
            )
        })?;
        Ok(path)
    }

    /// Remove the workspace now, reporting failures instead of ignoring them
    pub fn close(self) -> Result<(), StoreError> {
        let Self { dir, path } = self;
        dir.close()
            .map_err(|e| StoreError::io(format!("remove workspace {}", path.display()), e))
    }
}
