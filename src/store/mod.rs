//! Artifact storage
//!
//! Every document owns a directory `<base>/<id>/reproducibility/` holding the
//! bundle produced by the pipeline stages, plus the downloadable package zip
//! at `<base>/<id>/reproducibility_package.zip`. All filesystem side effects
//! of the pipeline go through [`ArtifactStore`]:
//!
//! - reads never fail (missing or unreadable files read as empty)
//! - artifacts are published with write-to-temp-then-rename
//! - per-run scratch space is handed out as a scoped [`Workspace`]

pub mod layout;
pub mod package;
pub mod workspace;

pub use package::{find_html_file, is_packaged, write_package};
pub use workspace::Workspace;

use crate::document::DocumentId;
use layout::*;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("Archive error: {0}")]
    Archive(String),
}

impl StoreError {
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        StoreError::Io {
            context: context.into(),
            source,
        }
    }
}

/// Snapshot of which artifacts currently exist for a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactBundle {
    pub document_id: DocumentId,
    pub dir: PathBuf,
    pub source: Option<PathBuf>,
    pub local_render: Option<PathBuf>,
    pub container_render: Option<PathBuf>,
    pub semantic_diff: Option<PathBuf>,
    pub dockerfile: Option<PathBuf>,
    pub makefile: Option<PathBuf>,
    pub manifest: Option<PathBuf>,
    pub access_archive: Option<PathBuf>,
    pub package: Option<PathBuf>,
    pub content_hash: Option<String>,
}

impl ArtifactBundle {
    /// Both renders exist, so a semantic diff can be produced
    pub fn is_diffable(&self) -> bool {
        self.local_render.is_some() && self.container_render.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    base_dir: PathBuf,
    scratch_dir: Option<PathBuf>,
}

impl ArtifactStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            scratch_dir: None,
        }
    }

    /// Create workspaces under `dir` instead of the system temp dir
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn document_root(&self, id: &DocumentId) -> PathBuf {
        self.base_dir.join(id.as_str())
    }

    /// Artifact directory path, without creating it
    pub fn artifact_dir_path(&self, id: &DocumentId) -> PathBuf {
        self.document_root(id).join(ARTIFACT_SUBDIR)
    }

    /// Artifact directory, created on first use
    pub fn artifact_dir(&self, id: &DocumentId) -> Result<PathBuf, StoreError> {
        let dir = self.artifact_dir_path(id);
        fs::create_dir_all(&dir)
            .map_err(|e| StoreError::io(format!("create {}", dir.display()), e))?;
        Ok(dir)
    }

    pub fn artifact_path(&self, id: &DocumentId, name: &str) -> PathBuf {
        self.artifact_dir_path(id).join(name)
    }

    pub fn package_path(&self, id: &DocumentId) -> PathBuf {
        self.document_root(id).join(PACKAGE_ZIP_FILE)
    }

    pub fn has_artifact(&self, id: &DocumentId, name: &str) -> bool {
        self.artifact_path(id, name).is_file()
    }

    /// Fresh scoped workspace for one stage run
    pub fn workspace(&self, label: &str) -> Result<Workspace, StoreError> {
        Workspace::create(self.scratch_dir.as_deref(), label)
    }

    /// Read a text file, returning an empty string when absent or unreadable
    pub fn read_text(dir: &Path, name: &str) -> String {
        let path = dir.join(name);
        match fs::read(&path) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read file");
                String::new()
            }
        }
    }

    /// Read a JSON file, returning an empty object when absent or invalid
    pub fn read_json(dir: &Path, name: &str) -> serde_json::Value {
        let text = Self::read_text(dir, name);
        if text.trim().is_empty() {
            return serde_json::Value::Object(Default::default());
        }
        serde_json::from_str(&text).unwrap_or_else(|e| {
            warn!(file = name, error = %e, "Ignoring malformed JSON");
            serde_json::Value::Object(Default::default())
        })
    }

    /// Write a text file, creating the directory when needed
    pub fn write_text(dir: &Path, name: &str, content: &str) -> Result<PathBuf, StoreError> {
        fs::create_dir_all(dir)
            .map_err(|e| StoreError::io(format!("create {}", dir.display()), e))?;
        let path = dir.join(name);
        fs::write(&path, content)
            .map_err(|e| StoreError::io(format!("write {}", path.display()), e))?;
        Ok(path)
    }

    pub fn read_artifact(&self, id: &DocumentId, name: &str) -> String {
        Self::read_text(&self.artifact_dir_path(id), name)
    }

    /// Publish bytes as a named artifact
    pub fn publish_bytes(
        &self,
        id: &DocumentId,
        name: &str,
        bytes: &[u8],
    ) -> Result<PathBuf, StoreError> {
        let target = self.artifact_dir(id)?.join(name);
        atomic_write(&target, |tmp| fs::write(tmp, bytes).map(|_| ()))?;
        debug!(document = %id, artifact = name, "Published artifact");
        Ok(target)
    }

    /// Publish a copy of `source` as a named artifact
    pub fn publish_file(
        &self,
        id: &DocumentId,
        source: &Path,
        name: &str,
    ) -> Result<PathBuf, StoreError> {
        let target = self.artifact_dir(id)?.join(name);
        atomic_write(&target, |tmp| fs::copy(source, tmp).map(|_| ()))?;
        debug!(document = %id, artifact = name, from = %source.display(), "Published artifact");
        Ok(target)
    }

    /// Copy a whole tool output tree into the artifact directory
    ///
    /// Existing files are overwritten, each one atomically. Returns the
    /// number of files copied.
    pub fn import_tree(&self, id: &DocumentId, source_dir: &Path) -> Result<usize, StoreError> {
        let dest_dir = self.artifact_dir(id)?;
        let mut copied = 0;

        for entry in WalkDir::new(source_dir).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                let context = format!("walk {}", source_dir.display());
                match e.into_io_error() {
                    Some(io_err) => StoreError::io(context, io_err),
                    None => StoreError::io(
                        context,
                        io::Error::new(io::ErrorKind::Other, "filesystem loop"),
                    ),
                }
            })?;
            let relative = match entry.path().strip_prefix(source_dir) {
                Ok(rel) if !rel.as_os_str().is_empty() => rel.to_path_buf(),
                _ => continue,
            };
            let target = dest_dir.join(&relative);

            if entry.file_type().is_dir() {
                fs::create_dir_all(&target)
                    .map_err(|e| StoreError::io(format!("create {}", target.display()), e))?;
            } else if entry.file_type().is_file() {
                atomic_write(&target, |tmp| fs::copy(entry.path(), tmp).map(|_| ()))?;
                copied += 1;
            }
        }

        debug!(document = %id, files = copied, "Imported output tree");
        Ok(copied)
    }

    /// Build the downloadable zip for a document
    pub fn create_package(&self, id: &DocumentId) -> Result<PathBuf, StoreError> {
        let source = self.artifact_dir(id)?;
        let zip_path = self.package_path(id);
        let count = write_package(&source, &zip_path)?;
        debug!(document = %id, files = count, zip = %zip_path.display(), "Package written");
        Ok(zip_path)
    }

    /// Stored content digest, if any
    pub fn read_content_hash(&self, id: &DocumentId) -> Option<String> {
        let hash = self.read_artifact(id, CONTENT_HASH_FILE);
        let hash = hash.trim();
        (!hash.is_empty()).then(|| hash.to_string())
    }

    pub fn write_content_hash(&self, id: &DocumentId, digest: &str) -> Result<(), StoreError> {
        self.publish_bytes(id, CONTENT_HASH_FILE, digest.as_bytes())
            .map(|_| ())
    }

    /// Remove the marker; absent is fine
    pub fn clear_content_hash(&self, id: &DocumentId) -> Result<(), StoreError> {
        let path = self.artifact_path(id, CONTENT_HASH_FILE);
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(document = %id, "Cleared content hash");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(format!("remove {}", path.display()), e)),
        }
    }

    /// Current state of a document's bundle
    pub fn bundle(&self, id: &DocumentId) -> ArtifactBundle {
        let existing = |name: &str| {
            let path = self.artifact_path(id, name);
            path.is_file().then_some(path)
        };
        let package = self.package_path(id);

        ArtifactBundle {
            document_id: id.clone(),
            dir: self.artifact_dir_path(id),
            source: existing(SOURCE_FILE),
            local_render: existing(LOCAL_RENDER_FILE),
            container_render: existing(CONTAINER_RENDER_FILE),
            semantic_diff: existing(SEMANTIC_DIFF_FILE),
            dockerfile: existing(DOCKERFILE),
            makefile: existing(MAKEFILE),
            manifest: existing(MANIFEST_FILE),
            access_archive: existing(ACCESS_ARCHIVE_FILE),
            package: package.is_file().then_some(package),
            content_hash: self.read_content_hash(id),
        }
    }
}

/// Produce `target` through a hidden sibling temp file and a rename
fn atomic_write<F>(target: &Path, write: F) -> Result<(), StoreError>
where
    F: FnOnce(&Path) -> io::Result<()>,
{
    let parent = target.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)
        .map_err(|e| StoreError::io(format!("create {}", parent.display()), e))?;

    let file_name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = parent.join(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()));

    let result = write(&tmp).and_then(|_| fs::rename(&tmp, target));
    if let Err(e) = result {
        let _ = fs::remove_file(&tmp);
        return Err(StoreError::io(format!("publish {}", target.display()), e));
    }
    Ok(())
}
