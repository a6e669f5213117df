//! Per-document build serialization
//!
//! Two layers: an async mutex per document inside the process, and an
//! exclusive `flock` on `<root>/<id>/.build.lock` across processes. The lock
//! file sits next to the artifact directory, so it never ends up in the zip.

use crate::document::DocumentId;
use crate::store::layout::BUILD_LOCK_FILE;
use crate::store::StoreError;
use fs2::FileExt;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

/// Hands out one lock per document
///
/// Builds of different documents proceed in parallel; builds of the same
/// document queue behind each other. Entries nobody holds or waits on are
/// pruned on the next acquire.
#[derive(Debug, Default)]
pub struct DocumentLocks {
    locks: Mutex<HashMap<DocumentId, Arc<AsyncMutex<()>>>>,
    lock_root: Option<PathBuf>,
}

/// Exclusive access to one document; released on drop
#[derive(Debug)]
pub struct DocumentGuard {
    // Declared first so the file lock goes before the in-process one
    _file: Option<FileLock>,
    _guard: OwnedMutexGuard<()>,
}

#[derive(Debug)]
struct FileLock {
    file: File,
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

impl DocumentLocks {
    /// In-process locking only
    pub fn new() -> Self {
        Self::default()
    }

    /// Also lock `<root>/<id>/.build.lock`, excluding other processes
    pub fn with_lock_root(root: impl Into<PathBuf>) -> Self {
        Self {
            locks: Mutex::default(),
            lock_root: Some(root.into()),
        }
    }

    /// Wait for exclusive access to `id`
    pub async fn acquire(&self, id: &DocumentId) -> Result<DocumentGuard, StoreError> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(id.clone()).or_default().clone()
        };
        let guard = lock.lock_owned().await;

        let file = match &self.lock_root {
            Some(root) => {
                let path = root.join(id.as_str()).join(BUILD_LOCK_FILE);
                Some(lock_file(path).await?)
            }
            None => None,
        };

        Ok(DocumentGuard {
            _file: file,
            _guard: guard,
        })
    }

    /// Number of documents with a live lock entry
    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

async fn lock_file(path: PathBuf) -> Result<FileLock, StoreError> {
    let context = format!("lock {}", path.display());
    tokio::task::spawn_blocking(move || open_locked(&path))
        .await
        .map_err(|e| StoreError::io(context, io::Error::new(io::ErrorKind::Other, e.to_string())))?
}

fn open_locked(path: &Path) -> Result<FileLock, StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| StoreError::io(format!("create {}", parent.display()), e))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(path)
        .map_err(|e| StoreError::io(format!("open {}", path.display()), e))?;

    let start = Instant::now();
    file.lock_exclusive()
        .map_err(|e| StoreError::io(format!("lock {}", path.display()), e))?;
    debug!(
        lock = %path.display(),
        wait_ms = start.elapsed().as_millis() as u64,
        "Acquired build lock"
    );
    Ok(FileLock { file })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_document_is_serialized() {
        let locks = Arc::new(DocumentLocks::new());
        let active = Arc::new(AtomicUsize::new(0));
        let max_active = Arc::new(AtomicUsize::new(0));
        let id = DocumentId::from(1u64);

        let mut handles = Vec::new();
        for _ in 0..4 {
            let (locks, active, max_active, id) =
                (locks.clone(), active.clone(), max_active.clone(), id.clone());
            handles.push(tokio::spawn(async move {
                let _guard = locks.acquire(&id).await.unwrap();
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                max_active.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(max_active.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_different_documents_do_not_block() {
        let locks = DocumentLocks::new();
        let _a = locks.acquire(&DocumentId::from(1u64)).await.unwrap();
        let b = tokio::time::timeout(
            Duration::from_millis(200),
            locks.acquire(&DocumentId::from(2u64)),
        )
        .await;
        assert!(matches!(b, Ok(Ok(_))));
    }

    #[tokio::test]
    async fn test_released_entries_are_pruned() {
        let locks = DocumentLocks::new();
        {
            let _guard = locks.acquire(&DocumentId::from(1u64)).await.unwrap();
            assert_eq!(locks.len(), 1);
        }
        let _other = locks.acquire(&DocumentId::from(2u64)).await.unwrap();
        assert_eq!(locks.len(), 1);
    }

    #[tokio::test]
    async fn test_file_lock_excludes_separate_instances() {
        let dir = tempfile::TempDir::new().unwrap();
        // Two instances stand in for two processes sharing a storage root
        let first = DocumentLocks::with_lock_root(dir.path());
        let second = DocumentLocks::with_lock_root(dir.path());
        let id = DocumentId::from(42u64);

        let held = first.acquire(&id).await.unwrap();
        assert!(dir.path().join("42").join(BUILD_LOCK_FILE).is_file());

        let blocked = tokio::time::timeout(Duration::from_millis(200), second.acquire(&id)).await;
        assert!(blocked.is_err());

        drop(held);
        let acquired = tokio::time::timeout(Duration::from_secs(5), second.acquire(&id)).await;
        assert!(matches!(acquired, Ok(Ok(_))));
    }

    #[tokio::test]
    async fn test_file_lock_per_document() {
        let dir = tempfile::TempDir::new().unwrap();
        let first = DocumentLocks::with_lock_root(dir.path());
        let second = DocumentLocks::with_lock_root(dir.path());

        let _a = first.acquire(&DocumentId::from(1u64)).await.unwrap();
        let b = tokio::time::timeout(
            Duration::from_millis(500),
            second.acquire(&DocumentId::from(2u64)),
        )
        .await;
        assert!(matches!(b, Ok(Ok(_))));
    }
}
