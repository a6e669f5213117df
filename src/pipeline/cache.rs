//! Content-hash gated render + trace
//!
//! A document is rebuilt only when its content digest differs from the
//! marker left by the last complete build, or when the local render has
//! gone missing. The marker is written after both stages succeed and at no
//! other time. Running render or trace on its own removes it.

use super::locks::{DocumentGuard, DocumentLocks};
use super::render::{RenderOutput, RenderStage};
use super::stage::{Stage, StageError, StageResult};
use super::trace::{TraceOutput, TraceStage};
use crate::document::DocumentId;
use crate::progress::{NoOpHandler, ProgressEvent, ProgressHandler};
use crate::store::layout::{LOCAL_RENDER_FILE, SOURCE_FILE};
use crate::store::{ArtifactBundle, ArtifactStore};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Hex SHA-256 of the full document content
pub fn content_digest(content: &str) -> String {
    content_digest_bytes(content.as_bytes())
}

fn content_digest_bytes(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Result of one `build` call
#[derive(Debug, Clone, Serialize)]
pub struct BuildOutcome {
    pub bundle: ArtifactBundle,
    /// True when the stored artifacts were reused and no tool ran
    pub cached: bool,
    pub content_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub render: Option<StageResult<RenderOutput>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<StageResult<TraceOutput>>,
}

impl BuildOutcome {
    pub fn success(&self) -> bool {
        self.cached || (self.failure().is_none() && self.trace.is_some())
    }

    /// The failing stage and its error, if any
    pub fn failure(&self) -> Option<(Stage, &StageError)> {
        let render = self
            .render
            .as_ref()
            .and_then(|r| r.error().map(|e| (r.stage, e)));
        let trace = self
            .trace
            .as_ref()
            .and_then(|t| t.error().map(|e| (t.stage, e)));
        render.or(trace)
    }
}

pub struct BuildCache {
    store: ArtifactStore,
    render: RenderStage,
    trace: TraceStage,
    locks: DocumentLocks,
    progress: Arc<dyn ProgressHandler>,
}

impl BuildCache {
    pub fn new(store: ArtifactStore, render: RenderStage, trace: TraceStage) -> Self {
        let locks = DocumentLocks::with_lock_root(store.base_dir());
        Self {
            store,
            render,
            trace,
            locks,
            progress: Arc::new(NoOpHandler),
        }
    }

    pub fn with_progress(mut self, handler: Arc<dyn ProgressHandler>) -> Self {
        self.progress = handler;
        self
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Whether the stored artifacts already correspond to `digest`
    ///
    /// The stored source copy must match too: a build of other content whose
    /// trace failed leaves the marker in place but replaces the renders.
    pub fn is_fresh(&self, id: &DocumentId, digest: &str) -> bool {
        if self.store.read_content_hash(id).as_deref() != Some(digest) {
            return false;
        }
        let render_present = fs::metadata(self.store.artifact_path(id, LOCAL_RENDER_FILE))
            .map(|m| m.is_file() && m.len() > 0)
            .unwrap_or(false);
        render_present
            && fs::read(self.store.artifact_path(id, SOURCE_FILE))
                .map(|source| content_digest_bytes(&source) == digest)
                .unwrap_or(false)
    }

    /// Render and trace `content` unless the stored artifacts are current
    ///
    /// Builds of the same document are serialized. Stage failures come back
    /// inside the outcome; the marker is left untouched by any failure.
    pub async fn build(&self, id: &DocumentId, content: &str) -> BuildOutcome {
        let start = Instant::now();
        let document = id.to_string();
        let digest = content_digest(content);

        self.emit(ProgressEvent::BuildStarted {
            document: document.clone(),
        });

        let _guard = match self.locks.acquire(id).await {
            Ok(guard) => guard,
            Err(e) => {
                let error = StageError::from(e);
                let message = error.to_string();
                let render = StageResult::finish(Stage::Render, start, String::new(), Err(error));
                return self.failed(id, digest, Some(render), None, message);
            }
        };

        if self.is_fresh(id, &digest) {
            self.emit(ProgressEvent::CacheHit {
                document,
                content_hash: digest.clone(),
            });
            return BuildOutcome {
                bundle: self.store.bundle(id),
                cached: true,
                content_hash: digest,
                render: None,
                trace: None,
            };
        }

        self.emit(stage_started(&document, Stage::Render));
        let render = self.render.run(id, content).await;
        self.emit(stage_complete(&document, &render));
        if let Some(error) = render.error().map(ToString::to_string) {
            return self.failed(id, digest, Some(render), None, error);
        }

        self.emit(stage_started(&document, Stage::Trace));
        let trace = self.trace.run(id).await;
        self.emit(stage_complete(&document, &trace));
        if let Some(error) = trace.error().map(ToString::to_string) {
            return self.failed(id, digest, Some(render), Some(trace), error);
        }

        if let Err(e) = self.store.write_content_hash(id, &digest) {
            // The build itself succeeded; the next request just misses the cache
            warn!(document = %id, error = %e, "Failed to record content hash");
        }

        info!(document = %id, content_hash = %digest, "Build complete");
        self.emit(ProgressEvent::BuildCompleted {
            document,
            total_time: start.elapsed(),
        });

        BuildOutcome {
            bundle: self.store.bundle(id),
            cached: false,
            content_hash: digest,
            render: Some(render),
            trace: Some(trace),
        }
    }

    /// Run only the render stage, under the document lock
    ///
    /// Clears the marker first: the renders no longer belong to a complete
    /// build once a stage runs on its own.
    pub async fn render(&self, id: &DocumentId, content: &str) -> StageResult<RenderOutput> {
        let start = Instant::now();
        let _guard = match self.exclusive(id).await {
            Ok(guard) => guard,
            Err(e) => return StageResult::finish(Stage::Render, start, String::new(), Err(e)),
        };
        self.render.run(id, content).await
    }

    /// Run only the trace stage, under the document lock
    ///
    /// Clears the marker first; only a full build records a digest.
    pub async fn trace(&self, id: &DocumentId) -> StageResult<TraceOutput> {
        let start = Instant::now();
        let _guard = match self.exclusive(id).await {
            Ok(guard) => guard,
            Err(e) => return StageResult::finish(Stage::Trace, start, String::new(), Err(e)),
        };
        self.trace.run(id).await
    }

    async fn exclusive(&self, id: &DocumentId) -> Result<DocumentGuard, StageError> {
        let guard = self.locks.acquire(id).await?;
        self.store.clear_content_hash(id)?;
        Ok(guard)
    }

    fn failed(
        &self,
        id: &DocumentId,
        digest: String,
        render: Option<StageResult<RenderOutput>>,
        trace: Option<StageResult<TraceOutput>>,
        error: String,
    ) -> BuildOutcome {
        self.emit(ProgressEvent::BuildFailed {
            document: id.to_string(),
            error,
        });
        BuildOutcome {
            bundle: self.store.bundle(id),
            cached: false,
            content_hash: digest,
            render,
            trace,
        }
    }

    fn emit(&self, event: ProgressEvent) {
        self.progress.on_progress(&event);
    }
}

fn stage_started(document: &str, stage: Stage) -> ProgressEvent {
    ProgressEvent::StageStarted {
        document: document.to_string(),
        stage: stage.to_string(),
    }
}

fn stage_complete<T>(document: &str, result: &StageResult<T>) -> ProgressEvent {
    ProgressEvent::StageComplete {
        document: document.to_string(),
        stage: result.stage.to_string(),
        duration: result.duration,
        success: result.success(),
    }
}
