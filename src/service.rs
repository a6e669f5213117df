//! High-level orchestration over the pipeline
//!
//! `ReproService` is what a caller (the CLI, or an API layer) talks to. It
//! fetches document content from a [`DocumentRepository`], runs the
//! requested operation and records the execution history around it.
//!
//! # Example
//!
//! ```no_run
//! use repropack::persistence::InMemoryRepository;
//! use repropack::service::ReproService;
//! use repropack::tools::ProcessRunner;
//! use repropack::{DocumentId, ReproConfig};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let repository = Arc::new(InMemoryRepository::new());
//! let id = DocumentId::from(42u64);
//! repository.insert_document(id.clone(), "```{r}\nsummary(cars)\n```\n").await;
//!
//! let config = ReproConfig::from_env()?;
//! let service = ReproService::new(&config, Arc::new(ProcessRunner), repository)?;
//!
//! let outcome = service.build(&id).await?;
//! println!("cached: {}, success: {}", outcome.cached, outcome.success());
//! # Ok(())
//! # }
//! ```

use crate::config::{ConfigError, ReproConfig};
use crate::document::DocumentId;
use crate::persistence::{DocumentRepository, ExecutionRecord, PersistenceError};
use crate::pipeline::{
    BuildCache, BuildOutcome, DiffOutput, DiffStage, RenderOutput, RenderStage, StageResult,
    TraceOutput, TraceStage,
};
use crate::progress::ProgressHandler;
use crate::scanner::{self, ScanReport};
use crate::store::{ArtifactBundle, ArtifactStore, StoreError};
use crate::tools::ToolRunner;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Errors outside the stages themselves
///
/// Stage failures are not errors here: they come back as failed
/// [`StageResult`]s and are recorded in the execution history.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct ReproService {
    store: ArtifactStore,
    cache: BuildCache,
    diff: DiffStage,
    repository: Arc<dyn DocumentRepository>,
}

impl std::fmt::Debug for ReproService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReproService")
            .field("storage_dir", &self.store.base_dir())
            .finish()
    }
}

impl ReproService {
    /// Validates `config` and wires the stages to `runner`
    pub fn new(
        config: &ReproConfig,
        runner: Arc<dyn ToolRunner>,
        repository: Arc<dyn DocumentRepository>,
    ) -> Result<Self, ServiceError> {
        config.validate()?;
        let store = ArtifactStore::new(&config.storage_dir);
        info!(storage = %config.storage_dir.display(), "Initializing repro service");
        Ok(Self::with_store(store, config, runner, repository))
    }

    /// Like [`ReproService::new`] but with a caller-supplied store
    pub fn with_store(
        store: ArtifactStore,
        config: &ReproConfig,
        runner: Arc<dyn ToolRunner>,
        repository: Arc<dyn DocumentRepository>,
    ) -> Self {
        let render = RenderStage::new(store.clone(), runner.clone(), config.render_settings());
        let trace = TraceStage::new(store.clone(), runner.clone(), config.trace_settings());
        let diff = DiffStage::new(store.clone(), runner, config.diff_settings());

        Self {
            cache: BuildCache::new(store.clone(), render, trace),
            store,
            diff,
            repository,
        }
    }

    pub fn with_progress(mut self, handler: Arc<dyn ProgressHandler>) -> Self {
        self.cache = self.cache.with_progress(handler);
        self
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Static hazard scan of the current document content
    pub async fn scan(&self, id: &DocumentId) -> Result<ScanReport, ServiceError> {
        let content = self.repository.get_document_content(id).await?;
        Ok(scanner::scan(&content))
    }

    pub async fn render(&self, id: &DocumentId) -> Result<StageResult<RenderOutput>, ServiceError> {
        let content = self.repository.get_document_content(id).await?;
        let record = self.begin(id, "render").await?;
        let result = self.cache.render(id, &content).await;
        self.finish(record, &result).await;
        Ok(result)
    }

    pub async fn trace(&self, id: &DocumentId) -> Result<StageResult<TraceOutput>, ServiceError> {
        let record = self.begin(id, "trace").await?;
        let result = self.cache.trace(id).await;
        self.finish(record, &result).await;
        Ok(result)
    }

    pub async fn diff(&self, id: &DocumentId) -> Result<StageResult<DiffOutput>, ServiceError> {
        let record = self.begin(id, "diff").await?;
        let result = self.diff.run(id).await;
        self.finish(record, &result).await;
        Ok(result)
    }

    /// Cache-gated render + trace of the current content
    pub async fn build(&self, id: &DocumentId) -> Result<BuildOutcome, ServiceError> {
        let content = self.repository.get_document_content(id).await?;
        let record = self.begin(id, "build").await?;
        let outcome = self.cache.build(id, &content).await;

        let logs = [
            outcome.render.as_ref().map(|r| r.logs.as_str()),
            outcome.trace.as_ref().map(|t| t.logs.as_str()),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join("\n");
        let error = outcome
            .failure()
            .map(|(stage, e)| format!("{} stage failed: {}", stage, e));
        self.record(record.finish(logs, error)).await;
        Ok(outcome)
    }

    /// Rebuild the downloadable zip from the current artifact directory
    pub fn package(&self, id: &DocumentId) -> Result<PathBuf, ServiceError> {
        Ok(self.store.create_package(id)?)
    }

    pub fn bundle(&self, id: &DocumentId) -> ArtifactBundle {
        self.store.bundle(id)
    }

    async fn begin(
        &self,
        id: &DocumentId,
        operation: &str,
    ) -> Result<ExecutionRecord, ServiceError> {
        let record = ExecutionRecord::start(id, operation);
        self.repository.record_execution(&record).await?;
        Ok(record)
    }

    async fn finish<T>(&self, record: ExecutionRecord, result: &StageResult<T>) {
        let error = result.error().map(ToString::to_string);
        self.record(record.finish(result.logs.clone(), error)).await;
    }

    /// History is best effort once the operation has run
    async fn record(&self, record: ExecutionRecord) {
        if let Err(e) = self.repository.record_execution(&record).await {
            warn!(
                document = %record.document_id,
                operation = %record.operation,
                error = %e,
                "Failed to record execution"
            );
        }
    }
}
