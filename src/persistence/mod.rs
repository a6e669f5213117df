//! Document content and execution history
//!
//! The pipeline does not own document storage. It reads content through
//! [`DocumentRepository`] and reports every stage run back to it as an
//! [`ExecutionRecord`]. [`InMemoryRepository`] backs the CLI and tests.

pub mod memory;

pub use memory::InMemoryRepository;

use crate::document::DocumentId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Document not found: {0}")]
    DocumentNotFound(DocumentId),

    #[error("Persistence backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExecutionStatus::Pending => "pending",
            ExecutionStatus::Running => "running",
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Failed => "failed",
        })
    }
}

/// One run of one operation against a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub id: Uuid,
    pub document_id: DocumentId,
    /// `render`, `trace`, `diff` or `build`
    pub operation: String,
    pub status: ExecutionStatus,
    pub output: String,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ExecutionRecord {
    /// A record for an operation that starts now
    pub fn start(document_id: &DocumentId, operation: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            document_id: document_id.clone(),
            operation: operation.into(),
            status: ExecutionStatus::Running,
            output: String::new(),
            error: None,
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Mark completed (`error` is `None`) or failed
    pub fn finish(mut self, output: impl Into<String>, error: Option<String>) -> Self {
        self.status = if error.is_none() {
            ExecutionStatus::Completed
        } else {
            ExecutionStatus::Failed
        };
        self.output = output.into();
        self.error = error;
        self.completed_at = Some(Utc::now());
        self
    }

    /// Seconds between start and completion, rounded to two decimals
    pub fn duration_seconds(&self) -> Option<f64> {
        let completed = self.completed_at?;
        let millis = (completed - self.started_at).num_milliseconds();
        Some((millis as f64 / 10.0).round() / 100.0)
    }
}

#[async_trait]
pub trait DocumentRepository: Send + Sync {
    /// Current content of a document
    async fn get_document_content(&self, id: &DocumentId) -> Result<String, PersistenceError>;

    /// Insert the record, or replace the stored record with the same id
    async fn record_execution(&self, record: &ExecutionRecord) -> Result<(), PersistenceError>;
}
