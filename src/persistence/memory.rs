//! In-process repository

use super::{DocumentRepository, ExecutionRecord, PersistenceError};
use crate::document::DocumentId;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
pub struct InMemoryRepository {
    documents: RwLock<HashMap<DocumentId, String>>,
    executions: RwLock<Vec<ExecutionRecord>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_document(&self, id: DocumentId, content: impl Into<String>) {
        self.documents.write().await.insert(id, content.into());
    }

    /// Executions for a document, newest first
    pub async fn executions(&self, id: &DocumentId) -> Vec<ExecutionRecord> {
        let mut records: Vec<ExecutionRecord> = self
            .executions
            .read()
            .await
            .iter()
            .filter(|r| &r.document_id == id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        records
    }
}

#[async_trait]
impl DocumentRepository for InMemoryRepository {
    async fn get_document_content(&self, id: &DocumentId) -> Result<String, PersistenceError> {
        self.documents
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| PersistenceError::DocumentNotFound(id.clone()))
    }

    async fn record_execution(&self, record: &ExecutionRecord) -> Result<(), PersistenceError> {
        let mut executions = self.executions.write().await;
        match executions.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => *existing = record.clone(),
            None => executions.push(record.clone()),
        }
        Ok(())
    }
}
