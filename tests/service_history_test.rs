//! Execution history recorded by the service

mod support;

use repropack::persistence::{ExecutionStatus, InMemoryRepository};
use repropack::tools::ToolOutput;
use repropack::{DocumentId, PersistenceError, ReproService, ServiceError};
use std::sync::Arc;
use support::{config, working_tools, NOTEBOOK};
use tempfile::TempDir;

#[tokio::test]
async fn test_operations_are_recorded() {
    let storage = TempDir::new().unwrap();
    let repository = Arc::new(InMemoryRepository::new());
    let id = DocumentId::from(3u64);
    repository.insert_document(id.clone(), NOTEBOOK).await;

    let mock = working_tools();
    let service = ReproService::new(
        &config(storage.path(), storage.path()),
        mock.clone(),
        repository.clone(),
    )
    .unwrap();

    service.build(&id).await.unwrap();
    mock.on("r-diff", |_| ToolOutput::exited(2, "", "r-diff: parse error"));
    service.diff(&id).await.unwrap();

    let history = repository.executions(&id).await;
    assert_eq!(history.len(), 2);

    let diff = history.iter().find(|r| r.operation == "diff").unwrap();
    assert_eq!(diff.status, ExecutionStatus::Failed);
    assert!(diff.output.contains("parse error"));
    assert!(diff.error.as_deref().unwrap().contains("r-diff"));
    assert!(diff.completed_at.is_some());

    let build = history.iter().find(|r| r.operation == "build").unwrap();
    assert_eq!(build.status, ExecutionStatus::Completed);
    assert!(build.error.is_none());
    assert!(build.output.contains("Output created"));
    assert!(build.duration_seconds().unwrap() >= 0.0);
}

#[tokio::test]
async fn test_unknown_document() {
    let storage = TempDir::new().unwrap();
    let repository = Arc::new(InMemoryRepository::new());
    let service = ReproService::new(
        &config(storage.path(), storage.path()),
        working_tools(),
        repository.clone(),
    )
    .unwrap();

    let id = DocumentId::from(404u64);
    let err = service.build(&id).await.unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Persistence(PersistenceError::DocumentNotFound(_))
    ));
    assert!(repository.executions(&id).await.is_empty());
}

#[tokio::test]
async fn test_invalid_config_rejected() {
    let storage = TempDir::new().unwrap();
    let mut config = config(storage.path(), storage.path());
    config.diff_timeout_secs = config.trace_timeout_secs;

    let result = ReproService::new(&config, working_tools(), Arc::new(InMemoryRepository::new()));
    assert!(matches!(result, Err(ServiceError::Config(_))));
}
