//! Subcommand handlers
//!
//! Each handler returns the process exit code: 0 on success, 1 when the
//! operation ran and failed, 2 when it could not start (bad configuration,
//! unreadable input).

use super::commands::{DocumentArgs, ScanArgs, SourceArgs};
use super::output::OutputFormatter;
use crate::config::ReproConfig;
use crate::document::DocumentId;
use crate::persistence::InMemoryRepository;
use crate::progress::LoggingHandler;
use crate::scanner;
use crate::service::ReproService;
use crate::tools::ProcessRunner;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error};

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_SETUP_ERROR: i32 = 2;

pub fn handle_scan(args: &ScanArgs) -> i32 {
    let content = match read_document(&args.file) {
        Ok(content) => content,
        Err(e) => return setup_error(e),
    };

    let report = scanner::scan(&content);
    debug!(issues = report.issues.len(), "Scan complete");
    emit(OutputFormatter::new(args.format.into()).format_scan(&report));
    EXIT_SUCCESS
}

pub async fn handle_render(args: &SourceArgs, storage_dir: Option<&Path>) -> i32 {
    let service = match service_with_source(args, storage_dir).await {
        Ok(service) => service,
        Err(e) => return setup_error(e),
    };

    match service.render(&args.id).await {
        Ok(result) => {
            let formatter = OutputFormatter::new(args.format.into());
            emit(formatter.format_render(&result));
            exit_for(result.success())
        }
        Err(e) => runtime_error(e.into()),
    }
}

pub async fn handle_trace(args: &DocumentArgs, storage_dir: Option<&Path>) -> i32 {
    let service = match service_for(&args.id, None, storage_dir).await {
        Ok(service) => service,
        Err(e) => return setup_error(e),
    };

    match service.trace(&args.id).await {
        Ok(result) => {
            emit(OutputFormatter::new(args.format.into()).format_trace(&result));
            exit_for(result.success())
        }
        Err(e) => runtime_error(e.into()),
    }
}

pub async fn handle_diff(args: &DocumentArgs, storage_dir: Option<&Path>) -> i32 {
    let service = match service_for(&args.id, None, storage_dir).await {
        Ok(service) => service,
        Err(e) => return setup_error(e),
    };

    match service.diff(&args.id).await {
        Ok(result) => {
            emit(OutputFormatter::new(args.format.into()).format_diff(&result));
            exit_for(result.success())
        }
        Err(e) => runtime_error(e.into()),
    }
}

pub async fn handle_build(args: &SourceArgs, storage_dir: Option<&Path>) -> i32 {
    let service = match service_with_source(args, storage_dir).await {
        Ok(service) => service,
        Err(e) => return setup_error(e),
    };

    match service.build(&args.id).await {
        Ok(outcome) => {
            emit(OutputFormatter::new(args.format.into()).format_build(&outcome));
            exit_for(outcome.success())
        }
        Err(e) => runtime_error(e.into()),
    }
}

pub async fn handle_package(args: &DocumentArgs, storage_dir: Option<&Path>) -> i32 {
    let service = match service_for(&args.id, None, storage_dir).await {
        Ok(service) => service,
        Err(e) => return setup_error(e),
    };

    match service.package(&args.id) {
        Ok(path) => {
            emit(OutputFormatter::new(args.format.into()).format_package(&path));
            EXIT_SUCCESS
        }
        Err(e) => runtime_error(e.into()),
    }
}

/// Environment configuration with the command-line storage override applied
pub fn load_config(storage_dir: Option<&Path>) -> Result<ReproConfig> {
    let mut config = ReproConfig::from_env().context("Failed to load configuration")?;
    if let Some(dir) = storage_dir {
        config.storage_dir = dir.to_path_buf();
    }
    config.validate().context("Invalid configuration")?;
    debug!("{}", config);
    Ok(config)
}

async fn service_with_source(
    args: &SourceArgs,
    storage_dir: Option<&Path>,
) -> Result<ReproService> {
    let content = read_document(&args.file)?;
    service_for(&args.id, Some(content), storage_dir).await
}

async fn service_for(
    id: &DocumentId,
    content: Option<String>,
    storage_dir: Option<&Path>,
) -> Result<ReproService> {
    let config = load_config(storage_dir)?;
    let repository = Arc::new(InMemoryRepository::new());
    if let Some(content) = content {
        repository.insert_document(id.clone(), content).await;
    }

    let service = ReproService::new(&config, Arc::new(ProcessRunner), repository)
        .context("Failed to initialize service")?
        .with_progress(Arc::new(LoggingHandler));
    Ok(service)
}

fn read_document(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn emit(rendered: Result<String>) {
    match rendered {
        Ok(text) => println!("{}", text.trim_end()),
        Err(e) => error!("{:#}", e),
    }
}

fn exit_for(success: bool) -> i32 {
    if success {
        EXIT_SUCCESS
    } else {
        EXIT_FAILURE
    }
}

fn setup_error(e: anyhow::Error) -> i32 {
    eprintln!("Error: {:#}", e);
    EXIT_SETUP_ERROR
}

fn runtime_error(e: anyhow::Error) -> i32 {
    eprintln!("Error: {:#}", e);
    EXIT_FAILURE
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands::OutputFormatArg;
    use serial_test::serial;
    use std::env;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_scan_missing_file_is_setup_error() {
        let args = ScanArgs {
            file: PathBuf::from("/definitely/not/here.Rmd"),
            format: OutputFormatArg::Json,
        };
        assert_eq!(handle_scan(&args), EXIT_SETUP_ERROR);
    }

    #[test]
    fn test_scan_existing_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("doc.Rmd");
        fs::write(&file, "x <- rnorm(3)\n").unwrap();
        let args = ScanArgs {
            file,
            format: OutputFormatArg::Human,
        };
        assert_eq!(handle_scan(&args), EXIT_SUCCESS);
    }

    #[test]
    #[serial]
    fn test_load_config_storage_override() {
        env::remove_var("REPROPACK_STORAGE_DIR");
        let config = load_config(Some(Path::new("/srv/override"))).unwrap();
        assert_eq!(config.storage_dir, PathBuf::from("/srv/override"));
    }

    #[test]
    #[serial]
    fn test_load_config_rejects_bad_env() {
        env::set_var("REPROPACK_RENDER_TIMEOUT", "soon");
        let result = load_config(None);
        env::remove_var("REPROPACK_RENDER_TIMEOUT");
        assert!(result.is_err());
    }

    #[tokio::test]
    #[serial]
    async fn test_diff_without_renders_fails() {
        let dir = TempDir::new().unwrap();
        let args = DocumentArgs {
            id: DocumentId::from(5u64),
            format: OutputFormatArg::Json,
        };
        assert_eq!(handle_diff(&args, Some(dir.path())).await, EXIT_FAILURE);
    }
}

