//! Logging-based progress handler

use super::{ProgressEvent, ProgressHandler};
use tracing::{info, warn};

/// Handler that logs progress events using tracing
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHandler;

impl ProgressHandler for LoggingHandler {
    fn on_progress(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::BuildStarted { document } => {
                info!(document = %document, "Starting build");
            }
            ProgressEvent::CacheHit {
                document,
                content_hash,
            } => {
                info!(document = %document, content_hash = %content_hash, "Content unchanged, reusing artifacts");
            }
            ProgressEvent::StageStarted { document, stage } => {
                info!(document = %document, stage = %stage, "Starting stage");
            }
            ProgressEvent::StageComplete {
                document,
                stage,
                duration,
                success,
            } => {
                if *success {
                    info!(
                        document = %document,
                        stage = %stage,
                        duration_ms = duration.as_millis(),
                        "Stage complete"
                    );
                } else {
                    warn!(
                        document = %document,
                        stage = %stage,
                        duration_ms = duration.as_millis(),
                        "Stage failed"
                    );
                }
            }
            ProgressEvent::BuildCompleted {
                document,
                total_time,
            } => {
                info!(
                    document = %document,
                    total_time_ms = total_time.as_millis(),
                    "Build complete"
                );
            }
            ProgressEvent::BuildFailed { document, error } => {
                warn!(document = %document, error = %error, "Build failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_logging_handler_all_events() {
        let handler = LoggingHandler;
        let document = "1".to_string();

        handler.on_progress(&ProgressEvent::BuildStarted {
            document: document.clone(),
        });
        handler.on_progress(&ProgressEvent::CacheHit {
            document: document.clone(),
            content_hash: "deadbeef".to_string(),
        });
        handler.on_progress(&ProgressEvent::StageStarted {
            document: document.clone(),
            stage: "trace".to_string(),
        });
        handler.on_progress(&ProgressEvent::StageComplete {
            document: document.clone(),
            stage: "trace".to_string(),
            duration: Duration::from_secs(2),
            success: false,
        });
        handler.on_progress(&ProgressEvent::BuildFailed {
            document: document.clone(),
            error: "r4r exited with status 1".to_string(),
        });
        handler.on_progress(&ProgressEvent::BuildCompleted {
            document,
            total_time: Duration::from_secs(10),
        });
    }
}
