//! Stage identities, typed stage errors and the uniform stage result

use crate::store::StoreError;
use crate::tools::ToolOutput;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::fmt;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Render,
    Trace,
    Diff,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Render => "render",
            Stage::Trace => "trace",
            Stage::Diff => "diff",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A prerequisite artifact that an earlier stage should have produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingArtifact {
    SourceCopy,
    LocalRender,
    ContainerRender,
}

impl fmt::Display for MissingArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MissingArtifact::SourceCopy => "Run notebook first to generate .Rmd",
            MissingArtifact::LocalRender => "Local HTML not found. Run notebook first.",
            MissingArtifact::ContainerRender => {
                "Container HTML not found. Generate package first."
            }
        })
    }
}

/// Why a stage failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StageError {
    #[error("{tool} timed out after {timeout_secs}s")]
    TimedOut { tool: String, timeout_secs: u64 },

    #[error("{tool} failed with exit code {exit_code}")]
    ToolFailed { tool: String, exit_code: i32 },

    #[error("{tool} finished but produced no {expected}")]
    MissingOutput { tool: String, expected: String },

    #[error("{0}")]
    MissingArtifact(MissingArtifact),

    #[error("{tool} binary not found (searched: {searched})")]
    MissingTool { tool: String, searched: String },

    #[error("Filesystem error: {0}")]
    Filesystem(String),
}

impl StageError {
    /// Stable machine-readable category
    pub fn kind(&self) -> &'static str {
        match self {
            StageError::TimedOut { .. } => "timeout",
            StageError::ToolFailed { .. } => "tool_failure",
            StageError::MissingOutput { .. } => "missing_output",
            StageError::MissingArtifact(_) => "missing_artifact",
            StageError::MissingTool { .. } => "missing_tool",
            StageError::Filesystem(_) => "filesystem",
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, StageError::TimedOut { .. })
    }

    /// Returns a user-friendly error message with troubleshooting hints
    pub fn help_message(&self) -> String {
        match self {
            StageError::TimedOut { tool, timeout_secs } => format!(
                "Error: {} did not finish within {}s\n\n\
                Help: The process was killed. Check the logs for a hanging chunk,\n\
                or raise the matching REPROPACK_*_TIMEOUT variable.",
                tool, timeout_secs
            ),
            StageError::ToolFailed { tool, exit_code } => format!(
                "Error: {} exited with status {}\n\n\
                Help: The tool output above usually names the failing chunk or\n\
                the missing package.",
                tool, exit_code
            ),
            StageError::MissingOutput { tool, expected } => format!(
                "Error: {} reported success but no {} was found\n\n\
                Help: Check that the document renders to HTML (output: html_document).",
                tool, expected
            ),
            StageError::MissingArtifact(missing) => format!(
                "Error: {}\n\n\
                Help: Stages run in order: render, then trace, then diff.",
                missing
            ),
            StageError::MissingTool { tool, searched } => format!(
                "Error: {} is not installed\nSearched: {}\n\n\
                Help: Install it, or point REPROPACK_RENDER_BIN, REPROPACK_TRACER_BIN\n\
                or REPROPACK_DIFF_BIN at the binary.",
                tool, searched
            ),
            StageError::Filesystem(message) => format!(
                "Error: {}\n\n\
                Help: Check that REPROPACK_STORAGE_DIR is writable and not full.",
                message
            ),
        }
    }

    /// Map a finished tool run to an error unless it exited zero
    pub fn check(tool: &str, output: &ToolOutput, timeout: Duration) -> Result<(), StageError> {
        if output.timed_out() {
            Err(StageError::TimedOut {
                tool: tool.to_string(),
                timeout_secs: timeout.as_secs(),
            })
        } else if !output.success() {
            Err(StageError::ToolFailed {
                tool: tool.to_string(),
                exit_code: output.exit_code,
            })
        } else {
            Ok(())
        }
    }
}

impl From<StoreError> for StageError {
    fn from(err: StoreError) -> Self {
        StageError::Filesystem(err.to_string())
    }
}

/// Outcome of one stage run
///
/// Failures are values, never panics or propagated errors: a caller always
/// gets the stage's logs and duration back.
#[derive(Debug, Clone)]
pub struct StageResult<T> {
    pub stage: Stage,
    pub logs: String,
    pub duration: Duration,
    pub outcome: Result<T, StageError>,
}

impl<T> StageResult<T> {
    /// Close a stage run started at `start`, logging the outcome
    pub fn finish(
        stage: Stage,
        start: Instant,
        logs: String,
        outcome: Result<T, StageError>,
    ) -> Self {
        let duration = start.elapsed();
        match &outcome {
            Ok(_) => info!(stage = %stage, duration_ms = duration.as_millis(), "Stage succeeded"),
            Err(e) => warn!(
                stage = %stage,
                kind = e.kind(),
                error = %e,
                duration_ms = duration.as_millis(),
                "Stage failed"
            ),
        }
        Self {
            stage,
            logs,
            duration,
            outcome,
        }
    }

    pub fn success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn payload(&self) -> Option<&T> {
        self.outcome.as_ref().ok()
    }

    pub fn error(&self) -> Option<&StageError> {
        self.outcome.as_ref().err()
    }
}

impl<T: Serialize> Serialize for StageResult<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(5))?;
        map.serialize_entry("stage", &self.stage)?;
        map.serialize_entry("success", &self.success())?;
        map.serialize_entry("logs", &self.logs)?;
        map.serialize_entry("duration_ms", &(self.duration.as_millis() as u64))?;
        match &self.outcome {
            Ok(payload) => map.serialize_entry("payload", payload)?,
            Err(e) => map.serialize_entry("error", &ErrorBody::from(e))?,
        }
        map.end()
    }
}

#[derive(Serialize)]
struct ErrorBody {
    kind: &'static str,
    message: String,
}

impl From<&StageError> for ErrorBody {
    fn from(e: &StageError) -> Self {
        Self {
            kind: e.kind(),
            message: e.to_string(),
        }
    }
}
