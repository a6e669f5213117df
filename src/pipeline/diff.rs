//! Semantic diff between the local and container renders

use super::stage::{MissingArtifact, Stage, StageError, StageResult};
use crate::document::DocumentId;
use crate::store::layout::{CONTAINER_RENDER_FILE, LOCAL_RENDER_FILE, SEMANTIC_DIFF_FILE};
use crate::store::{ArtifactStore, StoreError};
use crate::tools::{ToolInvocation, ToolRunner, ToolSpec};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct DiffSettings {
    pub tool: ToolSpec,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiffOutput {
    pub semantic_diff: PathBuf,
    pub diff_html: String,
}

pub struct DiffStage {
    store: ArtifactStore,
    runner: Arc<dyn ToolRunner>,
    settings: DiffSettings,
}

impl DiffStage {
    pub fn new(store: ArtifactStore, runner: Arc<dyn ToolRunner>, settings: DiffSettings) -> Self {
        Self {
            store,
            runner,
            settings,
        }
    }

    /// Compare the two renders and publish the result
    ///
    /// Preconditions are checked in order: local render, container render,
    /// then the diff binary.
    pub async fn run(&self, id: &DocumentId) -> StageResult<DiffOutput> {
        let start = Instant::now();
        let mut logs = String::new();
        let outcome = self.execute(id, &mut logs).await;
        StageResult::finish(Stage::Diff, start, logs, outcome)
    }

    async fn execute(&self, id: &DocumentId, logs: &mut String) -> Result<DiffOutput, StageError> {
        let local = self.store.artifact_path(id, LOCAL_RENDER_FILE);
        if !local.is_file() {
            return Err(StageError::MissingArtifact(MissingArtifact::LocalRender));
        }
        let container = self.store.artifact_path(id, CONTAINER_RENDER_FILE);
        if !container.is_file() {
            return Err(StageError::MissingArtifact(MissingArtifact::ContainerRender));
        }
        let tool = self.runner.resolve(&self.settings.tool).ok_or_else(|| {
            StageError::MissingTool {
                tool: self.settings.tool.name.clone(),
                searched: self.settings.tool.searched(),
            }
        })?;

        info!(document = %id, "Generating semantic diff");
        let workspace = self.store.workspace("diff")?;
        let diff_output = workspace.join(SEMANTIC_DIFF_FILE);

        // The tool runs in the workspace, so hand it absolute paths
        let invocation = ToolInvocation::new("Running r-diff", &tool, workspace.path())
            .arg("-html")
            .path_arg(&absolute(&local)?)
            .path_arg(&absolute(&container)?)
            .arg("-output")
            .path_arg(&diff_output)
            .timeout(self.settings.timeout);

        let output = self.runner.run(&invocation).await;
        *logs = output.combined_logs();
        debug!(exit_code = output.exit_code, "r-diff finished");
        StageError::check(&self.settings.tool.name, &output, self.settings.timeout)?;

        if !diff_output.is_file() {
            return Err(StageError::MissingOutput {
                tool: self.settings.tool.name.clone(),
                expected: SEMANTIC_DIFF_FILE.to_string(),
            });
        }

        let semantic_diff = self.store.publish_file(id, &diff_output, SEMANTIC_DIFF_FILE)?;
        Ok(DiffOutput {
            semantic_diff,
            diff_html: self.store.read_artifact(id, SEMANTIC_DIFF_FILE),
        })
    }
}

fn absolute(path: &Path) -> Result<PathBuf, StoreError> {
    path.canonicalize()
        .map_err(|e| StoreError::io(format!("resolve {}", path.display()), e))
}
