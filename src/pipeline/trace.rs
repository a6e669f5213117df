//! Dependency trace: containerized re-render through the tracer

use super::stage::{MissingArtifact, Stage, StageError, StageResult};
use crate::document::DocumentId;
use crate::extractors::parsers::{parse_manifest, system_packages};
use crate::extractors::{extract_metrics, MetricsReport};
use crate::store::layout::{
    CONTAINER_RENDER_FILE, DOCKERFILE, MAKEFILE, MANIFEST_FILE, RENDER_OUTPUT_FILE, SOURCE_FILE,
};
use crate::store::{find_html_file, ArtifactStore, Workspace};
use crate::tools::{ToolInvocation, ToolRunner, ToolSpec};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Where the tracer puts its output tree inside the workspace
const TRACE_OUTPUT_DIR: &str = "r4r_output";

/// How the tracer is asked to produce the container render
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceMode {
    /// Output directory only; the render lands wherever R writes it
    #[default]
    Output,
    /// Also name the result file and the image/container to build
    Result,
}

impl fmt::Display for TraceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TraceMode::Output => "output",
            TraceMode::Result => "result",
        })
    }
}

impl FromStr for TraceMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "output" => Ok(TraceMode::Output),
            "result" => Ok(TraceMode::Result),
            other => Err(format!(
                "Invalid trace mode '{}'. Expected: output or result",
                other
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TraceSettings {
    pub tracer: ToolSpec,
    /// Command the tracer runs, resolved inside its own environment
    pub engine_command: String,
    pub timeout: Duration,
    /// `HOME` for the tracer process
    pub home: PathBuf,
    pub mode: TraceMode,
}

#[derive(Debug, Clone, Serialize)]
pub struct TraceOutput {
    pub container_render: PathBuf,
    pub dockerfile: String,
    pub makefile: String,
    pub manifest: serde_json::Value,
    pub system_packages: Vec<String>,
    pub metrics: MetricsReport,
    pub files_imported: usize,
    /// Whether the downloadable zip was written
    pub package_ready: bool,
}

pub struct TraceStage {
    store: ArtifactStore,
    runner: Arc<dyn ToolRunner>,
    settings: TraceSettings,
}

impl TraceStage {
    pub fn new(store: ArtifactStore, runner: Arc<dyn ToolRunner>, settings: TraceSettings) -> Self {
        Self {
            store,
            runner,
            settings,
        }
    }

    pub fn settings(&self) -> &TraceSettings {
        &self.settings
    }

    /// Trace the stored source copy and publish the reproduction bundle
    pub async fn run(&self, id: &DocumentId) -> StageResult<TraceOutput> {
        let start = Instant::now();
        let mut logs = String::new();
        let outcome = self.execute(id, &mut logs).await;
        StageResult::finish(Stage::Trace, start, logs, outcome)
    }

    async fn execute(&self, id: &DocumentId, logs: &mut String) -> Result<TraceOutput, StageError> {
        if !self.store.has_artifact(id, SOURCE_FILE) {
            return Err(StageError::MissingArtifact(MissingArtifact::SourceCopy));
        }

        let tracer = self.runner.resolve(&self.settings.tracer).ok_or_else(|| {
            StageError::MissingTool {
                tool: self.settings.tracer.name.clone(),
                searched: self.settings.tracer.searched(),
            }
        })?;

        info!(document = %id, mode = %self.settings.mode, "Tracing document");
        let workspace = self.store.workspace("trace")?;
        workspace.copy_in(&self.store.artifact_path(id, SOURCE_FILE), SOURCE_FILE)?;
        let output_dir = workspace.join(TRACE_OUTPUT_DIR);

        let invocation = self.invocation(id, &tracer, &workspace, &output_dir);
        let output = self.runner.run(&invocation).await;
        *logs = output.combined_logs();
        StageError::check(&self.settings.tracer.name, &output, self.settings.timeout)?;

        // Look before copying anything so a missing render leaves the store as it was
        let html_path = locate_container_render(&workspace, &output_dir).ok_or_else(|| {
            StageError::MissingOutput {
                tool: self.settings.tracer.name.clone(),
                expected: "HTML result".to_string(),
            }
        })?;
        debug!(document = %id, html = %html_path.display(), "Found container render");

        let metrics = extract_metrics(&output_dir);

        let files_imported = if output_dir.is_dir() {
            self.store.import_tree(id, &output_dir)?
        } else {
            0
        };
        let container_render = self
            .store
            .publish_file(id, &html_path, CONTAINER_RENDER_FILE)?;

        let package_ready = match self.store.create_package(id) {
            Ok(_) => true,
            Err(e) => {
                warn!(document = %id, error = %e, "Package zip not written");
                false
            }
        };

        let manifest = parse_manifest(&self.store.read_artifact(id, MANIFEST_FILE));
        let mut metrics = metrics;
        metrics.warnings.extend(manifest.warnings);

        Ok(TraceOutput {
            container_render,
            dockerfile: self.store.read_artifact(id, DOCKERFILE),
            makefile: self.store.read_artifact(id, MAKEFILE),
            system_packages: system_packages(&manifest.value),
            manifest: manifest.value,
            metrics,
            files_imported,
            package_ready,
        })
    }

    fn invocation(
        &self,
        id: &DocumentId,
        tracer: &Path,
        workspace: &Workspace,
        output_dir: &Path,
    ) -> ToolInvocation {
        let mut invocation = ToolInvocation::new("r4r Trace & Build", tracer, workspace.path())
            .arg("-v")
            .arg("--output")
            .path_arg(output_dir);

        if self.settings.mode == TraceMode::Result {
            invocation = invocation
                .args(["--result", RENDER_OUTPUT_FILE])
                .arg("--docker-image-tag")
                .arg(format!("notebook-{}", id))
                .arg("--docker-container-name")
                .arg(format!("notebook-container-{}", id))
                .arg("--skip-make");
        }

        invocation
            .arg(self.settings.engine_command.clone())
            .args(["-e", "rmarkdown::render('notebook.Rmd')"])
            .env("HOME", self.settings.home.display().to_string())
            .env("VISUAL", "/bin/true")
            .timeout(self.settings.timeout)
    }
}

/// The tracer does not guarantee where the render ends up
fn locate_container_render(workspace: &Workspace, output_dir: &Path) -> Option<PathBuf> {
    [
        output_dir.join("result").join(RENDER_OUTPUT_FILE),
        output_dir.join(RENDER_OUTPUT_FILE),
        workspace.join(RENDER_OUTPUT_FILE),
    ]
    .into_iter()
    .find(|candidate| candidate.is_file())
    .or_else(|| find_html_file(output_dir))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_trace_mode_parse() {
        assert_eq!("output".parse::<TraceMode>().unwrap(), TraceMode::Output);
        assert_eq!("RESULT".parse::<TraceMode>().unwrap(), TraceMode::Result);
        assert!("docker".parse::<TraceMode>().is_err());
        assert_eq!(TraceMode::default(), TraceMode::Output);
    }

    #[test]
    fn test_locate_prefers_result_dir() {
        let ws = Workspace::create(None, "locate").unwrap();
        let out = ws.join(TRACE_OUTPUT_DIR);
        fs::create_dir_all(out.join("result")).unwrap();
        fs::write(out.join("aaa.html"), "stray").unwrap();
        fs::write(out.join("result").join(RENDER_OUTPUT_FILE), "result").unwrap();

        assert_eq!(
            locate_container_render(&ws, &out),
            Some(out.join("result").join(RENDER_OUTPUT_FILE))
        );
    }

    #[test]
    fn test_locate_falls_back_to_workspace_then_search() {
        let ws = Workspace::create(None, "locate").unwrap();
        let out = ws.join(TRACE_OUTPUT_DIR);
        fs::create_dir_all(out.join("nested")).unwrap();
        fs::write(out.join("nested").join("report.html"), "found").unwrap();
        assert_eq!(
            locate_container_render(&ws, &out),
            Some(out.join("nested").join("report.html"))
        );

        fs::write(ws.join(RENDER_OUTPUT_FILE), "ws").unwrap();
        assert_eq!(
            locate_container_render(&ws, &out),
            Some(ws.join(RENDER_OUTPUT_FILE))
        );
    }

    #[test]
    fn test_locate_none_without_html() {
        let ws = Workspace::create(None, "locate").unwrap();
        assert_eq!(locate_container_render(&ws, &ws.join(TRACE_OUTPUT_DIR)), None);
    }
}
