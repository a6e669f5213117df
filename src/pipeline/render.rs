//! Plain-host render of a document

use super::packages::{detect_packages, install_script};
use super::stage::{Stage, StageError, StageResult};
use crate::document::DocumentId;
use crate::scanner::{self, ScanReport};
use crate::store::layout::{LOCAL_RENDER_FILE, RENDER_OUTPUT_FILE, SOURCE_FILE};
use crate::store::{find_html_file, ArtifactStore, Workspace};
use crate::tools::{ToolInvocation, ToolRunner, ToolSpec};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct RenderSettings {
    /// The R interpreter
    pub engine: ToolSpec,
    pub timeout: Duration,
    /// Pre-install detected packages before rendering
    pub install_packages: bool,
    pub install_timeout: Duration,
    pub cran_repo: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RenderOutput {
    pub local_render: PathBuf,
    pub html: String,
    pub detected_packages: Vec<String>,
    pub static_analysis: ScanReport,
}

pub struct RenderStage {
    store: ArtifactStore,
    runner: Arc<dyn ToolRunner>,
    settings: RenderSettings,
}

impl RenderStage {
    pub fn new(store: ArtifactStore, runner: Arc<dyn ToolRunner>, settings: RenderSettings) -> Self {
        Self {
            store,
            runner,
            settings,
        }
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    /// Render `content` and publish the local render and source copy
    ///
    /// Nothing is published unless the engine exits zero and an HTML file is
    /// found.
    pub async fn run(&self, id: &DocumentId, content: &str) -> StageResult<RenderOutput> {
        let start = Instant::now();
        let mut logs = String::new();
        let outcome = self.execute(id, content, &mut logs).await;
        StageResult::finish(Stage::Render, start, logs, outcome)
    }

    async fn execute(
        &self,
        id: &DocumentId,
        content: &str,
        logs: &mut String,
    ) -> Result<RenderOutput, StageError> {
        info!(document = %id, "Rendering document");
        let static_analysis = scanner::scan(content);

        let engine = self.runner.resolve(&self.settings.engine).ok_or_else(|| {
            StageError::MissingTool {
                tool: self.settings.engine.name.clone(),
                searched: self.settings.engine.searched(),
            }
        })?;

        let workspace = self.store.workspace("render")?;
        let source = workspace.write_file(SOURCE_FILE, content)?;

        let detected_packages = detect_packages(content);
        let install_logs = if self.settings.install_packages && !detected_packages.is_empty() {
            self.install(&engine, &workspace, &detected_packages).await
        } else {
            String::new()
        };

        let invocation = ToolInvocation::new("RMarkdown Render", &engine, workspace.path())
            .args([
                "-e",
                "rmarkdown::render('notebook.Rmd', output_file='notebook.html')",
            ])
            .timeout(self.settings.timeout);
        let output = self.runner.run(&invocation).await;
        *logs = join_logs(&install_logs, &output.combined_logs());
        StageError::check(&self.settings.engine.name, &output, self.settings.timeout)?;

        let html_path = locate_render(&workspace).ok_or_else(|| StageError::MissingOutput {
            tool: self.settings.engine.name.clone(),
            expected: "HTML render".to_string(),
        })?;
        debug!(document = %id, html = %html_path.display(), "Found local render");

        let local_render = self.store.publish_file(id, &html_path, LOCAL_RENDER_FILE)?;
        self.store.publish_file(id, &source, SOURCE_FILE)?;
        let html = self.store.read_artifact(id, LOCAL_RENDER_FILE);

        Ok(RenderOutput {
            local_render,
            html,
            detected_packages,
            static_analysis,
        })
    }

    /// Install missing packages; failures are logged and ignored
    ///
    /// Returns the installer's output for the stage logs.
    async fn install(
        &self,
        engine: &std::path::Path,
        workspace: &Workspace,
        packages: &[String],
    ) -> String {
        info!(count = packages.len(), "Checking R packages");
        let invocation = ToolInvocation::new("Package install", engine, workspace.path())
            .arg("-e")
            .arg(install_script(packages, &self.settings.cran_repo))
            .timeout(self.settings.install_timeout);

        let output = self.runner.run(&invocation).await;
        if output.success() {
            debug!(output = %output.combined_logs(), "Package check finished");
        } else {
            warn!(
                exit_code = output.exit_code,
                "Package installation warning (proceeding anyway)"
            );
        }
        output.combined_logs()
    }
}

fn join_logs(first: &str, second: &str) -> String {
    match (first.trim().is_empty(), second.trim().is_empty()) {
        (true, _) => second.to_string(),
        (false, true) => first.to_string(),
        (false, false) => format!("{}\n{}", first.trim_end(), second),
    }
}

fn locate_render(workspace: &Workspace) -> Option<PathBuf> {
    let expected = workspace.join(RENDER_OUTPUT_FILE);
    if expected.is_file() {
        return Some(expected);
    }
    find_html_file(workspace.path())
}
