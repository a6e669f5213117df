//! Output formatting for multiple formats
//!
//! JSON and YAML emit the serialized value as is. Human output is a short
//! summary; rendered HTML is never printed, only where it was stored.

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

use crate::pipeline::{
    BuildOutcome, DiffOutput, RenderOutput, StageError, StageResult, TraceOutput,
};
use crate::scanner::ScanReport;

/// Output format enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON format (machine-readable)
    Json,
    /// YAML format
    Yaml,
    /// Human-readable formatted text
    Human,
}

const RULE: &str = "\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}";

pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format_scan(&self, report: &ScanReport) -> Result<String> {
        match self.format {
            OutputFormat::Human => Ok(scan_human(report)),
            _ => self.serialized(report, "scan report"),
        }
    }

    pub fn format_render(&self, result: &StageResult<RenderOutput>) -> Result<String> {
        match self.format {
            OutputFormat::Human => Ok(stage_human(result, |out, s| {
                s.push_str(&format!("Local render:  {}\n", out.local_render.display()));
                if out.detected_packages.is_empty() {
                    s.push_str("Packages:      (none detected)\n");
                } else {
                    s.push_str(&format!("Packages:      {}\n", out.detected_packages.join(", ")));
                }
                s.push('\n');
                s.push_str(&scan_human(&out.static_analysis));
            })),
            _ => self.serialized(result, "render result"),
        }
    }

    pub fn format_trace(&self, result: &StageResult<TraceOutput>) -> Result<String> {
        match self.format {
            OutputFormat::Human => Ok(stage_human(result, trace_human)),
            _ => self.serialized(result, "trace result"),
        }
    }

    pub fn format_diff(&self, result: &StageResult<DiffOutput>) -> Result<String> {
        match self.format {
            OutputFormat::Human => Ok(stage_human(result, |out, s| {
                s.push_str(&format!("Semantic diff: {}\n", out.semantic_diff.display()));
            })),
            _ => self.serialized(result, "diff result"),
        }
    }

    pub fn format_build(&self, outcome: &BuildOutcome) -> Result<String> {
        match self.format {
            OutputFormat::Human => Ok(build_human(outcome)),
            _ => self.serialized(outcome, "build outcome"),
        }
    }

    pub fn format_package(&self, zip_path: &Path) -> Result<String> {
        match self.format {
            OutputFormat::Human => Ok(format!("\u{2713} Package written to {}\n", zip_path.display())),
            _ => self.serialized(&serde_json::json!({ "package": zip_path }), "package path"),
        }
    }

    fn serialized<T: Serialize + ?Sized>(&self, value: &T, what: &str) -> Result<String> {
        match self.format {
            OutputFormat::Yaml => serde_yaml::to_string(value)
                .with_context(|| format!("Failed to serialize {} to YAML", what)),
            _ => serde_json::to_string_pretty(value)
                .with_context(|| format!("Failed to serialize {} to JSON", what)),
        }
    }
}

fn scan_human(report: &ScanReport) -> String {
    let mut output = String::new();
    if report.is_clean() {
        output.push_str("\u{2713} No reproducibility hazards found\n");
        return output;
    }

    output.push_str(&format!(
        "\u{26A0} {} reproducibility hazard(s) on {} line(s)\n{}\n\n",
        report.issues.len(),
        report.total_issues,
        RULE
    ));
    for issue in &report.issues {
        output.push_str(&format!("[{}] {}\n", issue.severity, issue.title));
        output.push_str(&format!("  {}\n", issue.detail));
        for line in &issue.lines {
            output.push_str(&format!("  {:>4} \u{2502} {}\n", line.line_number, line.code));
        }
        output.push_str(&format!("  Fix: {}\n\n", issue.fix));
    }
    output
}

fn stage_human<T>(result: &StageResult<T>, payload: impl FnOnce(&T, &mut String)) -> String {
    let mut output = String::new();
    match &result.outcome {
        Ok(out) => {
            output.push_str(&format!(
                "\u{2713} {} succeeded in {}ms\n{}\n\n",
                result.stage,
                result.duration.as_millis(),
                RULE
            ));
            payload(out, &mut output);
        }
        Err(e) => {
            output.push_str(&failure_human(result.stage.as_str(), e));
            if !result.logs.trim().is_empty() {
                output.push_str("\nTool output:\n");
                output.push_str(result.logs.trim_end());
                output.push('\n');
            }
        }
    }
    output
}

fn failure_human(stage: &str, error: &StageError) -> String {
    format!("\u{2717} {} failed\n\n{}\n", stage, error.help_message())
}

fn trace_human(out: &TraceOutput, s: &mut String) {
    s.push_str(&format!("Container render: {}\n", out.container_render.display()));
    s.push_str(&format!(
        "Package:          {}\n\n",
        if out.package_ready { "ready" } else { "not written" }
    ));

    let metrics = &out.metrics.metrics;
    s.push_str("Dependencies:\n");
    s.push_str(&format!("\u{251C}\u{2500} R packages:     {}\n", metrics.r_packages.len()));
    for spec in &metrics.r_packages {
        s.push_str(&format!("\u{2502}    {}\n", spec));
    }
    s.push_str(&format!("\u{251C}\u{2500} System libs:    {}\n", metrics.system_libs.len()));
    for lib in &metrics.system_libs {
        s.push_str(&format!("\u{2502}    {}\n", lib));
    }
    s.push_str(&format!("\u{2514}\u{2500} Files accessed: {}\n", metrics.files_accessed));

    if !out.metrics.warnings.is_empty() {
        s.push_str("\n\u{26A0} Warnings:\n");
        for warning in &out.metrics.warnings {
            s.push_str(&format!("  - {}\n", warning));
        }
    }
}

fn build_human(outcome: &BuildOutcome) -> String {
    let mut output = String::new();
    if outcome.cached {
        output.push_str(&format!(
            "\u{2713} Up to date (content {})\n",
            &outcome.content_hash[..outcome.content_hash.len().min(12)]
        ));
        return output;
    }

    if let Some((stage, error)) = outcome.failure() {
        output.push_str(&failure_human(stage.as_str(), error));
        let logs = match stage {
            crate::pipeline::Stage::Render => outcome.render.as_ref().map(|r| r.logs.as_str()),
            _ => outcome.trace.as_ref().map(|t| t.logs.as_str()),
        };
        if let Some(logs) = logs.filter(|l| !l.trim().is_empty()) {
            output.push_str("\nTool output:\n");
            output.push_str(logs.trim_end());
            output.push('\n');
        }
        return output;
    }

    output.push_str(&format!("\u{2713} Build complete\n{}\n\n", RULE));
    if let Some(trace) = outcome.trace.as_ref().and_then(|t| t.payload()) {
        trace_human(trace, &mut output);
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{MissingArtifact, Stage};
    use crate::scanner;
    use std::path::PathBuf;
    use std::time::Duration;

    #[test]
    fn test_scan_human_clean_and_dirty() {
        let formatter = OutputFormatter::new(OutputFormat::Human);
        let clean = formatter.format_scan(&scanner::scan("x <- 1")).unwrap();
        assert!(clean.contains("No reproducibility hazards"));

        let dirty = formatter
            .format_scan(&scanner::scan("setwd('/home/me')"))
            .unwrap();
        assert!(dirty.contains("[high]"));
        assert!(dirty.contains("setwd('/home/me')"));
    }

    #[test]
    fn test_scan_json() {
        let formatter = OutputFormatter::new(OutputFormat::Json);
        let json = formatter.format_scan(&scanner::scan("View(df)")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["total_issues"], 1);
    }

    #[test]
    fn test_failed_stage_human_shows_help_and_logs() {
        let result: StageResult<DiffOutput> = StageResult {
            stage: Stage::Diff,
            logs: "r-diff: cannot open file".into(),
            duration: Duration::from_millis(3),
            outcome: Err(StageError::MissingArtifact(MissingArtifact::ContainerRender)),
        };
        let text = OutputFormatter::new(OutputFormat::Human)
            .format_diff(&result)
            .unwrap();
        assert!(text.contains("diff failed"));
        assert!(text.contains("Container HTML not found"));
        assert!(text.contains("cannot open file"));
    }

    #[test]
    fn test_package_yaml() {
        let text = OutputFormatter::new(OutputFormat::Yaml)
            .format_package(&PathBuf::from("/srv/1/reproducibility_package.zip"))
            .unwrap();
        assert!(text.contains("package: /srv/1/reproducibility_package.zip"));
    }
}
