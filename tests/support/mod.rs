//! Shared fixtures for the integration tests

#![allow(dead_code)]

use repropack::tools::{MockToolRunner, ToolInvocation, ToolOutput};
use repropack::ReproConfig;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const NOTEBOOK: &str = r#"---
title: "Penguins"
output: html_document
---

```{r}
library(ggplot2)
set.seed(1)
summary(rnorm(10))
```
"#;

pub const INSTALL_SCRIPT: &str = r#"install.packages("remotes")
remotes::install_version("rmarkdown", "2.25")
remotes::install_version("ggplot2", "3.4.4")
"#;

pub const DOCKERFILE: &str = "FROM rocker/r-ver:4.3.1\n\
RUN apt-get update && apt-get install -y \\\n    libxml2-dev \\\n    pandoc\n";

pub const MANIFEST: &str = r#"{"system_packages": ["libxml2-dev", "pandoc"]}"#;

/// Config pointing at tools named `R`, `r4r` and `r-diff` under `bin_dir`
pub fn config(storage: &Path, bin_dir: &Path) -> ReproConfig {
    ReproConfig {
        storage_dir: storage.to_path_buf(),
        render_bin: bin_dir.join("R"),
        tracer_bin: bin_dir.join("r4r"),
        diff_bin: bin_dir.join("r-diff"),
        render_timeout_secs: 30,
        trace_timeout_secs: 30,
        diff_timeout_secs: 10,
        install_timeout_secs: 10,
        install_packages: false,
        ..ReproConfig::default()
    }
}

/// Mock runner where every tool succeeds and writes what the real one would
pub fn working_tools() -> Arc<MockToolRunner> {
    let mock = Arc::new(MockToolRunner::new());
    mock.on("R", render_ok);
    mock.on("r4r", trace_ok);
    mock.on("r-diff", diff_ok);
    mock
}

pub fn render_ok(inv: &ToolInvocation) -> ToolOutput {
    fs::write(
        inv.cwd.join("notebook.html"),
        "<html><body><h1>Penguins</h1></body></html>",
    )
    .unwrap();
    ToolOutput::success_with("processing file: notebook.Rmd\nOutput created: notebook.html")
}

pub fn trace_ok(inv: &ToolInvocation) -> ToolOutput {
    let out = PathBuf::from(inv.flag_value("--output").expect("--output flag"));
    fs::create_dir_all(out.join("result")).unwrap();
    fs::write(out.join("Dockerfile"), DOCKERFILE).unwrap();
    fs::write(out.join("Makefile"), "all:\n\tdocker build -t notebook .\n").unwrap();
    fs::write(out.join("manifest.json"), MANIFEST).unwrap();
    fs::write(out.join("install_r_packages.R"), INSTALL_SCRIPT).unwrap();
    fs::write(
        out.join("result").join("notebook.html"),
        "<html><body><h1>Penguins</h1><p>container</p></body></html>",
    )
    .unwrap();
    ToolOutput::success_with("r4r: traced 42 files")
}

pub fn diff_ok(inv: &ToolInvocation) -> ToolOutput {
    let out = inv.flag_value("-output").expect("-output flag");
    fs::write(out, "<html><body>1 difference</body></html>").unwrap();
    ToolOutput::success_with("")
}
