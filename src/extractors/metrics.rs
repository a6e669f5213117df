//! Dependency metrics over a tracer output tree

use super::parsers::{self, PackageSpec, ParseOutcome};
use crate::store::layout::{ACCESS_ARCHIVE_FILE, DOCKERFILE, INSTALL_SCRIPT_FILE};
use serde::Serialize;
use std::fs::{self, File};
use std::io;
use std::path::Path;
use tracing::{debug, warn};

/// What the traced run depends on
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DependencyMetrics {
    /// Pinned R packages, rendered as `name (version)`
    pub r_packages: Vec<PackageSpec>,
    pub system_libs: Vec<String>,
    pub files_accessed: usize,
}

/// Metrics plus whatever could not be parsed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsReport {
    #[serde(flatten)]
    pub metrics: DependencyMetrics,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Collect metrics from the tracer's output directory
///
/// The three extractions are independent: a missing or malformed input
/// leaves its field at the default and adds a warning, without affecting
/// the others.
pub fn extract_metrics(output_dir: &Path) -> MetricsReport {
    let mut warnings = Vec::new();

    let r_packages = collect(
        read_text(output_dir, INSTALL_SCRIPT_FILE),
        |text: &String| parsers::parse_install_script(text),
        &mut warnings,
    );
    let system_libs = collect(
        read_text(output_dir, DOCKERFILE),
        |text: &String| parsers::parse_system_libs(text),
        &mut warnings,
    )
    .into_iter()
    .collect();
    let files_accessed = collect(
        open_file(output_dir, ACCESS_ARCHIVE_FILE),
        |file: &File| parsers::count_entries(file),
        &mut warnings,
    );

    let metrics = DependencyMetrics {
        r_packages,
        system_libs,
        files_accessed,
    };
    debug!(
        r_packages = metrics.r_packages.len(),
        system_libs = metrics.system_libs.len(),
        files_accessed = metrics.files_accessed,
        "Extracted dependency metrics"
    );

    MetricsReport { metrics, warnings }
}

fn collect<I, T: Default>(
    input: Result<Option<I>, String>,
    parse: impl FnOnce(&I) -> ParseOutcome<T>,
    warnings: &mut Vec<String>,
) -> T {
    match input {
        Ok(Some(input)) => {
            let outcome = parse(&input);
            for warning in &outcome.warnings {
                warn!(warning = %warning, "Metrics extraction degraded");
            }
            warnings.extend(outcome.warnings);
            outcome.value
        }
        Ok(None) => T::default(),
        Err(warning) => {
            warn!(warning = %warning, "Metrics extraction degraded");
            warnings.push(warning);
            T::default()
        }
    }
}

fn open_file(dir: &Path, name: &str) -> Result<Option<File>, String> {
    match File::open(dir.join(name)) {
        Ok(file) => Ok(Some(file)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(format!("Failed to open {}: {}", name, e)),
    }
}

fn read_bytes(dir: &Path, name: &str) -> Result<Option<Vec<u8>>, String> {
    match fs::read(dir.join(name)) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(format!("Failed to read {}: {}", name, e)),
    }
}

fn read_text(dir: &Path, name: &str) -> Result<Option<String>, String> {
    read_bytes(dir, name).map(|bytes| bytes.map(|b| String::from_utf8_lossy(&b).into_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_missing_files_give_defaults() {
        let dir = TempDir::new().unwrap();
        let report = extract_metrics(dir.path());
        assert_eq!(report.metrics, DependencyMetrics::default());
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_extractions_are_independent() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(INSTALL_SCRIPT_FILE),
            "remotes::install_version(\"dplyr\", \"1.1.4\")\n",
        )
        .unwrap();
        fs::write(
            dir.path().join(DOCKERFILE),
            "RUN apt-get install -y pandoc libxml2-dev\n",
        )
        .unwrap();
        fs::write(dir.path().join(ACCESS_ARCHIVE_FILE), vec![0x41; 1024]).unwrap();

        let report = extract_metrics(dir.path());
        assert_eq!(report.metrics.r_packages.len(), 1);
        assert_eq!(report.metrics.r_packages[0].to_string(), "dplyr (1.1.4)");
        assert_eq!(report.metrics.system_libs, vec!["libxml2-dev", "pandoc"]);
        assert_eq!(report.metrics.files_accessed, 0);
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn test_counts_archive_members_from_disk() {
        let dir = TempDir::new().unwrap();
        let file = fs::File::create(dir.path().join(ACCESS_ARCHIVE_FILE)).unwrap();
        let mut builder = tar::Builder::new(file);
        for name in ["data/penguins.csv", "R/plot.R"] {
            let mut header = tar::Header::new_gnu();
            header.set_size(4);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, &b"data"[..]).unwrap();
        }
        builder.finish().unwrap();
        drop(builder);

        let report = extract_metrics(dir.path());
        assert_eq!(report.metrics.files_accessed, 2);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_report_serialization_is_flat() {
        let report = MetricsReport::default();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"r_packages": [], "system_libs": [], "files_accessed": 0})
        );
    }
}
