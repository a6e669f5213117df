//! Configuration management for repropack
//!
//! Settings come from environment variables layered over built-in defaults.
//!
//! # Environment Variables
//!
//! - `REPROPACK_STORAGE_DIR`: root of the per-document artifact directories - default: "storage/notebooks"
//! - `REPROPACK_RENDER_BIN`: R interpreter - default: "R" (then `/usr/local/bin/R`, `/usr/bin/R`)
//! - `REPROPACK_TRACER_BIN`: dependency tracer - default: "/usr/local/bin/r4r" (then `/usr/bin/r4r`)
//! - `REPROPACK_DIFF_BIN`: render comparison tool - default: "/usr/local/bin/r-diff"
//! - `REPROPACK_RENDER_TIMEOUT`: seconds - default: "300"
//! - `REPROPACK_TRACE_TIMEOUT`: seconds - default: "600"
//! - `REPROPACK_DIFF_TIMEOUT`: seconds - default: "120"
//! - `REPROPACK_INSTALL_TIMEOUT`: seconds - default: "600"
//! - `REPROPACK_TRACER_HOME`: `HOME` given to the tracer - default: "/home/r4r"
//! - `REPROPACK_CRAN_REPO`: repository for package installs - default: Posit Package Manager (noble)
//! - `REPROPACK_INSTALL_PACKAGES`: pre-install detected packages (true|false) - default: "true"
//! - `REPROPACK_TRACE_MODE`: output|result - default: "output"
//! - `REPROPACK_LOG_LEVEL`: logging level - default: "info"
//!
//! # Example
//!
//! ```
//! use repropack::ReproConfig;
//!
//! let config = ReproConfig::default();
//! config.validate().expect("defaults are valid");
//! assert_eq!(config.render_settings().timeout.as_secs(), 300);
//! ```

use crate::pipeline::{DiffSettings, RenderSettings, TraceMode, TraceSettings};
use crate::tools::ToolSpec;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Default values for configuration
const DEFAULT_STORAGE_DIR: &str = "storage/notebooks";
const DEFAULT_RENDER_BIN: &str = "R";
const RENDER_FALLBACKS: &[&str] = &["/usr/local/bin/R", "/usr/bin/R"];
const DEFAULT_TRACER_BIN: &str = "/usr/local/bin/r4r";
const TRACER_FALLBACKS: &[&str] = &["/usr/bin/r4r"];
const DEFAULT_DIFF_BIN: &str = "/usr/local/bin/r-diff";
const DEFAULT_RENDER_TIMEOUT_SECS: u64 = 300;
const DEFAULT_TRACE_TIMEOUT_SECS: u64 = 600;
const DEFAULT_DIFF_TIMEOUT_SECS: u64 = 120;
const DEFAULT_INSTALL_TIMEOUT_SECS: u64 = 600;
const MAX_TIMEOUT_SECS: u64 = 3600;
const DEFAULT_TRACER_HOME: &str = "/home/r4r";
const DEFAULT_CRAN_REPO: &str = "https://packagemanager.posit.co/cran/__linux__/noble/latest";
const DEFAULT_LOG_LEVEL: &str = "info";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration validation failed
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    /// Failed to parse configuration value
    #[error("Failed to parse {field}: {error}")]
    ParseError { field: String, error: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReproConfig {
    /// Root directory holding one sub-directory per document
    pub storage_dir: PathBuf,

    pub render_bin: PathBuf,
    pub tracer_bin: PathBuf,
    pub diff_bin: PathBuf,

    pub render_timeout_secs: u64,
    pub trace_timeout_secs: u64,
    pub diff_timeout_secs: u64,
    pub install_timeout_secs: u64,

    pub tracer_home: PathBuf,
    pub cran_repo: String,
    pub install_packages: bool,
    pub trace_mode: TraceMode,

    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for ReproConfig {
    /// Built-in defaults, without looking at the environment
    fn default() -> Self {
        Self {
            storage_dir: PathBuf::from(DEFAULT_STORAGE_DIR),
            render_bin: PathBuf::from(DEFAULT_RENDER_BIN),
            tracer_bin: PathBuf::from(DEFAULT_TRACER_BIN),
            diff_bin: PathBuf::from(DEFAULT_DIFF_BIN),
            render_timeout_secs: DEFAULT_RENDER_TIMEOUT_SECS,
            trace_timeout_secs: DEFAULT_TRACE_TIMEOUT_SECS,
            diff_timeout_secs: DEFAULT_DIFF_TIMEOUT_SECS,
            install_timeout_secs: DEFAULT_INSTALL_TIMEOUT_SECS,
            tracer_home: PathBuf::from(DEFAULT_TRACER_HOME),
            cran_repo: DEFAULT_CRAN_REPO.to_string(),
            install_packages: true,
            trace_mode: TraceMode::default(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl ReproConfig {
    /// Defaults overridden by any `REPROPACK_*` variables that are set
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ParseError` when a variable is set to a value of
    /// the wrong type.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(dir) = env_path("REPROPACK_STORAGE_DIR") {
            config.storage_dir = dir;
        }
        if let Some(bin) = env_path("REPROPACK_RENDER_BIN") {
            config.render_bin = bin;
        }
        if let Some(bin) = env_path("REPROPACK_TRACER_BIN") {
            config.tracer_bin = bin;
        }
        if let Some(bin) = env_path("REPROPACK_DIFF_BIN") {
            config.diff_bin = bin;
        }
        if let Some(secs) = env_parse("REPROPACK_RENDER_TIMEOUT")? {
            config.render_timeout_secs = secs;
        }
        if let Some(secs) = env_parse("REPROPACK_TRACE_TIMEOUT")? {
            config.trace_timeout_secs = secs;
        }
        if let Some(secs) = env_parse("REPROPACK_DIFF_TIMEOUT")? {
            config.diff_timeout_secs = secs;
        }
        if let Some(secs) = env_parse("REPROPACK_INSTALL_TIMEOUT")? {
            config.install_timeout_secs = secs;
        }
        if let Some(home) = env_path("REPROPACK_TRACER_HOME") {
            config.tracer_home = home;
        }
        if let Ok(repo) = env::var("REPROPACK_CRAN_REPO") {
            config.cran_repo = repo;
        }
        if let Some(install) = env_parse("REPROPACK_INSTALL_PACKAGES")? {
            config.install_packages = install;
        }
        if let Some(mode) = env_parse("REPROPACK_TRACE_MODE")? {
            config.trace_mode = mode;
        }
        if let Ok(level) = env::var("REPROPACK_LOG_LEVEL") {
            config.log_level = level.to_lowercase();
        }

        Ok(config)
    }

    /// Validates the configuration
    ///
    /// Checks that:
    /// - Every timeout is between 1 second and 1 hour
    /// - The diff timeout is shorter than the trace timeout
    /// - Log level is valid
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if any validation fails
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, secs) in [
            ("Render", self.render_timeout_secs),
            ("Trace", self.trace_timeout_secs),
            ("Diff", self.diff_timeout_secs),
            ("Install", self.install_timeout_secs),
        ] {
            if secs == 0 {
                return Err(ConfigError::ValidationFailed(format!(
                    "{} timeout must be at least 1 second",
                    name
                )));
            }
            if secs > MAX_TIMEOUT_SECS {
                return Err(ConfigError::ValidationFailed(format!(
                    "{} timeout cannot exceed 1 hour",
                    name
                )));
            }
        }

        if self.diff_timeout_secs >= self.trace_timeout_secs {
            return Err(ConfigError::ValidationFailed(format!(
                "Diff timeout ({}s) must be shorter than trace timeout ({}s)",
                self.diff_timeout_secs, self.trace_timeout_secs
            )));
        }

        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::ValidationFailed(format!(
                    "Invalid log level: {}. Valid options: trace, debug, info, warn, error",
                    self.log_level
                )))
            }
        }

        Ok(())
    }

    pub fn render_settings(&self) -> RenderSettings {
        RenderSettings {
            engine: tool_spec("R", &self.render_bin, RENDER_FALLBACKS),
            timeout: Duration::from_secs(self.render_timeout_secs),
            install_packages: self.install_packages,
            install_timeout: Duration::from_secs(self.install_timeout_secs),
            cran_repo: self.cran_repo.clone(),
        }
    }

    pub fn trace_settings(&self) -> TraceSettings {
        TraceSettings {
            tracer: tool_spec("r4r", &self.tracer_bin, TRACER_FALLBACKS),
            engine_command: DEFAULT_RENDER_BIN.to_string(),
            timeout: Duration::from_secs(self.trace_timeout_secs),
            home: self.tracer_home.clone(),
            mode: self.trace_mode,
        }
    }

    pub fn diff_settings(&self) -> DiffSettings {
        DiffSettings {
            tool: tool_spec("r-diff", &self.diff_bin, &[]),
            timeout: Duration::from_secs(self.diff_timeout_secs),
        }
    }
}

/// Configured binary first, then the standard locations not already listed
fn tool_spec(name: &str, configured: &std::path::Path, fallbacks: &[&str]) -> ToolSpec {
    let mut candidates = vec![configured.to_path_buf()];
    for fallback in fallbacks.iter().map(PathBuf::from) {
        if !candidates.contains(&fallback) {
            candidates.push(fallback);
        }
    }
    ToolSpec::new(name, candidates)
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

fn env_parse<T>(key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::ParseError {
                field: key.to_string(),
                error: e.to_string(),
            }),
        _ => Ok(None),
    }
}

impl fmt::Display for ReproConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Repropack Configuration:")?;
        writeln!(f, "  Storage Dir: {}", self.storage_dir.display())?;
        writeln!(f, "  Render Binary: {}", self.render_bin.display())?;
        writeln!(f, "  Tracer Binary: {}", self.tracer_bin.display())?;
        writeln!(f, "  Diff Binary: {}", self.diff_bin.display())?;
        writeln!(
            f,
            "  Timeouts: render {}s, trace {}s, diff {}s, install {}s",
            self.render_timeout_secs,
            self.trace_timeout_secs,
            self.diff_timeout_secs,
            self.install_timeout_secs
        )?;
        writeln!(f, "  Tracer Home: {}", self.tracer_home.display())?;
        writeln!(f, "  Trace Mode: {}", self.trace_mode)?;
        writeln!(f, "  CRAN Repo: {}", self.cran_repo)?;
        writeln!(f, "  Install Packages: {}", self.install_packages)?;
        writeln!(f, "  Log Level: {}", self.log_level)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    /// Helper to temporarily set environment variables for testing
    struct EnvGuard {
        key: String,
        old_value: Option<String>,
    }

    impl EnvGuard {
        fn set(key: &str, value: &str) -> Self {
            let old_value = env::var(key).ok();
            env::set_var(key, value);
            Self {
                key: key.to_string(),
                old_value,
            }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            match &self.old_value {
                Some(v) => env::set_var(&self.key, v),
                None => env::remove_var(&self.key),
            }
        }
    }

    #[test]
    fn test_default_configuration() {
        let config = ReproConfig::default();

        assert_eq!(config.storage_dir, PathBuf::from(DEFAULT_STORAGE_DIR));
        assert_eq!(config.render_timeout_secs, 300);
        assert_eq!(config.trace_timeout_secs, 600);
        assert_eq!(config.diff_timeout_secs, 120);
        assert_eq!(config.trace_mode, TraceMode::Output);
        assert!(config.install_packages);
        assert!(config.validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_environment_variable_parsing() {
        let _guards = vec![
            EnvGuard::set("REPROPACK_STORAGE_DIR", "/srv/notebooks"),
            EnvGuard::set("REPROPACK_TRACER_BIN", "/opt/r4r/bin/r4r"),
            EnvGuard::set("REPROPACK_TRACE_TIMEOUT", "900"),
            EnvGuard::set("REPROPACK_INSTALL_PACKAGES", "false"),
            EnvGuard::set("REPROPACK_TRACE_MODE", "result"),
            EnvGuard::set("REPROPACK_LOG_LEVEL", "DEBUG"),
        ];

        let config = ReproConfig::from_env().unwrap();

        assert_eq!(config.storage_dir, PathBuf::from("/srv/notebooks"));
        assert_eq!(config.tracer_bin, PathBuf::from("/opt/r4r/bin/r4r"));
        assert_eq!(config.trace_timeout_secs, 900);
        assert!(!config.install_packages);
        assert_eq!(config.trace_mode, TraceMode::Result);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    #[serial]
    fn test_malformed_value_is_an_error() {
        let _guard = EnvGuard::set("REPROPACK_RENDER_TIMEOUT", "five minutes");
        let err = ReproConfig::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { ref field, .. } if field == "REPROPACK_RENDER_TIMEOUT"));
    }

    #[test]
    fn test_validation_invalid_timeout() {
        let config = ReproConfig {
            render_timeout_secs: 0,
            ..ReproConfig::default()
        };
        assert!(config.validate().is_err());

        let config = ReproConfig {
            install_timeout_secs: MAX_TIMEOUT_SECS + 1,
            ..ReproConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_diff_shorter_than_trace() {
        let config = ReproConfig {
            diff_timeout_secs: 600,
            trace_timeout_secs: 600,
            ..ReproConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("shorter than trace"));
    }

    #[test]
    fn test_validation_invalid_log_level() {
        let config = ReproConfig {
            log_level: "loud".to_string(),
            ..ReproConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_tool_fallbacks() {
        let config = ReproConfig::default();
        assert_eq!(
            config.render_settings().engine.candidates,
            vec![
                PathBuf::from("R"),
                PathBuf::from("/usr/local/bin/R"),
                PathBuf::from("/usr/bin/R")
            ]
        );
        assert_eq!(
            config.trace_settings().tracer.candidates,
            vec![
                PathBuf::from("/usr/local/bin/r4r"),
                PathBuf::from("/usr/bin/r4r")
            ]
        );

        let config = ReproConfig {
            render_bin: PathBuf::from("/usr/bin/R"),
            ..ReproConfig::default()
        };
        assert_eq!(config.render_settings().engine.candidates.len(), 2);
    }

    #[test]
    fn test_config_display() {
        let display = format!("{}", ReproConfig::default());
        assert!(display.contains("Repropack Configuration:"));
        assert!(display.contains("Trace Mode: output"));
    }
}
