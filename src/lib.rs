//! repropack - reproducibility packages for R Markdown documents
//!
//! A document goes through a short pipeline: a static hazard scan, a local
//! render, a traced re-render that yields a container recipe, and a semantic
//! diff of the two renders. Everything a run produces lives under one
//! artifact directory per document.
//!
//! # Core Concepts
//!
//! - **Hazard scan**: pure pattern checks over the source for things that
//!   break reproducibility (unseeded randomness, absolute paths, secrets)
//! - **Stages**: render, trace and diff each drive one external tool and
//!   report a [`pipeline::StageResult`] with the captured logs
//! - **Build cache**: render + trace is skipped when the content digest
//!   matches the last complete build
//! - **Artifact store**: per-document directory holding the renders, the
//!   generated Dockerfile/Makefile/manifest and the downloadable zip
//!
//! # Example Usage
//!
//! ```
//! use repropack::scanner;
//!
//! let report = scanner::scan("```{r}\nx <- sample(1:10)\n```");
//! assert_eq!(report.total_issues, 1);
//! ```
//!
//! # Project Structure
//!
//! - [`scanner`]: static hazard rules
//! - [`pipeline`]: stages, build cache and per-document locking
//! - [`store`]: artifact directories, workspaces and packaging
//! - [`extractors`]: dependency metrics from the tracer output
//! - [`tools`]: external process execution
//! - [`service`]: orchestration plus execution history

pub mod cli;
pub mod config;
pub mod document;
pub mod extractors;
pub mod persistence;
pub mod pipeline;
pub mod progress;
pub mod scanner;
pub mod service;
pub mod store;
pub mod tools;
pub mod util;

pub use config::{ConfigError, ReproConfig};
pub use document::{DocumentId, DocumentIdError};
pub use extractors::{extract_metrics, DependencyMetrics, MetricsReport};
pub use persistence::{DocumentRepository, ExecutionRecord, ExecutionStatus, PersistenceError};
pub use pipeline::{BuildCache, BuildOutcome, Stage, StageError, StageResult};
pub use scanner::{HazardScanner, ScanReport};
pub use service::{ReproService, ServiceError};
pub use store::{ArtifactBundle, ArtifactStore, StoreError};
pub use util::{init_default, init_from_env, init_logging, LoggingConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
