//! Reproducibility build pipeline
//!
//! Three stages, each driving one external tool:
//!
//! 1. [`RenderStage`]: renders the document on the host
//! 2. [`TraceStage`]: re-renders it under the dependency tracer and
//!    publishes the Dockerfile, Makefile, manifest and package zip
//! 3. [`DiffStage`]: compares the two renders
//!
//! [`BuildCache`] gates render + trace behind a content digest.

pub mod cache;
pub mod diff;
pub mod locks;
pub mod packages;
pub mod render;
pub mod stage;
pub mod trace;

pub use cache::{content_digest, BuildCache, BuildOutcome};
pub use diff::{DiffOutput, DiffSettings, DiffStage};
pub use locks::{DocumentGuard, DocumentLocks};
pub use packages::{detect_packages, install_script};
pub use render::{RenderOutput, RenderSettings, RenderStage};
pub use stage::{MissingArtifact, Stage, StageError, StageResult};
pub use trace::{TraceMode, TraceOutput, TraceSettings, TraceStage};
