// Best-effort extraction of dependency information
//
// Extractors read the files the tracer leaves behind and turn them into
// metrics. Nothing here ever fails a stage: unreadable or malformed inputs
// degrade to default values plus warnings.

pub mod metrics;
pub mod parsers;

pub use metrics::{extract_metrics, DependencyMetrics, MetricsReport};
pub use parsers::{PackageSpec, ParseOutcome};
