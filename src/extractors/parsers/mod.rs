// Parsers for the semi-structured files the tracer writes
//
// Each parser is a pure function over raw text or bytes. None of them fail:
// they return the best value they could recover plus a (possibly empty)
// list of warnings describing what was skipped.

pub mod archive;
pub mod dockerfile;
pub mod install_script;
pub mod manifest;

pub use archive::count_entries;
pub use dockerfile::parse_system_libs;
pub use install_script::{parse_install_script, PackageSpec};
pub use manifest::{parse_manifest, system_packages};

/// Best-effort parse result
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParseOutcome<T> {
    pub value: T,
    pub warnings: Vec<String>,
}

impl<T> ParseOutcome<T> {
    pub fn clean(value: T) -> Self {
        Self {
            value,
            warnings: Vec::new(),
        }
    }

    pub fn degraded(value: T, warning: impl Into<String>) -> Self {
        Self {
            value,
            warnings: vec![warning.into()],
        }
    }
}
