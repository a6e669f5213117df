//! Static reproducibility hazard scanning
//!
//! The scanner is pure: the same source text always produces the same
//! [`ScanReport`], and scanning has no side effects. Lines whose first
//! non-blank character is `#` are treated as comments and never reported.
//!
//! # Example
//!
//! ```
//! use repropack::scanner::{HazardCategory, HazardScanner};
//!
//! let report = HazardScanner::new().scan("x <- rnorm(10)\nsetwd('/tmp')");
//! assert_eq!(report.issues.len(), 3);
//! assert!(report.issue(HazardCategory::Randomness).is_some());
//! ```

pub mod rules;
pub mod types;

pub use rules::{HazardRule, SourceLine, SECRET_MASK};
pub use types::{HazardCategory, HazardIssue, LineMatch, ScanReport, Severity};

use std::panic::{self, AssertUnwindSafe};
use std::sync::OnceLock;
use tracing::{debug, warn};

pub struct HazardScanner {
    rules: Vec<Box<dyn HazardRule>>,
}

impl HazardScanner {
    pub fn new() -> Self {
        Self {
            rules: rules::default_rules(),
        }
    }

    pub fn with_rules(rules: Vec<Box<dyn HazardRule>>) -> Self {
        Self { rules }
    }

    /// Scan source text for hazards
    ///
    /// Never fails: a rule that panics degrades the whole scan to an empty
    /// report, which callers treat as "scan again later".
    pub fn scan(&self, content: &str) -> ScanReport {
        match panic::catch_unwind(AssertUnwindSafe(|| self.run_rules(content))) {
            Ok(report) => report,
            Err(_) => {
                warn!("Hazard scan aborted, returning empty report");
                ScanReport::default()
            }
        }
    }

    fn run_rules(&self, content: &str) -> ScanReport {
        if content.is_empty() {
            return ScanReport::default();
        }

        let lines = SourceLine::split(content);
        let issues: Vec<HazardIssue> = self
            .rules
            .iter()
            .filter_map(|rule| {
                let issue = rule.check(&lines);
                if let Some(issue) = &issue {
                    debug!(rule = rule.name(), lines = issue.lines.len(), "Hazard found");
                }
                issue
            })
            .collect();

        ScanReport::new(issues)
    }
}

impl Default for HazardScanner {
    fn default() -> Self {
        Self::new()
    }
}

/// Scan with the shared default rule set
pub fn scan(content: &str) -> ScanReport {
    static SCANNER: OnceLock<HazardScanner> = OnceLock::new();
    SCANNER.get_or_init(HazardScanner::new).scan(content)
}
