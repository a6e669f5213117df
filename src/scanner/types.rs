use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of reproducibility hazard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HazardCategory {
    Randomness,
    Timestamp,
    Paths,
    ExternalData,
    Installation,
    Environment,
    Interactive,
    Security,
}

impl HazardCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            HazardCategory::Randomness => "randomness",
            HazardCategory::Timestamp => "timestamp",
            HazardCategory::Paths => "paths",
            HazardCategory::ExternalData => "external_data",
            HazardCategory::Installation => "installation",
            HazardCategory::Environment => "environment",
            HazardCategory::Interactive => "interactive",
            HazardCategory::Security => "security",
        }
    }
}

impl fmt::Display for HazardCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// One offending source line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineMatch {
    /// 1-based line number in the document
    pub line_number: usize,
    /// Trimmed line text, with secrets masked
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HazardIssue {
    pub category: HazardCategory,
    pub severity: Severity,
    pub title: String,
    pub detail: String,
    pub fix: String,
    pub lines: Vec<LineMatch>,
}

/// Result of scanning one document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanReport {
    pub issues: Vec<HazardIssue>,
    /// Number of offending line entries across all issues
    pub total_issues: usize,
}

impl ScanReport {
    pub fn new(issues: Vec<HazardIssue>) -> Self {
        let total_issues = issues.iter().map(|i| i.lines.len()).sum();
        Self {
            issues,
            total_issues,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn issue(&self, category: HazardCategory) -> Option<&HazardIssue> {
        self.issues.iter().find(|i| i.category == category)
    }

    pub fn highest_severity(&self) -> Option<Severity> {
        self.issues.iter().map(|i| i.severity).max()
    }
}
