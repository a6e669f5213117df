//! Hazard detection rules
//!
//! Each rule looks at the whole document and yields at most one aggregated
//! issue listing every offending line.

use super::types::{HazardCategory, HazardIssue, LineMatch, Severity};
use regex::Regex;

/// Replacement for credential-shaped spans in reported snippets
pub const SECRET_MASK: &str = "***SECRET***";

/// A line of the document with its 1-based number
#[derive(Debug, Clone, Copy)]
pub struct SourceLine<'a> {
    pub number: usize,
    pub text: &'a str,
}

impl<'a> SourceLine<'a> {
    pub fn split(content: &'a str) -> Vec<SourceLine<'a>> {
        content
            .split('\n')
            .enumerate()
            .map(|(i, text)| SourceLine { number: i + 1, text })
            .collect()
    }

    pub fn is_comment(&self) -> bool {
        self.text.trim_start().starts_with('#')
    }

    pub fn code(&self) -> &'a str {
        self.text.trim()
    }

    fn to_match(self) -> LineMatch {
        LineMatch {
            line_number: self.number,
            code: self.code().to_string(),
        }
    }
}

pub trait HazardRule: Send + Sync {
    fn name(&self) -> &'static str;
    fn check(&self, lines: &[SourceLine<'_>]) -> Option<HazardIssue>;
}

/// Static description shared by every issue a rule emits
#[derive(Debug, Clone, Copy)]
pub struct IssueTemplate {
    pub category: HazardCategory,
    pub severity: Severity,
    pub title: &'static str,
    pub detail: &'static str,
    pub fix: &'static str,
}

impl IssueTemplate {
    fn issue(&self, lines: Vec<LineMatch>) -> Option<HazardIssue> {
        if lines.is_empty() {
            return None;
        }
        Some(HazardIssue {
            category: self.category,
            severity: self.severity,
            title: self.title.to_string(),
            detail: self.detail.to_string(),
            fix: self.fix.to_string(),
            lines,
        })
    }
}

fn code_lines<'s, 'a>(lines: &'s [SourceLine<'a>]) -> impl Iterator<Item = &'s SourceLine<'a>> {
    lines.iter().filter(|l| !l.is_comment())
}

/// Any line matching `pattern` is reported
pub struct PatternRule {
    name: &'static str,
    template: IssueTemplate,
    pattern: Regex,
}

impl PatternRule {
    pub fn new(name: &'static str, template: IssueTemplate, pattern: &str) -> Self {
        Self {
            name,
            template,
            pattern: Regex::new(pattern).expect("valid regex"),
        }
    }
}

impl HazardRule for PatternRule {
    fn name(&self) -> &'static str {
        self.name
    }

    fn check(&self, lines: &[SourceLine<'_>]) -> Option<HazardIssue> {
        let found = code_lines(lines)
            .filter(|l| self.pattern.is_match(l.text))
            .map(|l| l.to_match())
            .collect();
        self.template.issue(found)
    }
}

/// Random number generation without a seed anywhere in the document
pub struct RandomSeedRule {
    template: IssueTemplate,
    calls: Regex,
}

impl RandomSeedRule {
    const SEED_CALL: &'static str = "set.seed";

    pub fn new() -> Self {
        Self {
            template: IssueTemplate {
                category: HazardCategory::Randomness,
                severity: Severity::High,
                title: "Missing set.seed()",
                detail: "Random functions detected without a seed.",
                fix: "Add set.seed(123) at the start.",
            },
            calls: Regex::new(r"\b(?:sample|rnorm|runif|rbinom|sample_n)\s*\(")
                .expect("valid regex"),
        }
    }
}

impl Default for RandomSeedRule {
    fn default() -> Self {
        Self::new()
    }
}

impl HazardRule for RandomSeedRule {
    fn name(&self) -> &'static str {
        "RandomSeed"
    }

    fn check(&self, lines: &[SourceLine<'_>]) -> Option<HazardIssue> {
        if lines.iter().any(|l| l.text.contains(Self::SEED_CALL)) {
            return None;
        }
        let found = code_lines(lines)
            .filter(|l| self.calls.is_match(l.text))
            .map(|l| l.to_match())
            .collect();
        self.template.issue(found)
    }
}

/// Quoted strings starting at a filesystem root or drive letter
pub struct AbsolutePathRule {
    template: IssueTemplate,
    pattern: Regex,
}

impl AbsolutePathRule {
    pub fn new() -> Self {
        Self {
            template: IssueTemplate {
                category: HazardCategory::Paths,
                severity: Severity::High,
                title: "Absolute file paths",
                detail: "Hard-coded system paths won't work on other machines.",
                fix: "Use relative paths or the 'here' package.",
            },
            pattern: Regex::new(r#"["'](?:[a-zA-Z]:[\\/]|[\\/])[^"']+["']"#)
                .expect("valid regex"),
        }
    }

    fn is_package_include(text: &str) -> bool {
        text.contains("library(") || text.contains("require(")
    }

    fn is_url(matched: &str) -> bool {
        matched.contains("://") || matched.contains("http")
    }
}

impl Default for AbsolutePathRule {
    fn default() -> Self {
        Self::new()
    }
}

impl HazardRule for AbsolutePathRule {
    fn name(&self) -> &'static str {
        "AbsolutePath"
    }

    fn check(&self, lines: &[SourceLine<'_>]) -> Option<HazardIssue> {
        let mut found = Vec::new();
        for line in code_lines(lines).filter(|l| !Self::is_package_include(l.text)) {
            for m in self.pattern.find_iter(line.text) {
                if !Self::is_url(m.as_str()) {
                    found.push(line.to_match());
                }
            }
        }
        self.template.issue(found)
    }
}

/// Credential-shaped literals, reported with the secret masked
pub struct SecretRule {
    template: IssueTemplate,
    patterns: Vec<Regex>,
}

impl SecretRule {
    pub fn new() -> Self {
        let patterns = [
            r"sk_live_[0-9a-zA-Z]{20,}",
            r#"(?:api_key|access_token|secret)\s*=\s*['"][a-zA-Z0-9_\-]{20,}['"]"#,
        ];
        Self {
            template: IssueTemplate {
                category: HazardCategory::Security,
                severity: Severity::Critical,
                title: "Potential API Key / Secret",
                detail: "Hardcoded secrets are a security risk.",
                fix: "Use environment variables: Sys.getenv('MY_KEY').",
            },
            patterns: patterns
                .iter()
                .map(|p| Regex::new(p).expect("valid regex"))
                .collect(),
        }
    }

    /// Snippet with every secret masked, plus how many patterns hit it
    fn mask(&self, code: &str) -> (String, usize) {
        let mut masked = code.to_string();
        let mut hits = 0;
        for pattern in &self.patterns {
            if pattern.is_match(code) {
                hits += 1;
                masked = pattern.replace_all(&masked, SECRET_MASK).into_owned();
            }
        }
        (masked, hits)
    }
}

impl Default for SecretRule {
    fn default() -> Self {
        Self::new()
    }
}

impl HazardRule for SecretRule {
    fn name(&self) -> &'static str {
        "Secret"
    }

    fn check(&self, lines: &[SourceLine<'_>]) -> Option<HazardIssue> {
        let mut found = Vec::new();
        // One entry per pattern that hits the line, each fully masked
        for line in code_lines(lines) {
            let (code, hits) = self.mask(line.code());
            for _ in 0..hits {
                found.push(LineMatch {
                    line_number: line.number,
                    code: code.clone(),
                });
            }
        }
        self.template.issue(found)
    }
}

/// The full rule set, in report order
pub fn default_rules() -> Vec<Box<dyn HazardRule>> {
    vec![
        Box::new(RandomSeedRule::new()),
        Box::new(PatternRule::new(
            "Timestamp",
            IssueTemplate {
                category: HazardCategory::Timestamp,
                severity: Severity::Medium,
                title: "Time-dependent code",
                detail: "Uses current system time/date.",
                fix: "Use fixed dates or pass date as a parameter.",
            },
            r"Sys\.(?:time|Date|timezone)",
        )),
        Box::new(AbsolutePathRule::new()),
        Box::new(PatternRule::new(
            "ExternalData",
            IssueTemplate {
                category: HazardCategory::ExternalData,
                severity: Severity::Medium,
                title: "External data sources",
                detail: "Downloads data from URLs which might break.",
                fix: "Include data in the repo or use versioned URLs.",
            },
            r"download\.file|url\(",
        )),
        Box::new(PatternRule::new(
            "PackageInstall",
            IssueTemplate {
                category: HazardCategory::Installation,
                severity: Severity::High,
                title: "Hardcoded Package Install",
                detail: "Scripts should not install packages directly.",
                fix: "Remove install.packages(). Rely on Docker/renv.",
            },
            r"install\.packages\s*\(",
        )),
        Box::new(PatternRule::new(
            "WorkingDirectory",
            IssueTemplate {
                category: HazardCategory::Environment,
                severity: Severity::High,
                title: "Changing Working Directory",
                detail: "setwd() breaks reproducibility on other computers.",
                fix: "Use relative paths or project roots.",
            },
            r"setwd\s*\(",
        )),
        Box::new(PatternRule::new(
            "Interactive",
            IssueTemplate {
                category: HazardCategory::Interactive,
                severity: Severity::High,
                title: "Interactive Command Detected",
                detail: "Commands like View() stop execution in Docker.",
                fix: "Remove interactive commands.",
            },
            r"\b(?:View|browser|edit|file\.choose)\s*\(",
        )),
        Box::new(SecretRule::new()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(rule: &dyn HazardRule, content: &str) -> Option<HazardIssue> {
        rule.check(&SourceLine::split(content))
    }

    #[test]
    fn test_source_lines_are_one_based() {
        let lines = SourceLine::split("a\nb\n  # c");
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].number, 1);
        assert_eq!(lines[2].number, 3);
        assert!(lines[2].is_comment());
        assert_eq!(lines[2].code(), "# c");
    }

    #[test]
    fn test_random_lines_aggregated() {
        let rule = RandomSeedRule::new();
        let issue = check(&rule, "x <- rnorm(10)\ny <- 1\nz <- sample(1:5)").unwrap();
        assert_eq!(issue.category, HazardCategory::Randomness);
        assert_eq!(issue.severity, Severity::High);
        let numbers: Vec<_> = issue.lines.iter().map(|l| l.line_number).collect();
        assert_eq!(numbers, vec![1, 3]);
    }

    #[test]
    fn test_seed_anywhere_suppresses_randomness() {
        let rule = RandomSeedRule::new();
        let content = "x <- rnorm(10)\ny <- runif(3)\nset.seed(42)\nz <- rbinom(1, 1, 0.5)";
        assert!(check(&rule, content).is_none());
    }

    #[test]
    fn test_random_word_boundary() {
        let rule = RandomSeedRule::new();
        assert!(check(&rule, "resample(x)").is_none());
        assert!(check(&rule, "dplyr::sample_n(df, 3)").is_some());
    }

    #[test]
    fn test_absolute_paths() {
        let rule = AbsolutePathRule::new();
        let content = r#"df <- read.csv("/home/user/data.csv")
w <- read.csv('C:\Users\me\file.csv')
ok <- read.csv("data/file.csv")"#;
        let issue = check(&rule, content).unwrap();
        let numbers: Vec<_> = issue.lines.iter().map(|l| l.line_number).collect();
        assert_eq!(numbers, vec![1, 2]);
    }

    #[test]
    fn test_absolute_paths_skip_urls_and_includes() {
        let rule = AbsolutePathRule::new();
        let content = r#"library("/opt/pkgs/foo")
u <- "http://example.com/data.csv"
v <- "//cdn/http/data""#;
        assert!(check(&rule, content).is_none());
    }

    #[test]
    fn test_absolute_paths_one_entry_per_match() {
        let rule = AbsolutePathRule::new();
        let issue = check(&rule, r#"file.copy("/tmp/a", "/tmp/b")"#).unwrap();
        assert_eq!(issue.lines.len(), 2);
    }

    #[test]
    fn test_secret_masked() {
        let rule = SecretRule::new();
        let content = "api_key = \"abcdefghijklmnopqrstuvwxyz\"\nstripe <- \"sk_live_ABCDEFGHIJKLMNOPQRSTUV\"";
        let issue = check(&rule, content).unwrap();
        assert_eq!(issue.severity, Severity::Critical);
        assert_eq!(issue.lines.len(), 2);
        for line in &issue.lines {
            assert!(line.code.contains(SECRET_MASK));
            assert!(!line.code.contains("abcdefghijklmnopqrstuvwxyz"));
            assert!(!line.code.contains("sk_live_ABCDEFGHIJKLMNOPQRSTUV"));
        }
        assert_eq!(issue.lines[0].code, SECRET_MASK);
    }

    #[test]
    fn test_secret_reported_per_matching_pattern() {
        let rule = SecretRule::new();
        let content = "keys <- c(api_key = \"abcdefghijklmnopqrstuvwxyz\", \"sk_live_ABCDEFGHIJKLMNOPQRSTUV\")\nx <- 1";
        let issue = check(&rule, content).unwrap();
        assert_eq!(issue.lines.len(), 2);
        assert!(issue.lines.iter().all(|l| l.line_number == 1));
        for line in &issue.lines {
            assert!(!line.code.contains("abcdefghijklmnopqrstuvwxyz"));
            assert!(!line.code.contains("sk_live_"));
        }
    }

    #[test]
    fn test_short_tokens_are_not_secrets() {
        let rule = SecretRule::new();
        assert!(check(&rule, "api_key = \"short\"").is_none());
    }

    #[test]
    fn test_comments_ignored() {
        let rule = PatternRule::new(
            "WorkingDirectory",
            IssueTemplate {
                category: HazardCategory::Environment,
                severity: Severity::High,
                title: "t",
                detail: "d",
                fix: "f",
            },
            r"setwd\s*\(",
        );
        assert!(check(&rule, "# setwd('/tmp')\n   # setwd(x)").is_none());
        assert!(check(&rule, "setwd('/tmp')").is_some());
    }

    #[test]
    fn test_default_rules_cover_every_category() {
        let rules = default_rules();
        assert_eq!(rules.len(), 8);
        let names: Vec<_> = rules.iter().map(|r| r.name()).collect();
        assert!(names.contains(&"RandomSeed"));
        assert!(names.contains(&"Secret"));
    }
}
