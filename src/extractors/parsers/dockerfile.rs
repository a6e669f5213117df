//! System libraries installed by a generated Dockerfile

use super::ParseOutcome;
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;

const STOPWORDS: &[&str] = &[
    "RUN",
    "apt-get",
    "apt",
    "install",
    "update",
    "upgrade",
    "&&",
    "\\",
    "sudo",
    "-y",
    "--no-install-recommends",
    "rm",
    "-rf",
    "/var/lib/apt/lists/*",
];

fn apt_install_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?:apt-get|apt)\s+install\b([^&;|\n]*)").expect("valid regex")
    })
}

/// Package names passed to `apt-get install` / `apt install`
///
/// Line continuations are flattened first. Architecture (`:amd64`) and
/// version (`=1.2`) suffixes are stripped.
pub fn parse_system_libs(dockerfile: &str) -> ParseOutcome<BTreeSet<String>> {
    let flat = dockerfile.replace("\\\r\n", " ").replace("\\\n", " ");

    let libs = apt_install_re()
        .captures_iter(&flat)
        .filter_map(|cap| cap.get(1))
        .flat_map(|args| args.as_str().split_whitespace())
        .filter(|token| !token.starts_with('-') && !STOPWORDS.contains(token))
        .filter_map(|token| {
            let name = token.split(':').next()?.split('=').next()?;
            (!name.is_empty()).then(|| name.to_string())
        })
        .collect();

    ParseOutcome::clean(libs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn libs(dockerfile: &str) -> Vec<String> {
        parse_system_libs(dockerfile).value.into_iter().collect()
    }

    #[test]
    fn test_strips_arch_and_version() {
        assert_eq!(
            libs("RUN apt-get install -y libxml2:amd64 pandoc=3.1.3 curl"),
            vec!["curl", "libxml2", "pandoc"]
        );
    }

    #[test]
    fn test_continuations_and_chains() {
        let dockerfile = r#"FROM rocker/r-ver:4.3.2
RUN apt-get update && apt-get install -y --no-install-recommends \
    libcurl4-openssl-dev \
    libssl-dev \
    && rm -rf /var/lib/apt/lists/*
RUN apt install -y libgit2-dev; echo done
"#;
        assert_eq!(
            libs(dockerfile),
            vec!["libcurl4-openssl-dev", "libgit2-dev", "libssl-dev"]
        );
    }

    #[test]
    fn test_deduplicates() {
        let dockerfile = "RUN apt-get install -y curl\nRUN apt-get install -y curl git";
        assert_eq!(libs(dockerfile), vec!["curl", "git"]);
    }

    #[test]
    fn test_no_install_lines() {
        assert!(libs("FROM ubuntu:22.04\nCOPY . /app\n").is_empty());
        assert!(libs("").is_empty());
    }
}
