//! Package pins from the tracer's `install_r_packages.R`

use super::ParseOutcome;
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::OnceLock;

/// An R package pinned to an exact version
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PackageSpec {
    pub name: String,
    pub version: String,
}

impl fmt::Display for PackageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.version)
    }
}

impl Serialize for PackageSpec {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

fn install_version_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"remotes::install_version\s*\(\s*['"]([^'"]+)['"]\s*,\s*['"]([^'"]+)['"]"#)
            .expect("valid regex")
    })
}

/// Every `remotes::install_version("name", "version"` call, sorted by display form
pub fn parse_install_script(text: &str) -> ParseOutcome<Vec<PackageSpec>> {
    let mut specs: Vec<PackageSpec> = install_version_re()
        .captures_iter(text)
        .filter_map(|cap| {
            Some(PackageSpec {
                name: cap.get(1)?.as_str().to_string(),
                version: cap.get(2)?.as_str().to_string(),
            })
        })
        .collect();

    specs.sort_by_key(|spec| spec.to_string());
    specs.dedup();
    ParseOutcome::clean(specs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_install_script() {
        let script = r#"
options(repos = c(CRAN = "https://cloud.r-project.org"))
remotes::install_version("rmarkdown", "2.25")
remotes::install_version( 'ggplot2' , '3.4.4', upgrade = "never")
remotes::install_version("knitr", "1.45")
"#;
        let parsed = parse_install_script(script);
        let names: Vec<String> = parsed.value.iter().map(ToString::to_string).collect();
        assert_eq!(
            names,
            vec!["ggplot2 (3.4.4)", "knitr (1.45)", "rmarkdown (2.25)"]
        );
        assert!(parsed.warnings.is_empty());
    }

    #[test]
    fn test_ignores_plain_installs() {
        let parsed = parse_install_script("install.packages('dplyr')\nremotes::install_version(pkg)");
        assert!(parsed.value.is_empty());
    }

    #[test]
    fn test_serializes_as_display_string() {
        let spec = PackageSpec {
            name: "jsonlite".into(),
            version: "1.8.8".into(),
        };
        assert_eq!(
            serde_json::to_string(&spec).unwrap(),
            "\"jsonlite (1.8.8)\""
        );
    }
}
