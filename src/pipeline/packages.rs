//! Package detection and best-effort installation script

use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;

fn include_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?:library|require)\s*\(\s*["']?([a-zA-Z0-9.]+)"#).expect("valid regex")
    })
}

/// Packages loaded with `library(...)` or `require(...)`, sorted and unique
pub fn detect_packages(content: &str) -> Vec<String> {
    include_re()
        .captures_iter(content)
        .filter_map(|cap| cap.get(1))
        .map(|m| m.as_str().to_string())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// R script installing each package from `repo` unless it already loads
pub fn install_script(packages: &[String], repo: &str) -> String {
    let quoted = packages
        .iter()
        .map(|p| format!("'{}'", p))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        r#"pkgs <- c({quoted})
repo <- '{repo}'
for (pkg in pkgs) {{
    if (!require(pkg, character.only = TRUE, quietly = TRUE)) {{
        message(paste("Installing missing package:", pkg))
        install.packages(pkg, repos = repo)
    }} else {{
        message(paste("Package already installed:", pkg))
    }}
}}
"#,
        quoted = quoted,
        repo = repo.replace('\'', ""),
    )
}
