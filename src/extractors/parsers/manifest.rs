//! The tracer's `manifest.json`

use super::ParseOutcome;
use serde_json::{Map, Value};

/// Parse the manifest, falling back to an empty object
pub fn parse_manifest(text: &str) -> ParseOutcome<Value> {
    if text.trim().is_empty() {
        return ParseOutcome::clean(Value::Object(Map::new()));
    }
    match serde_json::from_str(text) {
        Ok(value) => ParseOutcome::clean(value),
        Err(e) => ParseOutcome::degraded(
            Value::Object(Map::new()),
            format!("Invalid manifest.json: {}", e),
        ),
    }
}

/// String entries of the manifest's `system_packages` list
pub fn system_packages(manifest: &Value) -> Vec<String> {
    manifest
        .get("system_packages")
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_manifest() {
        let parsed = parse_manifest(r#"{"system_packages": ["pandoc", "libxml2", 3]}"#);
        assert!(parsed.warnings.is_empty());
        assert_eq!(system_packages(&parsed.value), vec!["pandoc", "libxml2"]);
    }

    #[test]
    fn test_invalid_manifest_degrades() {
        let parsed = parse_manifest("{not json");
        assert_eq!(parsed.value, json!({}));
        assert_eq!(parsed.warnings.len(), 1);
        assert!(system_packages(&parsed.value).is_empty());
    }

    #[test]
    fn test_empty_manifest() {
        let parsed = parse_manifest("  \n");
        assert_eq!(parsed.value, json!({}));
        assert!(parsed.warnings.is_empty());
    }
}
