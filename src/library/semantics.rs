//! Optional-dependency discovery inside a library's `semantics.json`.
//!
//! Semantics are a nested tree of typed fields. A `library` field lists the
//! sub-content types it accepts in `options` (`"H5P.Text 1.1"`); a `select`
//! field may do the same with `{ "value": ..., "label": ... }` objects. Those
//! libraries are required at runtime but never appear in `library.json`.

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

use crate::identity::MAX_MACHINE_NAME_LEN;

/// File name of the configuration document inside a library directory.
pub const SEMANTICS_FILE: &str = "semantics.json";

static UBER_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?<name>[\w.\-]+) [0-9]+\.[0-9]+$").expect("valid uber name regex")
});

fn is_uber_name(text: &str) -> bool {
    UBER_NAME
        .captures(text)
        .is_some_and(|c| c["name"].chars().count() <= MAX_MACHINE_NAME_LEN)
}

/// Every option value in the tree that names a library as `MachineName major.minor`.
///
/// Order follows a depth-first walk; duplicates are kept for the caller to fold.
pub fn optional_dependencies(semantics: &Value) -> Vec<String> {
    let mut found = Vec::new();
    collect(semantics, &mut found);
    found
}

fn collect(node: &Value, found: &mut Vec<String>) {
    match node {
        Value::Object(map) => {
            if let Some(Value::Array(options)) = map.get("options") {
                for option in options {
                    let candidate = match option {
                        Value::String(s) => Some(s.as_str()),
                        Value::Object(o) => o.get("value").and_then(Value::as_str),
                        _ => None,
                    };
                    if let Some(name) = candidate
                        && is_uber_name(name)
                    {
                        found.push(name.to_string());
                    }
                }
            }
            for child in map.values() {
                collect(child, found);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect(item, found);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_library_field_options() {
        let semantics = json!([
            {
                "name": "content",
                "type": "library",
                "options": ["H5P.Text 1.1", "H5P.Image 1.1"]
            }
        ]);
        assert_eq!(
            optional_dependencies(&semantics),
            vec!["H5P.Text 1.1", "H5P.Image 1.1"]
        );
    }

    #[test]
    fn test_nested_select_options() {
        let semantics = json!([
            {
                "name": "slides",
                "type": "list",
                "field": {
                    "type": "group",
                    "fields": [
                        {
                            "name": "widget",
                            "type": "select",
                            "options": [
                                { "value": "H5P.Chart 1.2", "label": "Chart" },
                                { "value": "plain", "label": "Plain" }
                            ]
                        }
                    ]
                }
            }
        ]);
        assert_eq!(optional_dependencies(&semantics), vec!["H5P.Chart 1.2"]);
    }

    #[test]
    fn test_ignores_non_library_values() {
        let semantics = json!([
            { "type": "select", "options": [{ "value": "left" }, { "value": "H5P.Foo 1.2.3" }] },
            { "type": "text", "default": "H5P.Text 1.1" },
            { "type": "library", "options": [42, null, "H5P.Text"] }
        ]);
        assert!(optional_dependencies(&semantics).is_empty());
    }

    #[test]
    fn test_machine_name_length_limit() {
        let longest = format!("{} 1.0", "H".repeat(255));
        let too_long = format!("{} 1.0", "H".repeat(256));
        let semantics = json!([{ "type": "library", "options": [longest.clone(), too_long] }]);
        assert_eq!(optional_dependencies(&semantics), vec![longest]);
    }

    #[test]
    fn test_empty_document() {
        assert!(optional_dependencies(&json!([])).is_empty());
        assert!(optional_dependencies(&json!(null)).is_empty());
    }
}
