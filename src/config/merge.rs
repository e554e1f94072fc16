//! Layer merging for settings.
//!
//! Layers are merged as JSON objects before they are deserialized, so a layer
//! only overrides the keys it actually sets. `null` values never override.

use serde_json::{Map, Value};

/// Keys whose object values merge key-wise instead of being replaced.
const NESTED_SECTIONS: &[&str] = &["qcc", "clangd"];

/// Merge `overlay` onto `base`.
///
/// Scalars and arrays replace, except `qcc.includePaths`, which concatenates
/// with duplicates removed.
pub fn merge_settings(base: &mut Value, overlay: &Value) {
    let Some(overlay) = overlay.as_object() else {
        return;
    };
    if !base.is_object() {
        *base = Value::Object(Map::new());
    }
    let Some(base) = base.as_object_mut() else {
        return;
    };

    for (key, value) in overlay {
        if value.is_null() {
            continue;
        }
        if NESTED_SECTIONS.contains(&key.as_str()) && value.is_object() {
            let section = base
                .entry(key.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            merge_section(key, section, value);
        } else {
            base.insert(key.clone(), value.clone());
        }
    }
}

fn merge_section(name: &str, base: &mut Value, overlay: &Value) {
    if !base.is_object() {
        *base = Value::Object(Map::new());
    }
    let (Some(base), Some(overlay)) = (base.as_object_mut(), overlay.as_object()) else {
        return;
    };
    for (key, value) in overlay {
        if value.is_null() {
            continue;
        }
        if name == "qcc" && key == "includePaths" {
            let merged = merge_string_arrays(
                &string_array(base.get(key)),
                &string_array(Some(value)),
            );
            base.insert(key.clone(), Value::from(merged));
        } else {
            base.insert(key.clone(), value.clone());
        }
    }
}

fn string_array(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str())
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

/// Concatenate, dropping empty strings and duplicates. First occurrence wins.
pub fn merge_string_arrays(first: &[String], second: &[String]) -> Vec<String> {
    let mut merged: Vec<String> = Vec::with_capacity(first.len() + second.len());
    for item in first.iter().chain(second) {
        if !item.is_empty() && !merged.contains(item) {
            merged.push(item.clone());
        }
    }
    merged
}

/// Merge compiler flags, keeping first-seen order.
pub fn merge_flags(configured: &[String], derived: &[String]) -> Vec<String> {
    merge_string_arrays(configured, derived)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scalars_override_and_nulls_do_not() {
        let mut base = json!({"qccPath": "qcc", "enableDiagnostics": true});
        merge_settings(&mut base, &json!({"qccPath": "/opt/qcc", "enableDiagnostics": null}));
        assert_eq!(base, json!({"qccPath": "/opt/qcc", "enableDiagnostics": true}));
    }

    #[test]
    fn nested_sections_merge_key_wise() {
        let mut base = json!({"clangd": {"path": "clangd", "mode": "proxy"}});
        merge_settings(&mut base, &json!({"clangd": {"mode": "augment"}}));
        assert_eq!(base, json!({"clangd": {"path": "clangd", "mode": "augment"}}));
    }

    #[test]
    fn include_paths_concatenate_without_duplicates() {
        let mut base = json!({"qcc": {"includePaths": ["/a", "/b"]}});
        merge_settings(&mut base, &json!({"qcc": {"includePaths": ["/b", "", "/c"]}}));
        assert_eq!(base["qcc"]["includePaths"], json!(["/a", "/b", "/c"]));
    }

    #[test]
    fn other_arrays_replace() {
        let mut base = json!({"clangd": {"args": ["--a"]}});
        merge_settings(&mut base, &json!({"clangd": {"args": ["--b"]}}));
        assert_eq!(base["clangd"]["args"], json!(["--b"]));
    }

    #[test]
    fn merge_flags_keeps_first_seen_order() {
        let configured = vec!["-DX".to_string(), "-I/opt/b".to_string()];
        let derived = vec!["-I/opt/b".to_string(), "-I/opt/b/grid".to_string()];
        assert_eq!(
            merge_flags(&configured, &derived),
            ["-DX", "-I/opt/b", "-I/opt/b/grid"]
        );
    }
}
