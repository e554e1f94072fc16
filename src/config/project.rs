//! Project configuration: the `.comphy-basilisk` JSON file.
//!
//! Paths inside the file are relative to the directory holding it. They are
//! resolved at load time so later layers can merge plain absolute paths.

use std::fs;
use std::path::Path;

use serde_json::{Map, Value};

use super::merge::merge_string_arrays;
use super::paths::resolve_path_setting;
use crate::error::ConfigError;

/// Load a project config file as a settings layer.
///
/// Returns `Ok(None)` for an empty file.
pub fn load_project_config(path: &Path) -> Result<Option<Value>, ConfigError> {
    if !path.is_file() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    if contents.trim().is_empty() {
        return Ok(None);
    }

    let parsed: Value =
        serde_json::from_str(&contents).map_err(|e| ConfigError::parse(path, e.to_string()))?;
    let Value::Object(mut object) = parsed else {
        return Err(ConfigError::parse(path, "expected a JSON object"));
    };

    let base = path.parent();
    resolve_string(&mut object, "basiliskPath", base);
    if object
        .get("qccPath")
        .and_then(|v| v.as_str())
        .is_some_and(|p| p.contains('/') || p.starts_with('~'))
    {
        resolve_string(&mut object, "qccPath", base);
    }

    let extra_includes = string_list(object.remove("qccIncludePaths").as_ref());
    let mut qcc = take_section(&mut object, "qcc");
    let includes = merge_string_arrays(&string_list(qcc.get("includePaths")), &extra_includes);
    if !includes.is_empty() {
        let resolved: Vec<String> = includes
            .iter()
            .map(|p| resolve_path_setting(p, base))
            .collect();
        qcc.insert("includePaths".to_string(), Value::from(resolved));
    }
    object.insert("qcc".to_string(), Value::Object(qcc));

    if let Some(clangd) = object.get_mut("clangd").and_then(|v| v.as_object_mut()) {
        resolve_string(clangd, "compileCommandsDir", base);
    }

    Ok(Some(Value::Object(object)))
}

fn resolve_string(object: &mut Map<String, Value>, key: &str, base: Option<&Path>) {
    if let Some(Value::String(raw)) = object.get(key) {
        let resolved = resolve_path_setting(raw, base);
        object.insert(key.to_string(), Value::String(resolved));
    }
}

fn take_section(object: &mut Map<String, Value>, key: &str) -> Map<String, Value> {
    match object.remove(key) {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|i| i.as_str())
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default()
}
