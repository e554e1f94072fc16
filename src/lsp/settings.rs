//! Layered settings resolution.
//!
//! Precedence, lowest first: built-in defaults < user config file <
//! project `.comphy-basilisk` < editor configuration < explicit overrides.
//! Problems with discovered files become [`SettingsEvent`]s rather than
//! errors, so a broken config file never stops the server.

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::config::{
    BasiliskSettings, find_project_config, load_project_config, load_user_config, merge_settings,
    resolve_path_setting,
};
use crate::error::ConfigError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SettingsEventKind {
    Info,
    Warning,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SettingsEvent {
    pub kind: SettingsEventKind,
    pub message: String,
    /// Config file the event is about, if any.
    pub path: Option<PathBuf>,
}

impl SettingsEvent {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            kind: SettingsEventKind::Info,
            message: message.into(),
            path: None,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            kind: SettingsEventKind::Warning,
            message: message.into(),
            path: None,
        }
    }

    fn about(mut self, path: &Path) -> Self {
        self.path = Some(path.to_path_buf());
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SettingsSource {
    InitializationOptions,
    ClientConfiguration,
    CommandLine,
}

impl SettingsSource {
    fn description(self) -> &'static str {
        match self {
            SettingsSource::InitializationOptions => "initialization options",
            SettingsSource::ClientConfiguration => "client configuration",
            SettingsSource::CommandLine => "command line",
        }
    }
}

/// Inputs for one settings resolution.
#[derive(Clone, Debug, Default)]
pub struct SettingsRequest<'a> {
    /// Directory the project config search starts from.
    pub search_start: Option<&'a Path>,
    /// Use this project config instead of searching. Failure to load it is an error.
    pub explicit_project_config: Option<&'a Path>,
    /// Editor `basilisk` section.
    pub editor: Option<(SettingsSource, Value)>,
    /// Base for relative include paths in the editor layer.
    pub editor_base: Option<&'a Path>,
    /// Final overrides, already resolved by the caller.
    pub overrides: Option<Value>,
    /// Skip the user config file.
    pub skip_user_config: bool,
}

#[derive(Debug, Default)]
pub struct SettingsLoadOutcome {
    pub settings: BasiliskSettings,
    pub events: Vec<SettingsEvent>,
    pub project_config: Option<PathBuf>,
}

pub fn load_settings(request: &SettingsRequest<'_>) -> Result<SettingsLoadOutcome, ConfigError> {
    let mut events = Vec::new();

    // Layer 1: defaults
    let mut merged = serde_json::to_value(BasiliskSettings::default())
        .unwrap_or_else(|_| Value::Object(Default::default()));

    // Layer 2: user config
    if !request.skip_user_config {
        if let Some(user) = load_user_config_with_events(&mut events) {
            merge_settings(&mut merged, &user);
        }
    }

    // Layer 3: project config
    let mut project_config = None;
    if let Some(explicit) = request.explicit_project_config {
        if let Some(layer) = load_project_config(explicit)? {
            merge_settings(&mut merged, &layer);
        }
        project_config = Some(explicit.to_path_buf());
    } else if let Some(start) = request.search_start {
        if let Some(path) = find_project_config(start) {
            if let Some(layer) = load_discovered_project_config(&path, &mut events) {
                merge_settings(&mut merged, &layer);
            }
            project_config = Some(path);
        }
    }

    // Layer 4: editor configuration
    if let Some((source, value)) = &request.editor {
        if let Some(layer) = editor_layer(*source, value, request.editor_base, &mut events) {
            merge_settings(&mut merged, &layer);
        }
    }

    // Layer 5: explicit overrides
    if let Some(overrides) = &request.overrides {
        merge_settings(&mut merged, overrides);
    }

    let settings = match serde_json::from_value::<BasiliskSettings>(merged) {
        Ok(settings) => settings,
        Err(err) => {
            events.push(SettingsEvent::warning(format!(
                "Invalid settings, using defaults: {}",
                err
            )));
            BasiliskSettings::default()
        }
    };

    Ok(SettingsLoadOutcome {
        settings,
        events,
        project_config,
    })
}

fn load_user_config_with_events(events: &mut Vec<SettingsEvent>) -> Option<Value> {
    match load_user_config() {
        Ok(Some(layer)) => {
            events.push(SettingsEvent::info("Loaded user config"));
            Some(layer)
        }
        Ok(None) => None,
        Err(err) => {
            events.push(SettingsEvent::warning(format!(
                "Failed to load user config: {}",
                err
            )));
            None
        }
    }
}

fn load_discovered_project_config(path: &Path, events: &mut Vec<SettingsEvent>) -> Option<Value> {
    match load_project_config(path) {
        Ok(layer) => {
            events.push(
                SettingsEvent::info(format!("Found config file: {}", path.display())).about(path),
            );
            layer
        }
        Err(err) => {
            events.push(SettingsEvent::warning(err.to_string()).about(path));
            None
        }
    }
}

/// Validate the editor section and resolve its include paths.
fn editor_layer(
    source: SettingsSource,
    value: &Value,
    base: Option<&Path>,
    events: &mut Vec<SettingsEvent>,
) -> Option<Value> {
    if value.is_null() {
        return None;
    }
    if !value.is_object() {
        events.push(SettingsEvent::warning(format!(
            "Ignoring {}: expected an object",
            source.description()
        )));
        return None;
    }

    let mut layer = value.clone();
    if let Some(includes) = layer
        .get_mut("qcc")
        .and_then(|qcc| qcc.get_mut("includePaths"))
        .and_then(|paths| paths.as_array_mut())
    {
        for include in includes.iter_mut() {
            if let Some(raw) = include.as_str() {
                *include = Value::String(resolve_path_setting(raw, base));
            }
        }
    }
    Some(layer)
}
