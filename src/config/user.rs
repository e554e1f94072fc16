//! User-wide configuration.
//!
//! Location: `$XDG_CONFIG_HOME/qcc-lsp/config.toml`, falling back to the
//! platform config directory (`~/.config` on Linux). Keys use the same
//! camelCase names as the editor settings.

use std::fs;
use std::path::PathBuf;

use serde_json::Value;

use crate::error::ConfigError;

const APP_DIR: &str = "qcc-lsp";
const FILE_NAME: &str = "config.toml";

/// Returns the path to the user configuration file.
pub fn user_config_path() -> Option<PathBuf> {
    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        if !xdg_config.is_empty() {
            return Some(PathBuf::from(xdg_config).join(APP_DIR).join(FILE_NAME));
        }
    }
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join(FILE_NAME))
}

/// Load the user config as a settings layer. A missing file is `Ok(None)`.
pub fn load_user_config() -> Result<Option<Value>, ConfigError> {
    let Some(path) = user_config_path() else {
        return Ok(None);
    };
    if !path.is_file() {
        return Ok(None);
    }
    let contents = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
        path: path.clone(),
        source,
    })?;
    let value: Value =
        toml::from_str(&contents).map_err(|e| ConfigError::parse(&path, e.to_string()))?;
    Ok(Some(value))
}
