use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::logging;

pub const ROOT_ENV_VAR: &str = "JS_INJECTOR_ROOT";
const APP_DIR_NAME: &str = "js-injector";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct AppConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Web client directory holding `index.html`. Empty means not configured.
    #[serde(default)]
    pub web_path: String,
    #[serde(default = "default_script_base_path")]
    pub script_base_path: String,
    #[serde(default)]
    pub api_keys: Vec<String>,
    #[serde(default)]
    pub verbose_logging: bool,
    #[serde(default)]
    pub serve_web_client: bool,
}

fn default_bind_address() -> String {
    "127.0.0.1:8097".to_string()
}

fn default_script_base_path() -> String {
    "..".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            web_path: String::new(),
            script_base_path: default_script_base_path(),
            api_keys: Vec::new(),
            verbose_logging: false,
            serve_web_client: false,
        }
    }
}

impl AppConfig {
    pub fn web_dir(&self) -> Option<PathBuf> {
        let trimmed = self.web_path.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(PathBuf::from(trimmed))
        }
    }
}

/// Get the application root directory
pub fn get_app_root_dir() -> Result<PathBuf, String> {
    // 1. Explicit override
    if let Ok(root) = std::env::var(ROOT_ENV_VAR) {
        if !root.trim().is_empty() {
            return ensure_dir(PathBuf::from(root));
        }
    }

    // 2. Portable mode: a file named "portable" next to the executable
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            if exe_dir.join("portable").exists() {
                return Ok(exe_dir.to_path_buf());
            }
        }
    }

    // 3. Platform config directory
    let base = dirs::config_dir().ok_or("Failed to resolve the user config directory")?;
    ensure_dir(base.join(APP_DIR_NAME))
}

fn ensure_dir(path: PathBuf) -> Result<PathBuf, String> {
    if !path.exists() {
        fs::create_dir_all(&path)
            .map_err(|e| format!("Failed to create directory {:?}: {}", path, e))?;
    }
    Ok(path)
}

/// Get the configuration directory: config/
pub fn get_config_dir() -> Result<PathBuf, String> {
    let root = get_app_root_dir()?;
    ensure_dir(root.join("config"))
        .map_err(|e| format!("Failed to create config directory: {}", e))
}

fn get_config_path() -> Result<PathBuf, String> {
    Ok(get_config_dir()?.join("config.json"))
}

pub fn save_config(config: &AppConfig) -> Result<(), String> {
    let config_path = get_config_path()?;
    let json = serde_json::to_string_pretty(config)
        .map_err(|e| format!("Failed to serialize config: {}", e))?;
    fs::write(&config_path, json).map_err(|e| format!("Failed to write config: {}", e))?;
    let _ = logging::write_domain_log("audit", "Updated application configuration");
    Ok(())
}

/// What `load_config` found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigStatus {
    Missing,
    /// Parsed, but some options were filled from defaults.
    Incomplete,
    Complete,
    /// Unreadable as a config; defaults are in use and the file is left alone.
    Invalid(String),
}

impl ConfigStatus {
    /// Whether the file should be written back with the effective values.
    pub fn needs_write(&self) -> bool {
        matches!(self, ConfigStatus::Missing | ConfigStatus::Incomplete)
    }
}

pub fn load_config() -> Result<(AppConfig, ConfigStatus), String> {
    let config_path = get_config_path()?;

    if !config_path.exists() {
        return Ok((AppConfig::default(), ConfigStatus::Missing));
    }

    let content =
        fs::read_to_string(&config_path).map_err(|e| format!("Failed to read config: {}", e))?;
    Ok(parse_config(&content))
}

fn parse_config(content: &str) -> (AppConfig, ConfigStatus) {
    let value = match serde_json::from_str::<serde_json::Value>(content) {
        Ok(value) => value,
        Err(e) => return (AppConfig::default(), ConfigStatus::Invalid(e.to_string())),
    };
    let present: Vec<String> = value
        .as_object()
        .map(|o| o.keys().cloned().collect())
        .unwrap_or_default();

    match serde_json::from_value::<AppConfig>(value) {
        Ok(config) => {
            let complete = serde_json::to_value(AppConfig::default())
                .ok()
                .and_then(|d| d.as_object().map(|o| o.keys().all(|k| present.contains(k))))
                .unwrap_or(false);
            let status = if complete {
                ConfigStatus::Complete
            } else {
                ConfigStatus::Incomplete
            };
            (config, status)
        }
        Err(e) => (AppConfig::default(), ConfigStatus::Invalid(e.to_string())),
    }
}
