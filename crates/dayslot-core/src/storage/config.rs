//! TOML-based application configuration.
//!
//! Stores:
//! - The four category windows and the optional day boundary
//! - Which external sources take part in refresh, and where their files live
//! - Widget preferences
//!
//! Configuration is stored at `~/.config/dayslot/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::error::ConfigError;
use crate::reconcile::DEFAULT_FETCH_MARGIN_DAYS;
use crate::window::TimeWindowConfig;

/// External source settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_true")]
    pub calendar_enabled: bool,
    #[serde(default = "default_true")]
    pub reminders_enabled: bool,
    /// Days fetched on each side of the active window.
    #[serde(default = "default_fetch_margin")]
    pub fetch_margin_days: i64,
    /// Calendar file; `calendar.json` in the data directory when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calendar_file: Option<String>,
    /// Reminders file; `reminders.json` in the data directory when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reminders_file: Option<String>,
}

/// Widget configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WidgetConfig {
    /// Most items shown at once.
    #[serde(default = "default_widget_limit")]
    pub limit: usize,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/dayslot/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub windows: TimeWindowConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub widget: WidgetConfig,
}

fn default_true() -> bool {
    true
}
fn default_fetch_margin() -> i64 {
    DEFAULT_FETCH_MARGIN_DAYS
}
fn default_widget_limit() -> usize {
    5
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            calendar_enabled: true,
            reminders_enabled: true,
            fetch_margin_days: default_fetch_margin(),
            calendar_file: None,
            reminders_file: None,
        }
    }
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            limit: default_widget_limit(),
        }
    }
}

impl SyncConfig {
    pub fn calendar_path(&self, data_dir: &Path) -> PathBuf {
        self.calendar_file
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("calendar.json"))
    }

    pub fn reminders_path(&self, data_dir: &Path) -> PathBuf {
        self.reminders_file
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("reminders.json"))
    }
}

/// Keys that may be absent from the serialized config and can be set or
/// cleared through [`Config::set`].
const OPTIONAL_KEYS: &[&str] = &[
    "windows.day_boundary",
    "sync.calendar_file",
    "sync.reminders_file",
];

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if key.is_empty() {
            return Err(unknown());
        }
        let optional = OPTIONAL_KEYS.contains(&key);

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current.as_object_mut().ok_or_else(unknown)?;

                if optional && (value.is_empty() || value.eq_ignore_ascii_case("none")) {
                    obj.remove(part);
                    return Ok(());
                }

                let new_value = match obj.get(part) {
                    Some(serde_json::Value::Bool(_)) => serde_json::Value::Bool(
                        value
                            .parse::<bool>()
                            .map_err(|e| invalid(e.to_string()))?,
                    ),
                    Some(serde_json::Value::Number(_)) => {
                        let n = value
                            .parse::<i64>()
                            .map_err(|_| invalid(format!("cannot parse '{value}' as number")))?;
                        serde_json::Value::Number(n.into())
                    }
                    Some(serde_json::Value::Object(_)) | Some(serde_json::Value::Array(_)) => {
                        serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                    }
                    Some(_) => serde_json::Value::String(value.into()),
                    None if optional => serde_json::Value::String(value.into()),
                    None => return Err(unknown()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    /// `config.toml` in the data directory.
    pub fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the data directory, writing defaults on first run.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from an explicit path, writing defaults there if it is missing.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist to the data directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| failed(e.to_string()))?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| failed(e.to_string()))?;
            }
        }
        std::fs::write(path, content).map_err(|e| failed(e.to_string()))?;
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by dot-separated key, keeping the field's type.
    /// The change is in memory only; call [`Config::save`] to keep it.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value does not parse
    /// (including malformed `HH:MM` times).
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        let mut json = serde_json::to_value(&*self).map_err(|e| invalid(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        *self = serde_json::from_value(json).map_err(|e| invalid(e.to_string()))?;
        Ok(())
    }

    /// Every leaf key with its current value, sorted by key.
    pub fn entries(&self) -> Vec<(String, String)> {
        fn walk(prefix: &str, value: &serde_json::Value, out: &mut Vec<(String, String)>) {
            match value {
                serde_json::Value::Object(map) => {
                    for (k, v) in map {
                        let key = if prefix.is_empty() {
                            k.clone()
                        } else {
                            format!("{prefix}.{k}")
                        };
                        walk(&key, v, out);
                    }
                }
                serde_json::Value::String(s) => out.push((prefix.to_string(), s.clone())),
                other => out.push((prefix.to_string(), other.to_string())),
            }
        }

        let mut out = Vec::new();
        if let Ok(json) = serde_json::to_value(self) {
            walk("", &json, &mut out);
        }
        out
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }
}
