//! TOML-based engine configuration.
//!
//! Stores:
//! - Loading options (default priority, connection awareness, preload distance)
//! - CDN mirror header names for cache-control
//! - Budget monitor retention
//!
//! Configuration is stored at `~/.config/adaptload/config.toml`, or at the
//! path in `ADAPTLOAD_CONFIG` when set.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::budget::MonitorConfig;
use crate::cache::DEFAULT_CDN_HEADERS;
use crate::error::{ConfigError, Result};
use crate::resource::PriorityTier;

/// Returns `~/.config/adaptload[-dev]/` based on ADAPTLOAD_ENV.
///
/// Set ADAPTLOAD_ENV=dev to use the development directory.
pub fn data_dir() -> Result<PathBuf> {
    let base_dir = dirs::home_dir().ok_or(ConfigError::NoConfigDir)?.join(".config");

    let env = std::env::var("ADAPTLOAD_ENV").unwrap_or_else(|_| "production".to_string());
    let dir = if env == "dev" {
        base_dir.join("adaptload-dev")
    } else {
        base_dir.join("adaptload")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Loading options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadingConfig {
    /// Tier for descriptors that don't declare one.
    #[serde(default)]
    pub priority: PriorityTier,
    /// When false the network sampler is disabled and every decision uses
    /// the fast profile.
    #[serde(default = "default_true")]
    pub connection_aware: bool,
    /// Overrides every tier's preload boundary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preload_distance_px: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cdn_headers")]
    pub cdn_mirror_headers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorSection {
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u32,
    #[serde(default = "default_max_samples")]
    pub max_samples_per_metric: usize,
}

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub loading: LoadingConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub monitor: MonitorSection,
}

fn default_true() -> bool {
    true
}
fn default_cdn_headers() -> Vec<String> {
    DEFAULT_CDN_HEADERS.iter().map(|h| h.to_string()).collect()
}
fn default_retention_secs() -> u32 {
    300
}
fn default_max_samples() -> usize {
    100
}

impl Default for LoadingConfig {
    fn default() -> Self {
        Self {
            priority: PriorityTier::default(),
            connection_aware: true,
            preload_distance_px: None,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cdn_mirror_headers: default_cdn_headers(),
        }
    }
}

impl Default for MonitorSection {
    fn default() -> Self {
        Self {
            retention_secs: default_retention_secs(),
            max_samples_per_metric: default_max_samples(),
        }
    }
}

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

    /// Write `value` at `key`, typed after the existing value. Missing leaves
    /// (unset optional keys) are parsed as number, then bool, then string.
    fn set_json_value_by_path(root: &mut serde_json::Value, key: &str, value: &str) -> Result<()> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if parts.peek().is_none() || key.is_empty() {
            return Err(unknown().into());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_some() {
                current = current.get_mut(part).ok_or_else(unknown)?;
                continue;
            }

            let obj = current.as_object_mut().ok_or_else(unknown)?;
            let new_value = match obj.get(part) {
                Some(serde_json::Value::Bool(_)) => serde_json::Value::Bool(
                    value.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
                ),
                Some(serde_json::Value::Number(_)) => value
                    .parse::<u64>()
                    .map(|n| serde_json::Value::Number(n.into()))
                    .map_err(|_| invalid(format!("cannot parse '{value}' as number")))?,
                Some(serde_json::Value::Array(_)) => {
                    if value.trim_start().starts_with('[') {
                        serde_json::from_str(value)?
                    } else {
                        serde_json::Value::Array(
                            value
                                .split(',')
                                .map(str::trim)
                                .filter(|s| !s.is_empty())
                                .map(|s| serde_json::Value::String(s.to_string()))
                                .collect(),
                        )
                    }
                }
                Some(serde_json::Value::Object(_)) => serde_json::from_str(value)?,
                Some(_) => serde_json::Value::String(value.into()),
                None => {
                    if let Ok(n) = value.parse::<u64>() {
                        serde_json::Value::Number(n.into())
                    } else if let Ok(b) = value.parse::<bool>() {
                        serde_json::Value::Bool(b)
                    } else {
                        serde_json::Value::String(value.into())
                    }
                }
            };
            obj.insert(part.to_string(), new_value);
            return Ok(());
        }

        Err(unknown().into())
    }

    /// `ADAPTLOAD_CONFIG` or `<data_dir>/config.toml`.
    pub fn path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var("ADAPTLOAD_CONFIG") {
            return Ok(PathBuf::from(path));
        }
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from disk or return default.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self> {
        let path = Self::path()?;
        if !path.exists() {
            let cfg = Self::default();
            cfg.save_to(&path)?;
            return Ok(cfg);
        }
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let cfg = toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Ok(cfg)
    }

    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| save_failed(e.to_string()))?;
        }
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
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

    /// Update a value in memory. Call [`Config::save`] to persist.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value does not parse
    /// into the key's type.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let mut json = serde_json::to_value(&*self)?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        // Unknown keys survive the JSON write but are dropped by serde.
        if updated.get(key).is_none() {
            return Err(ConfigError::UnknownKey(key.to_string()).into());
        }
        *self = updated;
        Ok(())
    }

    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            retention: Duration::seconds(i64::from(self.monitor.retention_secs)),
            max_samples_per_metric: self.monitor.max_samples_per_metric,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, cfg);
        assert!(parsed.loading.connection_aware);
        assert_eq!(parsed.cache.cdn_mirror_headers.len(), 2);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let cfg: Config = toml::from_str("[loading]\npriority = \"high\"\n").unwrap();
        assert_eq!(cfg.loading.priority, PriorityTier::High);
        assert!(cfg.loading.connection_aware);
        assert_eq!(cfg.monitor.retention_secs, 300);
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("loading.connection_aware").as_deref(), Some("true"));
        assert_eq!(cfg.get("loading.priority").as_deref(), Some("medium"));
        assert_eq!(cfg.get("monitor.retention_secs").as_deref(), Some("300"));
        assert!(cfg.get("loading.missing_key").is_none());
        assert!(cfg.get("loading.preload_distance_px").is_none());
    }

    #[test]
    fn set_typed_values() {
        let mut cfg = Config::default();
        cfg.set("loading.connection_aware", "false").unwrap();
        cfg.set("loading.priority", "low").unwrap();
        cfg.set("loading.preload_distance_px", "1500").unwrap();
        cfg.set("cache.cdn_mirror_headers", "Surrogate-Control, CDN-Cache-Control").unwrap();

        assert!(!cfg.loading.connection_aware);
        assert_eq!(cfg.loading.priority, PriorityTier::Low);
        assert_eq!(cfg.loading.preload_distance_px, Some(1500));
        assert_eq!(
            cfg.cache.cdn_mirror_headers,
            vec!["Surrogate-Control".to_string(), "CDN-Cache-Control".to_string()]
        );
    }

    #[test]
    fn set_rejects_unknown_and_invalid() {
        let mut cfg = Config::default();
        assert!(cfg.set("loading.bogus", "1").is_err());
        assert!(cfg.set("nope", "1").is_err());
        assert!(cfg.set("loading.connection_aware", "maybe").is_err());
        assert!(cfg.set("loading.priority", "urgent").is_err());
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn save_and_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut cfg = Config::default();
        cfg.set("monitor.max_samples_per_metric", "10").unwrap();
        cfg.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.monitor.max_samples_per_metric, 10);
        assert_eq!(loaded.monitor_config().max_samples_per_metric, 10);
    }

    #[test]
    fn load_from_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "loading = 3").unwrap();
        assert!(Config::load_from(&path).is_err());
    }
}
