//! TOML-based configuration.
//!
//! Stores:
//! - LMS location and the local owner that synced rows belong to
//! - HTTP pool, timeout and retry settings for the fetch client
//! - Worker-pool sizes for the two concurrent sync phases
//!
//! Configuration is stored at `~/.config/coursesync/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::error::{ConfigError, ValidationError};
use crate::lms::fetchers::MAX_PAGE_SIZE;

/// Canvas hosts for institutions users commonly type by name.
const KNOWN_COLLEGES: &[(&str, &str)] = &[
    ("harvard", "https://canvas.harvard.edu"),
    ("stanford", "https://canvas.stanford.edu"),
    ("uw", "https://canvas.uw.edu"),
    ("mit", "https://canvas.mit.edu"),
    ("umich", "https://canvas.umich.edu"),
    ("uccs", "http://canvas.uccs.edu"),
];

/// Where to sync from and who owns the result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LmsConfig {
    #[serde(default)]
    pub base_url: String,
    #[serde(default = "default_owner")]
    pub owner: String,
}

/// Fetch client settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_pool_size")]
    pub pool_max_idle_per_host: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

/// Worker-pool sizes for the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Concurrent per-course assignment/module fetches.
    #[serde(default = "default_course_workers")]
    pub course_workers: usize,
    /// Concurrent per-module item fetches.
    #[serde(default = "default_item_workers")]
    pub item_workers: usize,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/coursesync/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub lms: LmsConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

fn default_owner() -> String {
    "default".into()
}
fn default_pool_size() -> usize {
    50
}
fn default_max_retries() -> u32 {
    3
}
fn default_retry_backoff_ms() -> u64 {
    250
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_connect_timeout_secs() -> u64 {
    10
}
fn default_page_size() -> u32 {
    MAX_PAGE_SIZE
}
fn default_course_workers() -> usize {
    10
}
fn default_item_workers() -> usize {
    20
}

impl Default for LmsConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            owner: default_owner(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            pool_max_idle_per_host: default_pool_size(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            page_size: default_page_size(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            course_workers: default_course_workers(),
            item_workers: default_item_workers(),
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
        if parts.peek().map_or(true, |p| p.is_empty()) {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => serde_json::Value::Number(
                        value
                            .parse::<u64>()
                            .map_err(|_| invalid(format!("cannot parse '{value}' as number")))?
                            .into(),
                    ),
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        return Err(invalid("cannot set a whole section".into()));
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    /// Default location of `config.toml`.
    pub fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the default location, writing defaults if the file is missing.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from `path`, writing defaults there if the file is missing.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Config = toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })?;
                cfg.validate()?;
                Ok(cfg)
            }
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

    /// Persist to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Reject settings the sync pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("sync.course_workers", self.sync.course_workers),
            ("sync.item_workers", self.sync.item_workers),
            ("http.pool_max_idle_per_host", self.http.pool_max_idle_per_host),
        ];
        for (key, value) in positive {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    key: key.into(),
                    message: "must be at least 1".into(),
                });
            }
        }
        if !(1..=MAX_PAGE_SIZE).contains(&self.http.page_size) {
            return Err(ConfigError::InvalidValue {
                key: "http.page_size".into(),
                message: format!("must be between 1 and {MAX_PAGE_SIZE}"),
            });
        }
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Object(_) => None,
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by key. The updated config is validated but not saved.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config =
            serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            })?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }
}

/// Turn a college shortcut or bare domain into a Canvas base URL.
///
/// Known names map to their hosts. Anything else is treated as a domain and
/// gets `https://` unless it already carries a scheme.
pub fn resolve_base_url(input: &str) -> Result<String, ValidationError> {
    let input = input.trim();
    let lowered = input.to_lowercase();
    if let Some((_, url)) = KNOWN_COLLEGES.iter().find(|(name, _)| *name == lowered) {
        return Ok((*url).to_string());
    }

    let candidate = if input.contains("://") {
        input.to_string()
    } else {
        format!("https://{input}")
    };

    let parsed = url::Url::parse(&candidate).map_err(|source| ValidationError::InvalidBaseUrl {
        url: input.to_string(),
        source,
    })?;
    if parsed.host_str().is_none() || !matches!(parsed.scheme(), "http" | "https") {
        return Err(ValidationError::InvalidValue {
            field: "base_url".into(),
            message: format!("'{input}' is not an http(s) URL"),
        });
    }
    Ok(candidate.trim_end_matches('/').to_string())
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
        assert_eq!(parsed.http.pool_max_idle_per_host, 50);
        assert_eq!(parsed.http.max_retries, 3);
        assert_eq!(parsed.sync.course_workers, 10);
        assert_eq!(parsed.sync.item_workers, 20);
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let cfg: Config = toml::from_str("[lms]\nbase_url = \"https://canvas.test\"\n").unwrap();
        assert_eq!(cfg.lms.base_url, "https://canvas.test");
        assert_eq!(cfg.lms.owner, "default");
        assert_eq!(cfg.http.page_size, 100);
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("sync.item_workers").as_deref(), Some("20"));
        assert_eq!(cfg.get("lms.owner").as_deref(), Some("default"));
        assert!(cfg.get("sync").is_none());
        assert!(cfg.get("sync.missing_key").is_none());
    }

    #[test]
    fn set_updates_and_validates() {
        let mut cfg = Config::default();
        cfg.set("sync.course_workers", "4").unwrap();
        cfg.set("lms.base_url", "https://canvas.test").unwrap();
        assert_eq!(cfg.sync.course_workers, 4);
        assert_eq!(cfg.lms.base_url, "https://canvas.test");

        assert!(matches!(
            cfg.set("sync.item_workers", "0"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert_eq!(cfg.sync.item_workers, 20);
        assert!(matches!(
            cfg.set("http.page_size", "many"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            cfg.set("http.nonexistent", "1"),
            Err(ConfigError::UnknownKey(_))
        ));
    }

    #[test]
    fn load_from_missing_file_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg, Config::default());
        assert!(path.exists());

        let mut changed = cfg.clone();
        changed.lms.owner = "alice".into();
        changed.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap().lms.owner, "alice");
    }

    #[test]
    fn load_rejects_invalid_page_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[http]\npage_size = 500\n").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn college_shortcuts_resolve() {
        assert_eq!(resolve_base_url("MIT").unwrap(), "https://canvas.mit.edu");
        assert_eq!(resolve_base_url("uccs").unwrap(), "http://canvas.uccs.edu");
        assert_eq!(
            resolve_base_url("canvas.example.edu/").unwrap(),
            "https://canvas.example.edu"
        );
        assert_eq!(
            resolve_base_url("http://localhost:8080").unwrap(),
            "http://localhost:8080"
        );
        assert!(resolve_base_url("ftp://canvas.example.edu").is_err());
        assert!(resolve_base_url("").is_err());
    }
}
