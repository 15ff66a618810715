use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::db::DEFAULT_BUSY_TIMEOUT_MS;
use crate::error::AppError;

pub const ENV_DB_PATH: &str = "ERM_DB_PATH";
pub const ENV_NOTIFY_ENDPOINT: &str = "ERM_NOTIFY_ENDPOINT";

pub const DEFAULT_NOTIFY_TIMEOUT_MS: u64 = 10_000;

fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

fn default_notify_timeout_ms() -> u64 {
    DEFAULT_NOTIFY_TIMEOUT_MS
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotifyConfig {
    /// Relay that accepts one JSON message per recipient.
    pub endpoint: String,
    #[serde(default = "default_notify_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub sender: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EngineConfig {
    pub db_path: PathBuf,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// Notifications are disabled when absent.
    #[serde(default)]
    pub notify: Option<NotifyConfig>,
}

impl EngineConfig {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            notify: None,
        }
    }

    /// Apply `ERM_DB_PATH` / `ERM_NOTIFY_ENDPOINT` overrides from `lookup`
    /// (normally `std::env::var`).
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(ENV_DB_PATH).filter(|p| !p.trim().is_empty()) {
            self.db_path = PathBuf::from(path.trim());
        }
        if let Some(endpoint) = lookup(ENV_NOTIFY_ENDPOINT).filter(|e| !e.trim().is_empty()) {
            let endpoint = endpoint.trim().to_string();
            match self.notify.as_mut() {
                Some(n) => n.endpoint = endpoint,
                None => {
                    self.notify = Some(NotifyConfig {
                        endpoint,
                        timeout_ms: DEFAULT_NOTIFY_TIMEOUT_MS,
                        sender: None,
                    })
                }
            }
        }
        self
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.db_path.as_os_str().is_empty() {
            return Err(
                AppError::new("CONFIG_INVALID", "db_path is required").with_fields(["db_path"])
            );
        }
        if self.busy_timeout_ms == 0 {
            return Err(AppError::new("CONFIG_INVALID", "busy_timeout_ms must be positive")
                .with_fields(["busy_timeout_ms"]));
        }
        if let Some(n) = &self.notify {
            let endpoint = n.endpoint.trim();
            let host = endpoint
                .strip_prefix("https://")
                .or_else(|| endpoint.strip_prefix("http://"));
            if host.map_or(true, |h| h.is_empty() || h.starts_with('/')) {
                return Err(AppError::new(
                    "CONFIG_INVALID",
                    "notify.endpoint must be an http(s) URL",
                )
                .with_details(format!("endpoint={endpoint}"))
                .with_fields(["notify.endpoint"]));
            }
            if n.timeout_ms == 0 {
                return Err(AppError::new("CONFIG_INVALID", "notify.timeout_ms must be positive")
                    .with_fields(["notify.timeout_ms"]));
            }
        }
        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<EngineConfig, AppError> {
    let bytes = fs::read(path).map_err(|e| {
        AppError::new("CONFIG_READ_FAILED", "Failed to read engine config")
            .with_details(format!("path={}: {}", path.display(), e))
    })?;
    let config: EngineConfig = serde_json::from_slice(&bytes).map_err(|e| {
        AppError::new("CONFIG_DECODE_FAILED", "Failed to decode engine config JSON")
            .with_details(format!("path={}: {}", path.display(), e))
    })?;
    let config = config.with_overrides(|k| std::env::var(k).ok());
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_fill_optional_fields() {
        let cfg: EngineConfig =
            serde_json::from_str(r#"{"db_path":"/var/lib/erm/erm.sqlite"}"#).unwrap();
        assert_eq!(cfg.busy_timeout_ms, DEFAULT_BUSY_TIMEOUT_MS);
        assert_eq!(cfg.notify, None);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn overrides_replace_path_and_enable_notify() {
        let cfg = EngineConfig::new("a.sqlite").with_overrides(|k| match k {
            ENV_DB_PATH => Some(" b.sqlite ".to_string()),
            ENV_NOTIFY_ENDPOINT => Some("https://relay.example.org/send".to_string()),
            _ => None,
        });
        assert_eq!(cfg.db_path, PathBuf::from("b.sqlite"));
        let notify = cfg.notify.expect("notify");
        assert_eq!(notify.endpoint, "https://relay.example.org/send");
        assert_eq!(notify.timeout_ms, DEFAULT_NOTIFY_TIMEOUT_MS);
    }

    #[test]
    fn rejects_bad_endpoint_and_empty_path() {
        let mut cfg = EngineConfig::new("");
        assert_eq!(cfg.validate().unwrap_err().fields, vec!["db_path".to_string()]);

        cfg.db_path = PathBuf::from("x.sqlite");
        cfg.notify = Some(NotifyConfig {
            endpoint: "ftp://relay".to_string(),
            timeout_ms: 100,
            sender: None,
        });
        let err = cfg.validate().unwrap_err();
        assert_eq!(err.fields, vec!["notify.endpoint".to_string()]);
    }
}
