use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use relay_core::{DispatchPolicy, ItemId, DEFAULT_REFETCH_LATEST};
use relay_logging::relay_debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable naming the JSON settings file.
pub const SETTINGS_FILE_ENV: &str = "RELAY_SETTINGS_FILE";
pub const DEFAULT_SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read settings from {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse settings: {0}")]
    Parse(String),
    #[error("invalid settings: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DestinationKind {
    Webhook,
    Podcast,
    Blog,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DestinationSettings {
    pub name: String,
    pub kind: DestinationKind,
    /// Its deliveries feed the globally processed ledger.
    #[serde(default)]
    pub primary: bool,
    #[serde(flatten)]
    pub policy: DispatchPolicy,
    #[serde(default)]
    pub webhook_urls: Vec<String>,
    #[serde(default = "default_text_max_length")]
    pub text_max_length: usize,
}

impl DestinationSettings {
    pub fn new(name: impl Into<String>, kind: DestinationKind) -> Self {
        Self {
            name: name.into(),
            kind,
            primary: false,
            policy: DispatchPolicy::default(),
            webhook_urls: Vec::new(),
            text_max_length: default_text_max_length(),
        }
    }
}

fn default_text_max_length() -> usize {
    100
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelaySettings {
    /// Kill switch; the scheduler idles while false.
    pub enabled: bool,
    pub polling_interval_secs: f64,
    pub settle_delay_secs: f64,
    pub refetch_latest: usize,
    pub iterations_until_refetch: u64,
    pub manual_items: Vec<ItemId>,
    pub start_from: Option<ItemId>,
    pub destinations: Vec<DestinationSettings>,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            enabled: true,
            polling_interval_secs: 60.0,
            settle_delay_secs: 10.0,
            refetch_latest: DEFAULT_REFETCH_LATEST,
            iterations_until_refetch: 10,
            manual_items: Vec::new(),
            start_from: None,
            destinations: Vec::new(),
        }
    }
}

impl RelaySettings {
    pub fn polling_interval(&self) -> Duration {
        secs_to_duration(self.polling_interval_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        secs_to_duration(self.settle_delay_secs)
    }

    /// Periodic rebuild interval in cycles, never below 1.
    pub fn refetch_every(&self) -> u64 {
        self.iterations_until_refetch.max(1)
    }

    /// The resume cursor, with an empty string treated as unset.
    pub fn start_from(&self) -> Option<&str> {
        self.start_from.as_deref().filter(|id| !id.is_empty())
    }

    pub fn destination(&self, name: &str) -> Option<&DestinationSettings> {
        self.destinations.iter().find(|d| d.name == name)
    }
}

fn secs_to_duration(secs: f64) -> Duration {
    if secs.is_finite() && secs > 0.0 {
        Duration::from_secs_f64(secs)
    } else {
        Duration::ZERO
    }
}

/// Source of [`RelaySettings`], consulted afresh on every use.
pub trait ConfigProvider: Send + Sync {
    fn settings(&self) -> Result<RelaySettings, ConfigError>;
}

/// Settings read from a JSON file on every call.
#[derive(Debug, Clone)]
pub struct JsonFileConfig {
    path: PathBuf,
}

impl JsonFileConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path from `RELAY_SETTINGS_FILE`, or `./settings.json`.
    pub fn from_env() -> Self {
        let path = env::var_os(SETTINGS_FILE_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_FILE));
        Self::new(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigProvider for JsonFileConfig {
    fn settings(&self) -> Result<RelaySettings, ConfigError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                relay_debug!("No settings file at {:?}; using defaults", self.path);
                return Ok(RelaySettings::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        serde_json::from_str(&text).map_err(|err| ConfigError::Parse(err.to_string()))
    }
}

/// In-memory settings that can be swapped while the relay runs.
#[derive(Debug, Default)]
pub struct StaticConfig {
    settings: RwLock<RelaySettings>,
}

impl StaticConfig {
    pub fn new(settings: RelaySettings) -> Self {
        Self {
            settings: RwLock::new(settings),
        }
    }

    pub fn replace(&self, settings: RelaySettings) {
        *self.settings.write().unwrap_or_else(PoisonError::into_inner) = settings;
    }

    pub fn update(&self, f: impl FnOnce(&mut RelaySettings)) {
        f(&mut self.settings.write().unwrap_or_else(PoisonError::into_inner));
    }
}

impl ConfigProvider for StaticConfig {
    fn settings(&self) -> Result<RelaySettings, ConfigError> {
        Ok(self
            .settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_object_yields_defaults() {
        let settings: RelaySettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, RelaySettings::default());
        assert_eq!(settings.polling_interval(), Duration::from_secs(60));
        assert_eq!(settings.refetch_every(), 10);
    }

    #[test]
    fn destination_policy_fields_are_flattened() {
        let json = r#"{
            "destinations": [{
                "name": "chat",
                "kind": "webhook",
                "primary": true,
                "title_pattern": "episode",
                "max_age_secs": 3600,
                "webhook_urls": ["https://example.com/hook"]
            }]
        }"#;
        let settings: RelaySettings = serde_json::from_str(json).unwrap();
        let chat = settings.destination("chat").unwrap();
        assert_eq!(chat.kind, DestinationKind::Webhook);
        assert!(chat.primary);
        assert!(chat.policy.enabled);
        assert_eq!(chat.policy.title_pattern, "episode");
        assert_eq!(chat.policy.max_age_secs, Some(3600));
        assert_eq!(chat.text_max_length, 100);
    }

    #[test]
    fn empty_cursor_and_zero_refetch_are_normalized() {
        let settings = RelaySettings {
            start_from: Some(String::new()),
            iterations_until_refetch: 0,
            polling_interval_secs: -1.0,
            ..RelaySettings::default()
        };
        assert_eq!(settings.start_from(), None);
        assert_eq!(settings.refetch_every(), 1);
        assert_eq!(settings.polling_interval(), Duration::ZERO);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = JsonFileConfig::new(dir.path().join("absent.json"));
        assert_eq!(config.settings().unwrap(), RelaySettings::default());
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();
        let err = JsonFileConfig::new(path).settings().unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
