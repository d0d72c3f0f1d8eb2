//! Service configuration
//!
//! Settings come from three layers, later ones winning: built-in defaults,
//! LSP `initializationOptions` / `workspace/didChangeConfiguration` payloads,
//! and the `YAML_ASSIST_CACHE_SIZE` environment variable.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::warn;

/// Environment variable overriding [`ServiceConfig::cache_size`]
pub const CACHE_SIZE_ENV: &str = "YAML_ASSIST_CACHE_SIZE";

/// Default `source` attached to every diagnostic
pub const DEFAULT_SOURCE: &str = "yaml-assist";

/// Default number of compiled validators kept alive
pub const DEFAULT_CACHE_SIZE: usize = 8;

/// Settings for one loaded schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceConfig {
    /// Reported as the `source` of each diagnostic
    pub source: String,
    /// Compiled validator cache capacity; 0 disables caching
    pub cache_size: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            source: DEFAULT_SOURCE.to_string(),
            cache_size: DEFAULT_CACHE_SIZE,
        }
    }
}

impl ServiceConfig {
    /// Defaults with environment overrides applied
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Apply environment overrides in place
    pub fn apply_env(&mut self) {
        if let Ok(raw) = std::env::var(CACHE_SIZE_ENV) {
            match raw.trim().parse() {
                Ok(size) => self.cache_size = size,
                Err(_) => warn!(value = %raw, "Ignoring invalid {}", CACHE_SIZE_ENV),
            }
        }
    }
}

/// Language server settings sent by the editor
///
/// ```json
/// { "schema": "./schema.json", "source": "compose", "cacheSize": 4 }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Schema file (JSON or YAML, by extension)
    pub schema: Option<PathBuf>,
    #[serde(flatten)]
    pub service: ServiceConfig,
}

impl ServerSettings {
    /// Settings from an LSP payload
    ///
    /// Accepts the settings at the top level or nested under `yamlAssist`.
    /// Malformed payloads fall back to defaults.
    pub fn from_json(value: Option<serde_json::Value>) -> Self {
        let Some(value) = value else {
            return Self::with_env(Self::default());
        };
        let value = match value.get("yamlAssist") {
            Some(nested) => nested.clone(),
            None => value,
        };
        match serde_json::from_value(value) {
            Ok(settings) => Self::with_env(settings),
            Err(err) => {
                warn!(error = %err, "Invalid yaml-assist settings, using defaults");
                Self::with_env(Self::default())
            }
        }
    }

    fn with_env(mut settings: Self) -> Self {
        settings.service.apply_env();
        settings
    }
}
