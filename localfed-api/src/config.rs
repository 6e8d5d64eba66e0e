//! Federation configuration.
//!
//! Loaded from TOML or JSON, then overlaid with environment variables.
//!
//! ## Precedence (highest to lowest)
//!
//! 1. Environment variables (`LOCALFED_*`)
//! 2. Config file
//! 3. Hardcoded defaults
//!
//! ```toml
//! registration_policy = "replace"
//! batch_size = 500
//! query_timeout_ms = 30000
//! ```

use crate::error::ConfigError;
use localfed_query::RegistrationPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

// ── Defaults ────────────────────────────────────────────────────────

pub const DEFAULT_BATCH_SIZE: usize = localfed_query::DEFAULT_BATCH_SIZE;
pub const DEFAULT_AUTO_INITIALIZE: bool = true;
pub const DEFAULT_WARN_ON_NONSTANDARD_IRI: bool = true;

// ── Environment ─────────────────────────────────────────────────────

pub const ENV_REGISTRATION_POLICY: &str = "LOCALFED_REGISTRATION_POLICY";
pub const ENV_BATCH_SIZE: &str = "LOCALFED_BATCH_SIZE";
pub const ENV_QUERY_TIMEOUT_MS: &str = "LOCALFED_QUERY_TIMEOUT_MS";

/// Settings for a [`LocalFederation`](crate::LocalFederation).
///
/// Every field has a default, so a config file only needs the values it
/// changes. Unknown keys are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FederationConfig {
    /// What happens when a service id is registered twice
    pub registration_policy: RegistrationPolicy,
    /// Target rows per batch produced by SERVICE operators
    pub batch_size: usize,
    /// Per-query deadline; `None` runs without one
    pub query_timeout_ms: Option<u64>,
    /// Activate the registry when the federation is built
    pub auto_initialize: bool,
    /// Log a warning when a service id is outside the local URN scheme
    pub warn_on_nonstandard_iri: bool,
}

impl Default for FederationConfig {
    fn default() -> Self {
        Self {
            registration_policy: RegistrationPolicy::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            query_timeout_ms: None,
            auto_initialize: DEFAULT_AUTO_INITIALIZE,
            warn_on_nonstandard_iri: DEFAULT_WARN_ON_NONSTANDARD_IRI,
        }
    }
}

impl FederationConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: PathBuf::from("<toml>"),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(content).map_err(|e| ConfigError::Parse {
            path: PathBuf::from("<json>"),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file. Detects format by extension: `.toml` or `.json`;
    /// any other extension is rejected. An empty file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let format = ConfigFormat::from_path(path).ok_or_else(|| ConfigError::Parse {
            path: path.to_path_buf(),
            message: "unsupported config file extension (expected .toml or .json)".to_string(),
        })?;

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let parsed: Result<Self, String> = match format {
            ConfigFormat::Json => serde_json::from_str(&content).map_err(|e| e.to_string()),
            ConfigFormat::Toml => toml::from_str(&content).map_err(|e| e.to_string()),
        };
        let config = parsed.map_err(|message| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        })?;
        config.validate()?;
        tracing::debug!(path = %path.display(), ?config, "loaded federation config");
        Ok(config)
    }

    /// Overlay `LOCALFED_*` variables from the process environment
    pub fn apply_env(self) -> Result<Self, ConfigError> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Overlay `LOCALFED_*` variables read through `lookup`
    pub fn apply_env_from(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(raw) = lookup(ENV_REGISTRATION_POLICY) {
            self.registration_policy = parse_policy(raw.trim())
                .ok_or_else(|| ConfigError::invalid(ENV_REGISTRATION_POLICY, raw.clone()))?;
        }
        if let Some(raw) = lookup(ENV_BATCH_SIZE) {
            self.batch_size = raw
                .trim()
                .parse()
                .map_err(|e| ConfigError::invalid(ENV_BATCH_SIZE, format!("{raw}: {e}")))?;
        }
        if let Some(raw) = lookup(ENV_QUERY_TIMEOUT_MS) {
            let raw = raw.trim();
            self.query_timeout_ms = if raw.is_empty() {
                None
            } else {
                Some(raw.parse().map_err(|e| {
                    ConfigError::invalid(ENV_QUERY_TIMEOUT_MS, format!("{raw}: {e}"))
                })?)
            };
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::invalid("batch_size", "must be at least 1"));
        }
        if self.query_timeout_ms == Some(0) {
            return Err(ConfigError::invalid(
                "query_timeout_ms",
                "must be positive; omit it to disable the deadline",
            ));
        }
        Ok(())
    }

    pub fn query_timeout(&self) -> Option<Duration> {
        self.query_timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        if ext.eq_ignore_ascii_case("toml") {
            Some(ConfigFormat::Toml)
        } else if ext.eq_ignore_ascii_case("json") {
            Some(ConfigFormat::Json)
        } else {
            None
        }
    }
}

fn parse_policy(s: &str) -> Option<RegistrationPolicy> {
    match s.to_ascii_lowercase().as_str() {
        "strict" => Some(RegistrationPolicy::Strict),
        "replace" => Some(RegistrationPolicy::Replace),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = FederationConfig::default();
        assert_eq!(config.registration_policy, RegistrationPolicy::Strict);
        assert_eq!(config.batch_size, 1000);
        assert_eq!(config.query_timeout(), None);
        assert!(config.auto_initialize);
        assert!(config.warn_on_nonstandard_iri);
    }

    #[test]
    fn test_load_toml() {
        let toml = r#"
registration_policy = "replace"
batch_size = 250
query_timeout_ms = 1500
auto_initialize = false
"#;
        let config = FederationConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.registration_policy, RegistrationPolicy::Replace);
        assert_eq!(config.batch_size, 250);
        assert_eq!(config.query_timeout(), Some(Duration::from_millis(1500)));
        assert!(!config.auto_initialize);
        assert!(config.warn_on_nonstandard_iri);
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            ConfigFormat::from_path(Path::new("fed.TOML")),
            Some(ConfigFormat::Toml)
        );
        assert_eq!(
            ConfigFormat::from_path(Path::new("conf/fed.json")),
            Some(ConfigFormat::Json)
        );
        assert_eq!(ConfigFormat::from_path(Path::new("fed.yaml")), None);
        assert_eq!(ConfigFormat::from_path(Path::new("fed")), None);
    }

    #[test]
    fn test_load_json_partial() {
        let config = FederationConfig::from_json_str(r#"{"batch_size": 8}"#).unwrap();
        assert_eq!(config.batch_size, 8);
        assert_eq!(config.registration_policy, RegistrationPolicy::Strict);
    }

    #[test]
    fn test_unknown_keys_tolerated() {
        let config = FederationConfig::from_toml_str("log_level = \"debug\"\n").unwrap();
        assert_eq!(config, FederationConfig::default());
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            FederationConfig::from_toml_str("registration_policy = \"sometimes\""),
            Err(ConfigError::Parse { .. })
        ));
        assert!(matches!(
            FederationConfig::from_toml_str("batch_size = 0"),
            Err(ConfigError::InvalidValue { key: "batch_size", .. })
        ));
        assert!(matches!(
            FederationConfig::from_json_str(r#"{"query_timeout_ms": 0}"#),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_env_overrides_file() {
        let file = FederationConfig::from_toml_str("batch_size = 10\nquery_timeout_ms = 99").unwrap();
        let config = file
            .apply_env_from(env(&[
                (ENV_REGISTRATION_POLICY, "Replace"),
                (ENV_BATCH_SIZE, " 64 "),
                (ENV_QUERY_TIMEOUT_MS, ""),
            ]))
            .unwrap();
        assert_eq!(config.registration_policy, RegistrationPolicy::Replace);
        assert_eq!(config.batch_size, 64);
        assert_eq!(config.query_timeout_ms, None);
    }

    #[test]
    fn test_env_absent_keeps_file_values() {
        let file = FederationConfig::from_toml_str("batch_size = 10").unwrap();
        let config = file.clone().apply_env_from(env(&[])).unwrap();
        assert_eq!(config, file);
    }

    #[test]
    fn test_env_invalid_value() {
        let err = FederationConfig::default()
            .apply_env_from(env(&[(ENV_BATCH_SIZE, "lots")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: ENV_BATCH_SIZE, .. }));

        let err = FederationConfig::default()
            .apply_env_from(env(&[(ENV_REGISTRATION_POLICY, "merge")]))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_REGISTRATION_POLICY));
    }
}
