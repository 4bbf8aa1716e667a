//! Configuration management for the widget.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Default biometric authentication service base URL.
pub const DEFAULT_AUTH_API_URL: &str = "https://api.ivalt.com";

/// Default `requestFrom` label sent with every biometric call.
pub const DEFAULT_REQUEST_FROM: &str = "iVALT AI Chatbot";

/// Default country reference endpoint.
pub const DEFAULT_COUNTRY_API_URL: &str = "https://restcountries.com/v3.1/all?fields=name,flags,idd";

/// Default chat-completion endpoint.
pub const DEFAULT_COMPLETION_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Default completion model.
pub const DEFAULT_COMPLETION_MODEL: &str = "gpt-3.5-turbo";

/// Default completion token cap.
pub const DEFAULT_COMPLETION_MAX_TOKENS: u32 = 150;

/// Default interval between result polls.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 4_000;

/// Default poll budget (150 * 4s = 600s).
pub const DEFAULT_POLL_MAX_ATTEMPTS: u32 = 150;

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

const ENV_LOG_LEVEL: &str = "BIOGATE_LOG_LEVEL";
const ENV_AUTH_API_URL: &str = "BIOGATE_AUTH_API_URL";
const ENV_COMPLETION_API_URL: &str = "BIOGATE_COMPLETION_API_URL";
const ENV_COMPLETION_MODEL: &str = "BIOGATE_COMPLETION_MODEL";
const ENV_AUTH_API_KEY: &str = "BIOGATE_AUTH_API_KEY";
const ENV_COMPLETION_API_KEY: &str = "BIOGATE_COMPLETION_API_KEY";
const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";

/// Main widget configuration.
///
/// Credentials live in [`Secrets`], never in this struct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
    /// Biometric authentication service base URL.
    pub auth_api_url: String,
    /// Caller label sent as `requestFrom`.
    pub request_from: String,
    /// Country reference endpoint (full URL including query).
    pub country_api_url: String,
    /// Chat-completion endpoint.
    pub completion_api_url: String,
    /// Completion model name.
    pub completion_model: String,
    /// Completion token cap.
    pub completion_max_tokens: u32,
    /// Interval between result polls, in milliseconds.
    pub poll_interval_ms: u64,
    /// Maximum number of result polls before timing out.
    pub poll_max_attempts: u32,
    /// Per-request HTTP timeout, in seconds.
    pub http_timeout_secs: u64,
    /// When false, chat is unlocked without biometric authentication.
    pub require_authentication: bool,
    /// Persist widget state between runs.
    pub persist_state: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            auth_api_url: DEFAULT_AUTH_API_URL.to_string(),
            request_from: DEFAULT_REQUEST_FROM.to_string(),
            country_api_url: DEFAULT_COUNTRY_API_URL.to_string(),
            completion_api_url: DEFAULT_COMPLETION_API_URL.to_string(),
            completion_model: DEFAULT_COMPLETION_MODEL.to_string(),
            completion_max_tokens: DEFAULT_COMPLETION_MAX_TOKENS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            poll_max_attempts: DEFAULT_POLL_MAX_ATTEMPTS,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            require_authentication: true,
            persist_state: true,
        }
    }
}

impl Config {
    /// Load configuration from the config file, falling back to defaults,
    /// then apply environment overrides.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.load_from_env();
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a file.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    fn load_from_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply overrides from an environment-like lookup. Blank values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |name: &str| lookup(name).and_then(non_empty);

        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            self.log_level = level;
        }
        if let Some(url) = lookup(ENV_AUTH_API_URL) {
            self.auth_api_url = url;
        }
        if let Some(url) = lookup(ENV_COMPLETION_API_URL) {
            self.completion_api_url = url;
        }
        if let Some(model) = lookup(ENV_COMPLETION_MODEL) {
            self.completion_model = model;
        }
    }

    /// Check that endpoints parse and the poll budget is usable.
    pub fn validate(&self) -> CoreResult<()> {
        Url::parse(&self.auth_api_url)?;
        Url::parse(&self.country_api_url)?;
        Url::parse(&self.completion_api_url)?;

        if self.poll_interval_ms == 0 {
            return Err(CoreError::Config("poll_interval_ms must be positive".into()));
        }
        if self.poll_max_attempts == 0 {
            return Err(CoreError::Config("poll_max_attempts must be positive".into()));
        }
        Ok(())
    }

    /// Biometric service base URL with any trailing slash removed.
    pub fn auth_base_url(&self) -> &str {
        self.auth_api_url.trim_end_matches('/')
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

/// Credentials injected by the host environment.
///
/// Never read from or written to the config file.
#[derive(Clone, Default)]
pub struct Secrets {
    pub auth_api_key: Option<String>,
    pub completion_api_key: Option<String>,
}

impl Secrets {
    /// Read credentials from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read credentials from an environment-like lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let lookup = |name: &str| lookup(name).and_then(non_empty);
        Self {
            auth_api_key: lookup(ENV_AUTH_API_KEY),
            completion_api_key: lookup(ENV_COMPLETION_API_KEY).or_else(|| lookup(ENV_OPENAI_API_KEY)),
        }
    }
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |value: &Option<String>| value.as_ref().map(|_| "<redacted>");
        f.debug_struct("Secrets")
            .field("auth_api_key", &redact(&self.auth_api_key))
            .field("completion_api_key", &redact(&self.completion_api_key))
            .finish()
    }
}

fn non_empty(raw: String) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.log_level, DEFAULT_LOG_LEVEL);
        assert_eq!(config.auth_api_url, DEFAULT_AUTH_API_URL);
        assert_eq!(config.poll_interval(), Duration::from_millis(4_000));
        assert_eq!(config.poll_max_attempts, 150);
        assert_eq!(config.completion_max_tokens, 150);
        assert!(config.require_authentication);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_load_from_partial_file() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.json");
        std::fs::write(&config_path, r#"{ "log_level": "debug", "poll_max_attempts": 10 }"#).unwrap();

        let config = Config::load_from_file(&config_path).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.poll_max_attempts, 10);
        assert_eq!(config.completion_model, DEFAULT_COMPLETION_MODEL);
    }

    #[test]
    fn test_config_save_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());

        let config = Config {
            log_level: "trace".to_string(),
            require_authentication: false,
            ..Config::default()
        };
        config.save(&paths).unwrap();

        let loaded = Config::load_from_file(&paths.config_file()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_config_load_nonexistent_uses_defaults() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());

        let config = Config::load(&paths).unwrap();
        assert_eq!(config.country_api_url, DEFAULT_COUNTRY_API_URL);
    }

    #[test]
    fn test_overrides_ignore_blank_values() {
        let mut config = Config::default();
        config.apply_overrides(env(&[
            ("BIOGATE_LOG_LEVEL", "  "),
            ("BIOGATE_AUTH_API_URL", "http://127.0.0.1:9000/"),
            ("BIOGATE_COMPLETION_MODEL", "gpt-4o-mini"),
        ]));

        assert_eq!(config.log_level, DEFAULT_LOG_LEVEL);
        assert_eq!(config.auth_api_url, "http://127.0.0.1:9000/");
        assert_eq!(config.auth_base_url(), "http://127.0.0.1:9000");
        assert_eq!(config.completion_model, "gpt-4o-mini");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = Config {
            auth_api_url: "not a url".to_string(),
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(CoreError::InvalidUrl(_))));

        let config = Config {
            poll_max_attempts: 0,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(CoreError::Config(_))));
    }

    #[test]
    fn test_secrets_fall_back_to_openai_key() {
        let secrets = Secrets::from_lookup(env(&[
            ("BIOGATE_AUTH_API_KEY", "auth-key"),
            ("OPENAI_API_KEY", "sk-test"),
        ]));
        assert_eq!(secrets.auth_api_key.as_deref(), Some("auth-key"));
        assert_eq!(secrets.completion_api_key.as_deref(), Some("sk-test"));

        let secrets = Secrets::from_lookup(env(&[
            ("BIOGATE_COMPLETION_API_KEY", "primary"),
            ("OPENAI_API_KEY", "fallback"),
        ]));
        assert_eq!(secrets.completion_api_key.as_deref(), Some("primary"));
        assert!(secrets.auth_api_key.is_none());
    }

    #[test]
    fn test_secrets_debug_redacts_values() {
        let secrets = Secrets {
            auth_api_key: Some("super-secret".to_string()),
            completion_api_key: None,
        };
        let rendered = format!("{:?}", secrets);
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
