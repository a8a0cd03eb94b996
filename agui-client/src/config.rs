//! Client configuration: YAML file, environment overrides, retry policy.
//!
//! Precedence is CLI flag > `AGUI_*` environment variable > config file >
//! built-in default. The file lives at
//! `~/.config/ag-ui/client/config.yaml` unless `AGUI_CONFIG_PATH` points
//! elsewhere; sessions are stored next to it.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ClientError;

/// Default producer endpoint.
pub const DEFAULT_SERVER: &str = "http://localhost:8000";

/// How a command renders events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Pretty terminal output.
    #[default]
    Text,
    /// One JSON event per line.
    Json,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Client configuration, persisted as YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the producer.
    pub server: String,
    /// API key sent with every request, if set.
    pub api_key: Option<String>,
    /// Header the key travels in (`Authorization` or `X-API-Key`).
    pub auth_header: String,
    /// Optional scheme prefix (`Bearer`, ...) used with `Authorization`.
    pub auth_scheme: Option<String>,
    /// Thread id of the most recently used session.
    pub last_session: Option<String>,
    /// Event rendering mode.
    pub output: OutputMode,
    /// Log verbosity (tracing filter directive).
    pub log_level: String,
    /// Log output format.
    pub log_format: LogFormat,
    /// Overall request deadline in seconds; SSE streams run without one
    /// unless set.
    pub timeout_secs: Option<u64>,
    /// Local tool execution timeout in seconds.
    pub tool_timeout_secs: u64,
    /// Retry policy for transient transport failures.
    pub retry: RetryConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server: DEFAULT_SERVER.to_string(),
            api_key: None,
            auth_header: "Authorization".to_string(),
            auth_scheme: Some("Bearer".to_string()),
            last_session: None,
            output: OutputMode::default(),
            log_level: "info".to_string(),
            log_format: LogFormat::default(),
            timeout_secs: None,
            tool_timeout_secs: 30,
            retry: RetryConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Resolve the config directory: `AGUI_CONFIG_PATH` or the platform
    /// config dir under `ag-ui/client`.
    pub fn config_dir() -> PathBuf {
        if let Ok(path) = std::env::var("AGUI_CONFIG_PATH") {
            return PathBuf::from(path);
        }
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ag-ui")
            .join("client")
    }

    /// Path of the YAML config file inside `dir`.
    pub fn config_path(dir: &Path) -> PathBuf {
        dir.join("config.yaml")
    }

    /// Load from a YAML file, or defaults if the file does not exist.
    pub fn load(path: &Path) -> Result<Self, ClientError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&raw)
            .map_err(|e| ClientError::Configuration(format!("invalid config file: {}", e)))
    }

    /// Write to a YAML file, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ClientError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let raw = serde_yaml::to_string(self)
            .map_err(|e| ClientError::Configuration(format!("cannot serialize config: {}", e)))?;
        std::fs::write(path, raw)?;
        Ok(())
    }

    /// Fold `AGUI_*` environment variables over the file values.
    pub fn apply_env(&mut self) {
        if let Ok(server) = std::env::var("AGUI_SERVER") {
            self.server = server;
        }
        if let Ok(key) = std::env::var("AGUI_API_KEY") {
            self.api_key = Some(key);
        }
        if let Ok(header) = std::env::var("AGUI_AUTH_HEADER") {
            self.auth_header = header;
        }
        if let Ok(scheme) = std::env::var("AGUI_AUTH_SCHEME") {
            self.auth_scheme = if scheme.is_empty() { None } else { Some(scheme) };
        }
        if let Ok(level) = std::env::var("AGUI_LOG_LEVEL") {
            self.log_level = level;
        }
        if let Ok(format) = std::env::var("AGUI_LOG_FORMAT") {
            if format.eq_ignore_ascii_case("json") {
                self.log_format = LogFormat::Json;
            } else {
                self.log_format = LogFormat::Text;
            }
        }
        if let Ok(output) = std::env::var("AGUI_OUTPUT") {
            if output.eq_ignore_ascii_case("json") {
                self.output = OutputMode::Json;
            } else {
                self.output = OutputMode::Text;
            }
        }
    }

    /// Read one config key by name (for `config get`).
    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "server" => Some(self.server.clone()),
            "api-key" => self.api_key.clone(),
            "auth-header" => Some(self.auth_header.clone()),
            "auth-scheme" => self.auth_scheme.clone(),
            "last-session" => self.last_session.clone(),
            "log-level" => Some(self.log_level.clone()),
            "log-format" => Some(format!("{:?}", self.log_format).to_lowercase()),
            "output" => Some(format!("{:?}", self.output).to_lowercase()),
            "timeout-secs" => self.timeout_secs.map(|t| t.to_string()),
            "tool-timeout-secs" => Some(self.tool_timeout_secs.to_string()),
            _ => None,
        }
    }

    /// Set one config key by name (for `config set`).
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ClientError> {
        match key {
            "server" => self.server = value.to_string(),
            "api-key" => self.api_key = Some(value.to_string()),
            "auth-header" => self.auth_header = value.to_string(),
            "auth-scheme" => self.auth_scheme = Some(value.to_string()),
            "last-session" => self.last_session = Some(value.to_string()),
            "log-level" => self.log_level = value.to_string(),
            "log-format" => {
                self.log_format = match value {
                    "json" => LogFormat::Json,
                    "text" => LogFormat::Text,
                    other => {
                        return Err(ClientError::Validation(format!(
                            "log-format must be text or json, got '{}'",
                            other
                        )))
                    }
                }
            }
            "output" => {
                self.output = match value {
                    "json" => OutputMode::Json,
                    "text" => OutputMode::Text,
                    other => {
                        return Err(ClientError::Validation(format!(
                            "output must be text or json, got '{}'",
                            other
                        )))
                    }
                }
            }
            "timeout-secs" => {
                self.timeout_secs = Some(value.parse().map_err(|_| {
                    ClientError::Validation(format!("timeout-secs must be a number, got '{}'", value))
                })?)
            }
            "tool-timeout-secs" => {
                self.tool_timeout_secs = value.parse().map_err(|_| {
                    ClientError::Validation(format!(
                        "tool-timeout-secs must be a number, got '{}'",
                        value
                    ))
                })?
            }
            other => {
                return Err(ClientError::Validation(format!(
                    "unknown config key '{}'",
                    other
                )))
            }
        }
        Ok(())
    }

    /// Clear one config key (for `config unset`).
    pub fn unset(&mut self, key: &str) -> Result<(), ClientError> {
        match key {
            "api-key" => self.api_key = None,
            "auth-scheme" => self.auth_scheme = None,
            "last-session" => self.last_session = None,
            "timeout-secs" => self.timeout_secs = None,
            other => {
                return Err(ClientError::Validation(format!(
                    "config key '{}' cannot be unset",
                    other
                )))
            }
        }
        Ok(())
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// Configuration for automatic retry behavior.
///
/// Exponential backoff: base_delay × 2^attempt with jitter, capped at
/// max_delay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 2).
    pub max_retries: u32,
    /// Base delay for exponential backoff, in milliseconds.
    pub base_delay_ms: u64,
    /// Maximum delay between retries, in milliseconds.
    pub max_delay_ms: u64,
    /// Jitter fraction (0.0-1.0) applied to each delay.
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay_ms: 500,
            max_delay_ms: 8_000,
            jitter: 0.25,
        }
    }
}

impl RetryConfig {
    /// Disable retries.
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Calculate the delay for a given retry attempt (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        use rand::Rng;

        let base = self.base_delay_ms as f64 * 2_f64.powi(attempt as i32);
        let jitter_range = base * self.jitter;
        let jitter = if jitter_range > 0.0 {
            rand::thread_rng().gen_range(-jitter_range..=jitter_range)
        } else {
            0.0
        };
        let delay_ms = (base + jitter).max(0.0).min(self.max_delay_ms as f64);
        Duration::from_millis(delay_ms as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.server, DEFAULT_SERVER);
        assert_eq!(config.auth_header, "Authorization");
        assert_eq!(config.auth_scheme.as_deref(), Some("Bearer"));
        assert_eq!(config.tool_timeout(), Duration::from_secs(30));
        assert!(config.request_timeout().is_none());
    }

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let dir = TempDir::new().unwrap();
        let config = ClientConfig::load(&dir.path().join("config.yaml")).unwrap();
        assert_eq!(config.server, DEFAULT_SERVER);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.yaml");

        let mut config = ClientConfig::default();
        config.server = "http://example.com:9000".to_string();
        config.api_key = Some("key-123".to_string());
        config.save(&path).unwrap();

        let loaded = ClientConfig::load(&path).unwrap();
        assert_eq!(loaded.server, "http://example.com:9000");
        assert_eq!(loaded.api_key.as_deref(), Some("key-123"));
    }

    #[test]
    fn test_invalid_yaml_is_configuration_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, ":\n  - not valid yaml structure [").unwrap();
        let result = ClientConfig::load(&path);
        assert!(matches!(result, Err(ClientError::Configuration(_))));
    }

    #[test]
    fn test_get_set_unset_round_trip() {
        let mut config = ClientConfig::default();
        config.set("server", "http://other:1234").unwrap();
        config.set("output", "json").unwrap();
        config.set("timeout-secs", "90").unwrap();
        assert_eq!(config.get("server").unwrap(), "http://other:1234");
        assert_eq!(config.get("output").unwrap(), "json");
        assert_eq!(config.get("timeout-secs").unwrap(), "90");

        config.unset("timeout-secs").unwrap();
        assert!(config.get("timeout-secs").is_none());
    }

    #[test]
    fn test_set_rejects_bad_values() {
        let mut config = ClientConfig::default();
        assert!(config.set("output", "xml").is_err());
        assert!(config.set("timeout-secs", "soon").is_err());
        assert!(config.set("no-such-key", "x").is_err());
        assert!(config.unset("server").is_err());
    }

    #[test]
    fn test_retry_delay_growth_and_cap() {
        let config = RetryConfig {
            max_retries: 10,
            base_delay_ms: 100,
            max_delay_ms: 1_000,
            jitter: 0.0,
        };
        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(400));
        // 100 * 2^6 = 6400, capped.
        assert_eq!(config.delay_for_attempt(6), Duration::from_millis(1_000));
    }

    #[test]
    fn test_retry_jitter_stays_in_band() {
        let config = RetryConfig {
            max_retries: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 60_000,
            jitter: 0.25,
        };
        for _ in 0..32 {
            let delay = config.delay_for_attempt(0).as_millis();
            assert!((750..=1_250).contains(&delay), "{}", delay);
        }
    }

    #[test]
    fn test_retry_disabled() {
        assert_eq!(RetryConfig::disabled().max_retries, 0);
    }
}
