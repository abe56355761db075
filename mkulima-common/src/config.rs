//! Configuration management for the MkulimaMkononi gateway.
//!
//! The service reads an optional JSON file at `~/.mkulima/config.json`
//! (or the path in `MKULIMA_CONFIG`), then a `.env` file in the working
//! directory, then the process environment.
//!
//! # Configuration Priority
//!
//! 1. Environment variables (and `.env`)
//! 2. Explicit config file values
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! ## Server
//! - `PORT` → server.port
//! - `MKULIMA_BIND_ADDRESS` → server.host
//! - `MKULIMA_LOG_LEVEL` → observability.log_level
//! - `MKULIMA_LOG_FORMAT` → observability.log_format
//! - `MKULIMA_SESSION_TTL_SECS` → session.ttl_secs
//!
//! ## Credentials
//! - `AT_USERNAME`, `AT_API_KEY`, `AT_SENDER_ID`, `AT_SANDBOX` → sms.*
//! - `OPENWEATHER_API_KEY` → weather.api_key
//! - `GEOAPIFY_API_KEY` → store_locator.api_key
//! - `GEMINI_API_KEY` / `GOOGLE_API_KEY` → ai.api_key

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".mkulima"),
        |dirs| dirs.home_dir().join(".mkulima"),
    )
}

/// Get the configuration file path, honouring `MKULIMA_CONFIG`.
pub fn config_path() -> PathBuf {
    std::env::var("MKULIMA_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| config_dir().join("config.json"))
}

// ============================================================================
// Sections
// ============================================================================

/// HTTP listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address. Default "0.0.0.0" so the telecom gateway can reach us.
    #[serde(default = "default_host")]
    pub host: String,

    /// Listen port. Default 5000.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".into()
}

fn default_port() -> u16 {
    5000
}

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level", alias = "level")]
    pub log_level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

/// Outbound HTTP client settings shared by every provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Per-call timeout in seconds
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_http_timeout(),
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

fn default_http_timeout() -> u64 {
    10
}

/// Session store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Seconds a pending flow survives without an answer. 0 disables expiry.
    #[serde(default = "default_session_ttl")]
    pub ttl_secs: u64,

    /// Interval between expired-entry sweeps
    #[serde(default = "default_purge_interval")]
    pub purge_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_session_ttl(),
            purge_interval_secs: default_purge_interval(),
        }
    }
}

impl SessionConfig {
    /// TTL as a duration, `None` when expiry is disabled.
    pub fn ttl(&self) -> Option<Duration> {
        (self.ttl_secs > 0).then(|| Duration::from_secs(self.ttl_secs))
    }
}

fn default_session_ttl() -> u64 {
    300
}

fn default_purge_interval() -> u64 {
    60
}

/// Weather provider (OpenWeatherMap).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_weather_url")]
    pub base_url: String,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_weather_url(),
        }
    }
}

fn default_weather_url() -> String {
    "https://api.openweathermap.org".into()
}

/// Geocoding and places provider (Geoapify).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreLocatorConfig {
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_geoapify_url")]
    pub base_url: String,

    /// ISO 3166-1 alpha-2 country restriction for geocoding
    #[serde(default = "default_country_code")]
    pub country_code: String,

    /// Search radius around the geocoded area, in metres
    #[serde(default = "default_radius")]
    pub radius_m: u32,

    /// Places category filter
    #[serde(default = "default_category")]
    pub category: String,
}

impl Default for StoreLocatorConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_geoapify_url(),
            country_code: default_country_code(),
            radius_m: default_radius(),
            category: default_category(),
        }
    }
}

fn default_geoapify_url() -> String {
    "https://api.geoapify.com".into()
}

fn default_country_code() -> String {
    "ke".into()
}

fn default_radius() -> u32 {
    10_000
}

fn default_category() -> String {
    "commercial.agrarian".into()
}

/// Text generation provider (Gemini).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_ai_model")]
    pub model: String,

    #[serde(default = "default_gemini_url")]
    pub base_url: String,

    /// SMS-safe reply length before the ellipsis marker
    #[serde(default = "default_max_reply_chars")]
    pub max_reply_chars: usize,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_ai_model(),
            base_url: default_gemini_url(),
            max_reply_chars: default_max_reply_chars(),
        }
    }
}

fn default_ai_model() -> String {
    "gemini-2.0-flash".into()
}

fn default_gemini_url() -> String {
    "https://generativelanguage.googleapis.com".into()
}

fn default_max_reply_chars() -> usize {
    150
}

/// SMS delivery (Africa's Talking).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SmsConfig {
    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub api_key: Option<String>,

    /// Registered alphanumeric sender id / short code
    #[serde(default)]
    pub sender_id: Option<String>,

    /// Use the sandbox endpoint
    #[serde(default)]
    pub sandbox: bool,

    /// Override the messaging endpoint (tests, proxies)
    #[serde(default)]
    pub base_url: Option<String>,
}

impl SmsConfig {
    /// Messaging API base URL for the configured environment.
    pub fn endpoint(&self) -> String {
        match &self.base_url {
            Some(url) => url.clone(),
            None if self.sandbox || self.username.as_deref() == Some("sandbox") => {
                "https://api.sandbox.africastalking.com".into()
            }
            None => "https://api.africastalking.com".into(),
        }
    }
}

// ============================================================================
// Root
// ============================================================================

/// Root configuration structure for the gateway.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub weather: WeatherConfig,

    #[serde(default)]
    pub store_locator: StoreLocatorConfig,

    #[serde(default)]
    pub ai: AiConfig,

    #[serde(default)]
    pub sms: SmsConfig,
}

/// Which credential-backed features are usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FeatureStatus {
    pub weather: bool,
    pub store_locator: bool,
    pub ai: bool,
    pub sms: bool,
}

impl Config {
    /// Load configuration from the default path, `.env`, and the environment.
    pub fn load() -> Result<Self> {
        // .env is optional; a missing file is the normal production case
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!("Loaded environment from {}", path.display());
        }

        let path = config_path();
        let mut config = if path.exists() {
            Self::load_from(&path)?
        } else {
            tracing::info!("Config file not found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Apply process environment overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
        if let Some(host) = lookup("MKULIMA_BIND_ADDRESS") {
            self.server.host = host;
        }
        if let Some(level) = lookup("MKULIMA_LOG_LEVEL") {
            self.observability.log_level = level;
        }
        if let Some(format) = lookup("MKULIMA_LOG_FORMAT") {
            self.observability.log_format = format;
        }
        if let Some(ttl) = lookup("MKULIMA_SESSION_TTL_SECS").and_then(|t| t.parse().ok()) {
            self.session.ttl_secs = ttl;
        }

        // Credentials
        if let Some(username) = lookup("AT_USERNAME") {
            self.sms.username = Some(username);
        }
        if let Some(key) = lookup("AT_API_KEY") {
            self.sms.api_key = Some(key);
        }
        if let Some(sender) = lookup("AT_SENDER_ID") {
            self.sms.sender_id = Some(sender);
        }
        if let Some(sandbox) = lookup("AT_SANDBOX") {
            self.sms.sandbox = matches!(sandbox.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Some(key) = lookup("OPENWEATHER_API_KEY") {
            self.weather.api_key = Some(key);
        }
        if let Some(key) = lookup("GEOAPIFY_API_KEY") {
            self.store_locator.api_key = Some(key);
        }
        if let Some(key) = lookup("GEMINI_API_KEY").or_else(|| lookup("GOOGLE_API_KEY")) {
            self.ai.api_key = Some(key);
        }
    }

    /// Get the socket address string for the listener.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Weather API key, if set and non-empty.
    pub fn weather_api_key(&self) -> Option<&str> {
        non_empty(&self.weather.api_key)
    }

    /// Geoapify API key, if set and non-empty.
    pub fn geoapify_api_key(&self) -> Option<&str> {
        non_empty(&self.store_locator.api_key)
    }

    /// Gemini API key, if set and non-empty.
    pub fn ai_api_key(&self) -> Option<&str> {
        non_empty(&self.ai.api_key)
    }

    /// Africa's Talking username and API key, when both are present.
    pub fn sms_credentials(&self) -> Option<(&str, &str)> {
        Some((non_empty(&self.sms.username)?, non_empty(&self.sms.api_key)?))
    }

    /// Report which features have their credentials.
    pub fn feature_status(&self) -> FeatureStatus {
        FeatureStatus {
            weather: self.weather_api_key().is_some(),
            store_locator: self.geoapify_api_key().is_some(),
            ai: self.ai_api_key().is_some(),
            sms: self.sms_credentials().is_some(),
        }
    }

    /// Log a warning for each feature that will run degraded.
    pub fn warn_missing_credentials(&self) {
        let status = self.feature_status();
        if !status.sms {
            tracing::warn!(
                "Africa's Talking credentials (AT_USERNAME, AT_API_KEY) not found; SMS replies disabled"
            );
        }
        if !status.weather {
            tracing::warn!("OPENWEATHER_API_KEY not set; weather forecast disabled");
        }
        if !status.store_locator {
            tracing::warn!("GEOAPIFY_API_KEY not set; agro-dealer locator disabled");
        }
        if !status.ai {
            tracing::warn!("GEMINI_API_KEY not set; SMS AI questions disabled");
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.bind_address(), "0.0.0.0:5000");
        assert_eq!(config.ai.max_reply_chars, 150);
        assert_eq!(config.store_locator.country_code, "ke");
        assert_eq!(config.session.ttl(), Some(Duration::from_secs(300)));
        assert_eq!(
            config.feature_status(),
            FeatureStatus {
                weather: false,
                store_locator: false,
                ai: false,
                sms: false,
            }
        );
    }

    #[test]
    fn test_load_from_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "server": {{ "port": 8080 }}, "weather": {{ "api_key": "ow-key" }} }}"#
        )
        .unwrap();

        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.weather_api_key(), Some("ow-key"));
        assert_eq!(config.weather.base_url, "https://api.openweathermap.org");
    }

    #[test]
    fn test_load_from_invalid_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(Config::load_from(file.path()).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("PORT", "7000"),
            ("AT_USERNAME", "sandbox"),
            ("AT_API_KEY", "at-key"),
            ("GOOGLE_API_KEY", "g-key"),
            ("MKULIMA_SESSION_TTL_SECS", "0"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_env_with(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.server.port, 7000);
        assert_eq!(config.sms_credentials(), Some(("sandbox", "at-key")));
        assert_eq!(config.sms.endpoint(), "https://api.sandbox.africastalking.com");
        assert_eq!(config.ai_api_key(), Some("g-key"));
        assert_eq!(config.session.ttl(), None);
    }

    #[test]
    fn test_empty_credentials_count_as_missing() {
        let mut config = Config::default();
        config.weather.api_key = Some("   ".into());
        config.sms.username = Some("farmer".into());
        config.sms.api_key = Some(String::new());

        let status = config.feature_status();
        assert!(!status.weather);
        assert!(!status.sms);
    }

    #[test]
    fn test_invalid_port_override_is_ignored() {
        let mut config = Config::default();
        config.apply_env_with(|k| (k == "PORT").then(|| "not-a-port".to_string()));
        assert_eq!(config.server.port, 5000);
    }
}
