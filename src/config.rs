//! Configuration module for Courier.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use crate::{CourierError, Result};

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port number to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// CORS allowed origins.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8025
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: vec![],
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "data/courier.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file. Empty disables file logging.
    #[serde(default)]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: String::new(),
        }
    }
}

/// File sources for a single named template.
///
/// At least one of the three sources must be set. When more than one is
/// present, selection follows the markdown > html > text precedence.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TemplateFilesConfig {
    /// Path to a markdown template file.
    pub markdown: Option<String>,
    /// Path to an HTML template file.
    pub html: Option<String>,
    /// Path to a plain-text template file.
    pub text: Option<String>,
}

impl TemplateFilesConfig {
    /// Whether any source is configured.
    pub fn has_source(&self) -> bool {
        self.markdown.is_some() || self.html.is_some() || self.text.is_some()
    }
}

/// Mail transport configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TransportConfig {
    /// Transport kind: "smtp", "api" or "stub".
    #[serde(rename = "type", default = "default_transport_type")]
    pub kind: String,
    /// SMTP options, used when kind is "smtp".
    #[serde(default)]
    pub smtp: SmtpConfig,
    /// HTTP API options, used when kind is "api".
    #[serde(default)]
    pub api: ApiConfig,
}

fn default_transport_type() -> String {
    "stub".to_string()
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            kind: default_transport_type(),
            smtp: SmtpConfig::default(),
            api: ApiConfig::default(),
        }
    }
}

/// SMTP transport options.
#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    /// SMTP server host.
    #[serde(default = "default_smtp_host")]
    pub host: String,
    /// SMTP server port.
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    /// Username for SMTP authentication.
    #[serde(default)]
    pub username: String,
    /// Password for SMTP authentication.
    ///
    /// Can be overridden with the `COURIER_SMTP_PASSWORD` environment
    /// variable.
    #[serde(default)]
    pub password: String,
    /// Use STARTTLS when connecting.
    #[serde(default = "default_smtp_starttls")]
    pub starttls: bool,
    /// Connection timeout in seconds.
    #[serde(default = "default_smtp_timeout")]
    pub timeout_secs: u64,
}

fn default_smtp_host() -> String {
    "localhost".to_string()
}

fn default_smtp_port() -> u16 {
    587
}

fn default_smtp_starttls() -> bool {
    true
}

fn default_smtp_timeout() -> u64 {
    30
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: default_smtp_host(),
            port: default_smtp_port(),
            username: String::new(),
            password: String::new(),
            starttls: default_smtp_starttls(),
            timeout_secs: default_smtp_timeout(),
        }
    }
}

/// HTTP API transport options.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Endpoint URL the mail payload is posted to.
    #[serde(default)]
    pub endpoint: String,
    /// Bearer token sent with each request.
    ///
    /// Can be overridden with the `COURIER_API_KEY` environment variable.
    #[serde(default)]
    pub api_key: String,
    /// Request timeout in seconds.
    #[serde(default = "default_api_timeout")]
    pub timeout_secs: u64,
}

fn default_api_timeout() -> u64 {
    30
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: String::new(),
            timeout_secs: default_api_timeout(),
        }
    }
}

/// Delivery queue configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    /// Poll interval in seconds for the background delivery task.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Backoff strategy for failed deliveries: "fixed" or "exponential".
    #[serde(default = "default_backoff_strategy")]
    pub backoff_strategy: String,
    /// Base delay in seconds before a failed item becomes eligible again.
    #[serde(default = "default_backoff_base")]
    pub backoff_base_secs: u64,
    /// Upper bound in seconds for the exponential backoff curve.
    #[serde(default = "default_backoff_max")]
    pub backoff_max_secs: u64,
    /// Maximum delivery attempts before an item is dropped.
    ///
    /// Unset means retry indefinitely.
    #[serde(default)]
    pub max_attempts: Option<u32>,
    /// How long a delivery claim is held, in seconds.
    ///
    /// An item claimed by a process that dies becomes claimable again once
    /// this lease expires.
    #[serde(default = "default_claim_lease")]
    pub claim_lease_secs: u64,
}

fn default_claim_lease() -> u64 {
    600
}

fn default_poll_interval() -> u64 {
    30
}

fn default_backoff_strategy() -> String {
    "exponential".to_string()
}

fn default_backoff_base() -> u64 {
    60
}

fn default_backoff_max() -> u64 {
    3600
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            backoff_strategy: default_backoff_strategy(),
            backoff_base_secs: default_backoff_base(),
            backoff_max_secs: default_backoff_max(),
            max_attempts: None,
            claim_lease_secs: default_claim_lease(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Registered templates by name.
    #[serde(default)]
    pub templates: HashMap<String, TemplateFilesConfig>,
    /// Mail transport configuration.
    #[serde(default)]
    pub transport: TransportConfig,
    /// Delivery queue configuration.
    #[serde(default)]
    pub queue: QueueConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(CourierError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable
    /// overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(s).map_err(|e| CourierError::Config(format!("config parse error: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `COURIER_SMTP_PASSWORD`: Override the SMTP password
    /// - `COURIER_API_KEY`: Override the API transport key
    pub fn apply_env_overrides(&mut self) {
        if let Ok(password) = std::env::var("COURIER_SMTP_PASSWORD") {
            if !password.is_empty() {
                self.transport.smtp.password = password;
            }
        }
        if let Ok(key) = std::env::var("COURIER_API_KEY") {
            if !key.is_empty() {
                self.transport.api.api_key = key;
            }
        }
    }

    /// Validate cross-field constraints.
    fn validate(&self) -> Result<()> {
        match self.transport.kind.as_str() {
            "smtp" | "stub" => {}
            "api" => {
                if self.transport.api.endpoint.is_empty() {
                    return Err(CourierError::Config(
                        "api transport requires transport.api.endpoint".to_string(),
                    ));
                }
            }
            other => {
                return Err(CourierError::Config(format!(
                    "unknown transport type '{other}' (expected 'smtp', 'api' or 'stub')"
                )));
            }
        }

        match self.queue.backoff_strategy.as_str() {
            "fixed" | "exponential" => {}
            other => {
                return Err(CourierError::Config(format!(
                    "unknown backoff strategy '{other}' (expected 'fixed' or 'exponential')"
                )));
            }
        }

        for (name, files) in &self.templates {
            if !files.has_source() {
                return Err(CourierError::Config(format!(
                    "template '{name}' has no markdown, html, or text source"
                )));
            }
        }

        Ok(())
    }
}
