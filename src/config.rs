// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Configuration for the CSP report relay.
//!
//! The configuration is built once at startup and shared read-only with
//! every request handler.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use url::Url;

/// Configuration errors raised while loading or validating [`Config`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value:?}")]
    InvalidValue { var: &'static str, value: String },

    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Allowed origin must be a bare http(s) origin, got {0:?}")]
    InvalidOrigin(String),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("Report path must start with '/', got {0:?}")]
    InvalidPath(String),

    #[error("Metrics path {0:?} is already served by the health check")]
    ReservedPath(String),
}

/// Paths the router always mounts the health check on.
pub const HEALTH_PATHS: [&str; 2] = ["/health", "/healthz"];

/// Configuration for the CSP report relay service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server bind address (default: 0.0.0.0:8080)
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Path the report endpoint is mounted on (default: /csp-report)
    #[serde(default = "default_report_path")]
    pub report_path: String,

    /// The only `Origin` header value accepted
    #[serde(default = "default_allowed_origin")]
    pub allowed_origin: String,

    /// Notification email configuration
    #[serde(default)]
    pub email: EmailConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Metrics configuration
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Notification email settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    #[serde(default = "default_email_from")]
    pub from: String,

    #[serde(default = "default_email_to")]
    pub to: String,

    #[serde(default = "default_email_subject")]
    pub subject: String,

    /// SendGrid API key
    #[serde(default)]
    pub api_key: String,

    /// SendGrid API base URL (default: https://api.sendgrid.com)
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

// Keep the credential out of logs.
impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("subject", &self.subject)
            .field("api_key", &"<redacted>")
            .field("api_base", &self.api_base)
            .finish()
    }
}

/// Sliding window rate limiting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// File holding the admitted timestamps. `None` keeps them in memory.
    #[serde(default = "default_storage_path")]
    pub storage_path: Option<PathBuf>,

    /// Maximum admitted reports per window (default: 10)
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,

    /// Window length in seconds (default: 60)
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable Prometheus metrics endpoint (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Metrics endpoint path (default: /metrics)
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

// Default value functions
fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_report_path() -> String {
    "/csp-report".to_string()
}

fn default_allowed_origin() -> String {
    "https://example.com".to_string()
}

fn default_email_from() -> String {
    "csp-reports@example.com".to_string()
}

fn default_email_to() -> String {
    "security@example.com".to_string()
}

fn default_email_subject() -> String {
    "Content Security Policy Violation Report".to_string()
}

fn default_api_base() -> String {
    "https://api.sendgrid.com".to_string()
}

fn default_storage_path() -> Option<PathBuf> {
    Some(PathBuf::from("/tmp/csp_rate_limit.json"))
}

fn default_max_requests() -> u32 {
    10
}

fn default_window_secs() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            report_path: default_report_path(),
            allowed_origin: default_allowed_origin(),
            email: EmailConfig::default(),
            rate_limit: RateLimitConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            from: default_email_from(),
            to: default_email_to(),
            subject: default_email_subject(),
            api_key: String::new(),
            api_base: default_api_base(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            storage_path: default_storage_path(),
            max_requests: default_max_requests(),
            window_secs: default_window_secs(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            path: default_metrics_path(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(v) = lookup("BIND_ADDR") {
            config.bind_addr = v;
        }
        if let Some(v) = lookup("REPORT_PATH") {
            config.report_path = v;
        }
        if let Some(v) = lookup("ALLOWED_ORIGIN") {
            config.allowed_origin = v;
        }
        if let Some(v) = lookup("EMAIL_FROM") {
            config.email.from = v;
        }
        if let Some(v) = lookup("EMAIL_TO") {
            config.email.to = v;
        }
        if let Some(v) = lookup("EMAIL_SUBJECT") {
            config.email.subject = v;
        }
        if let Some(v) = lookup("SENDGRID_API_KEY") {
            config.email.api_key = v;
        }
        if let Some(v) = lookup("SENDGRID_API_BASE") {
            config.email.api_base = v;
        }
        if let Some(v) = lookup("RATE_LIMIT_FILE") {
            // An empty value selects the in-memory window
            config.rate_limit.storage_path = (!v.is_empty()).then(|| PathBuf::from(v));
        }
        if let Some(v) = lookup("MAX_REQUESTS") {
            config.rate_limit.max_requests = parse_var("MAX_REQUESTS", v)?;
        }
        if let Some(v) = lookup("TIME_WINDOW_SECS") {
            config.rate_limit.window_secs = parse_var("TIME_WINDOW_SECS", v)?;
        }
        if let Some(v) = lookup("METRICS_ENABLED") {
            config.metrics.enabled = parse_var("METRICS_ENABLED", v)?;
        }
        if let Some(v) = lookup("METRICS_PATH") {
            config.metrics.path = v;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check the invariants the handler relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_bare_origin(&self.allowed_origin) {
            return Err(ConfigError::InvalidOrigin(self.allowed_origin.clone()));
        }
        if !self.report_path.starts_with('/') {
            return Err(ConfigError::InvalidPath(self.report_path.clone()));
        }
        if self.metrics.enabled {
            if !self.metrics.path.starts_with('/') {
                return Err(ConfigError::InvalidPath(self.metrics.path.clone()));
            }
            if HEALTH_PATHS.contains(&self.metrics.path.as_str()) {
                return Err(ConfigError::ReservedPath(self.metrics.path.clone()));
            }
        }
        if self.rate_limit.max_requests == 0 {
            return Err(ConfigError::Zero("MAX_REQUESTS"));
        }
        if self.rate_limit.window_secs == 0 {
            return Err(ConfigError::Zero("TIME_WINDOW_SECS"));
        }
        if self.email.api_key.trim().is_empty() {
            return Err(ConfigError::Missing("SENDGRID_API_KEY"));
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(var: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue { var, value })
}

/// True when `origin` is exactly the serialized origin of an http(s) URL,
/// i.e. what a browser would put in the `Origin` header.
fn is_bare_origin(origin: &str) -> bool {
    match Url::parse(origin) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.host_str().is_some() => {
            url.origin().ascii_serialization() == origin
        }
        _ => false,
    }
}
