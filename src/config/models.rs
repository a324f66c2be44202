//! Configuration data structures for the `routekit` binary.
//!
//! These types map directly to TOML (also JSON / YAML) configuration files and carry defaults
//! so that a minimal file only needs its routes.
use std::time::Duration;

use serde::{Deserialize, Serialize};

fn default_method() -> String {
    "GET".to_string()
}

/// Top-level engine configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct EngineConfig {
    /// Socket address to listen on, e.g. "127.0.0.1:8080"
    pub listen_addr: String,
    /// Version prefix applied to every configured route pattern (may be empty)
    pub api_version: String,
    pub logging: LoggingConfig,
    pub middleware: MiddlewareConfig,
    pub proxy: ProxyConfig,
    pub routes: Vec<RouteConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
            api_version: String::new(),
            logging: LoggingConfig::default(),
            middleware: MiddlewareConfig::default(),
            proxy: ProxyConfig::default(),
            routes: Vec::new(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. "info" or "routekit=debug"
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
    /// Requests at least this slow are logged at warn level (humantime, e.g. "500ms")
    pub slow_request_threshold: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            slow_request_threshold: "1s".to_string(),
        }
    }
}

impl LoggingConfig {
    pub fn slow_request_threshold(&self) -> Result<Duration, humantime::DurationError> {
        humantime::parse_duration(&self.slow_request_threshold)
    }
}

/// Built-in middleware toggles. Recovery is always installed.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct MiddlewareConfig {
    pub request_logging: bool,
    pub request_id: bool,
}

impl Default for MiddlewareConfig {
    fn default() -> Self {
        Self {
            request_logging: true,
            request_id: false,
        }
    }
}

/// Upstream client settings shared by all proxy routes
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Upstream exchange timeout (humantime); unset means no timeout
    pub timeout: Option<String>,
}

impl ProxyConfig {
    pub fn timeout(&self) -> Result<Option<Duration>, humantime::DurationError> {
        self.timeout
            .as_deref()
            .map(humantime::parse_duration)
            .transpose()
    }
}

/// One configured route
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RouteConfig {
    /// Forward to an upstream target
    Proxy {
        pattern: String,
        #[serde(default = "default_method")]
        method: String,
        target: String,
        #[serde(default)]
        rewrite: bool,
    },
    /// Answer with 303 See Other
    Redirect {
        pattern: String,
        #[serde(default = "default_method")]
        method: String,
        location: String,
    },
}

impl RouteConfig {
    pub fn pattern(&self) -> &str {
        match self {
            Self::Proxy { pattern, .. } | Self::Redirect { pattern, .. } => pattern,
        }
    }

    pub fn method(&self) -> &str {
        match self {
            Self::Proxy { method, .. } | Self::Redirect { method, .. } => method,
        }
    }
}
