//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.
//!
//! Contexts, rewrite tables, and target tables stay as raw
//! [`serde_json::Value`]s here; their shape is checked when the routing
//! layer compiles them, so a malformed value surfaces as a
//! [`ConfigError`](crate::config::ConfigError) rather than a parse error.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Root configuration for the proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Route definitions, evaluated in declaration order.
    pub routes: Vec<RouteConfig>,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Logging settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// A single proxying rule.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Route identifier for logging.
    pub name: String,

    /// Path context: a path, a glob, or an array of either.
    /// Absent means the target's own path (`"/"` when it has none).
    #[serde(default)]
    pub context: Option<Value>,

    /// Default upstream, e.g. "http://localhost:8000".
    ///
    /// With no `context`, `"http://host:3000/api"` proxies `/api` to
    /// `http://host:3000`, and a `ws://` target enables `ws`.
    pub target: String,

    /// Ordered `pattern -> replacement` table.
    #[serde(default)]
    pub path_rewrite: Option<Value>,

    /// Ordered `host[/path] -> target` table.
    #[serde(default)]
    pub router: Option<Value>,

    /// Proxy WebSocket upgrades on this route.
    #[serde(default)]
    pub ws: bool,

    /// Rewrite the Host header to the target authority.
    #[serde(default)]
    pub change_origin: bool,
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upstream connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 30,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error, silent).
    pub log_level: String,

    /// Log provider (tracing, console).
    pub log_provider: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_provider: "tracing".to_string(),
        }
    }
}
