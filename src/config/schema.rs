//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the router.
//! All types derive Serde traits for deserialization from config files.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::routing::RouteDeclaration;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RouterConfig {
    /// Include error detail in 500 responses. Never enable in production.
    pub debug: bool,

    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Route table snapshot cache.
    pub cache: CacheConfig,

    /// Global middleware, aliases and built-in middleware settings.
    pub middleware: MiddlewareConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Route declarations, in registration order.
    pub routes: Vec<RouteDeclaration>,
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

/// Route table cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Load the table from `path` when present, write it after a build.
    pub enabled: bool,

    /// Snapshot file location.
    pub path: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: PathBuf::from("routekit-routes.json"),
        }
    }
}

impl CacheConfig {
    pub fn snapshot_path(&self) -> Option<&PathBuf> {
        self.enabled.then_some(&self.path)
    }
}

/// Middleware configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct MiddlewareConfig {
    /// References applied to every route, outermost first.
    pub global: Vec<String>,

    /// Short name -> target reference (may carry a `:param`).
    pub aliases: BTreeMap<String, String>,

    /// Bearer guard tokens: scope -> token -> user id.
    pub bearer: HashMap<String, HashMap<String, String>>,
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,

    /// Interval of the expired rate-window sweep, in seconds.
    pub rate_window_sweep_secs: u64,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
            rate_window_sweep_secs: 60,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::{Method, PartitionKey};

    #[test]
    fn test_defaults_from_empty_file() {
        let config: RouterConfig = toml::from_str("").unwrap();
        assert!(!config.debug);
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
        assert_eq!(config.timeouts.request_secs, 30);
        assert!(config.cache.snapshot_path().is_none());
        assert!(config.routes.is_empty());
    }

    #[test]
    fn test_full_config() {
        let raw = r#"
            debug = true

            [listener]
            bind_address = "127.0.0.1:3000"

            [cache]
            enabled = true
            path = "/tmp/routes.json"

            [middleware]
            global = ["logger"]

            [middleware.aliases]
            auth = "bearer"

            [middleware.bearer.api]
            tok = "user-1"

            [[routes]]
            method = "get"
            uri = "/users/{id}"
            handler = "users.show"
            name = "users.show"
            constraints = { id = '\d+' }
            middleware = ["auth:api"]
            rate_limit = { ceiling = 3, window_secs = 60, key = "user_id" }
        "#;

        let config: RouterConfig = toml::from_str(raw).unwrap();
        assert!(config.debug);
        assert_eq!(config.cache.snapshot_path().unwrap(), &PathBuf::from("/tmp/routes.json"));
        assert_eq!(config.middleware.aliases["auth"], "bearer");
        assert_eq!(config.middleware.bearer["api"]["tok"], "user-1");

        let route = &config.routes[0];
        assert_eq!(route.method, Method::Get);
        assert_eq!(route.constraints["id"], r"\d+");
        assert_eq!(route.rate_limit.as_ref().unwrap().key, PartitionKey::UserId);
    }
}
