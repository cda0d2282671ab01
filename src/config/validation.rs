//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Compile every route's context, rewrite table and target table once
//! - Validate value ranges (timeouts > 0) and logging names
//! - Detect duplicate route names
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ConfigError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;

use crate::config::error::ConfigError;
use crate::config::schema::ProxyConfig;
use crate::observability::logging::{provider_from_name, LogLevel};
use crate::routing::Route;

/// Check a parsed config, collecting every problem found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let mut names = HashSet::new();
    for route in &config.routes {
        if route.name.trim().is_empty() {
            errors.push(ConfigError::InvalidRoute {
                route: route.target.clone(),
                reason: "name must not be empty".to_string(),
            });
        } else if !names.insert(route.name.as_str()) {
            errors.push(ConfigError::InvalidRoute {
                route: route.name.clone(),
                reason: "duplicate route name".to_string(),
            });
        }

        if let Err(e) = Route::from_config(route) {
            errors.push(e);
        }
    }

    if config.timeouts.connect_secs == 0 {
        errors.push(ConfigError::InvalidTimeout("connect_secs"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ConfigError::InvalidTimeout("request_secs"));
    }

    if let Err(e) = config.observability.log_level.parse::<LogLevel>() {
        errors.push(e);
    }
    if let Err(e) = provider_from_name(&config.observability.log_provider) {
        errors.push(e);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
