//! Setup-time error type.
//!
//! Every problem with a routing rule, rewrite table, or logging setting is
//! reported here before the first request is served. Per-request matching
//! and rewriting never produce a `ConfigError`.

use thiserror::Error;

/// Error raised while loading or compiling proxy configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("[HPM] Invalid context. Expecting a path string, a glob pattern, an array of either, or a function: {0}")]
    InvalidContext(String),

    #[error("[HPM] Invalid pathRewrite config. Expecting an object literal or a function: {0}")]
    InvalidPathRewrite(String),

    #[error("[HPM] Invalid router config: {0}")]
    InvalidRouter(String),

    #[error("[HPM] Invalid target '{target}': {reason}")]
    InvalidTarget { target: String, reason: String },

    #[error("[HPM] Log level error. Invalid logLevel: {0}")]
    InvalidLogLevel(String),

    #[error("[HPM] Log provider config error. Unknown provider: {0}")]
    InvalidLogProvider(String),

    #[error("Invalid route '{route}': {reason}")]
    InvalidRoute { route: String, reason: String },

    #[error("Invalid timeout '{0}': must be greater than zero")]
    InvalidTimeout(&'static str),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ConfigError>),
}

fn join_errors(errors: &[ConfigError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_lists_every_error() {
        let err = ConfigError::Validation(vec![
            ConfigError::InvalidLogLevel("verbose".into()),
            ConfigError::InvalidTimeout("request_secs"),
        ]);
        let msg = err.to_string();
        assert!(msg.starts_with("Validation failed: "));
        assert!(msg.contains("verbose"));
        assert!(msg.contains("request_secs"));
    }
}
