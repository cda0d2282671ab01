//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (compile contexts, rewrites, targets; check ranges)
//!     → ProxyConfig (validated, immutable)
//!
//! On reload:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → server swaps in a freshly compiled route table
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use error::ConfigError;
pub use loader::{load_config, load_config_from_str};
pub use schema::{ListenerConfig, ObservabilityConfig, ProxyConfig, RouteConfig, TimeoutConfig};
pub use watcher::ConfigWatcher;
