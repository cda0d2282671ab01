//! Path-routing HTTP and WebSocket proxy middleware.
//!
//! Decides, per incoming request, whether it should be proxied, rewrites
//! its path, picks the upstream target, and relays it, firing lifecycle
//! hooks along the way.

pub mod config;
pub mod http;
pub mod observability;
pub mod routing;

pub use config::{ConfigError, ProxyConfig};
pub use http::{HttpServer, ProxyHooks};
pub use observability::logging::Logger;
pub use routing::{Route, Router};
