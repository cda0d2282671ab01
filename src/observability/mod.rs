//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! routing / http components
//!     → logging.rs (leveled Logger facade → provider)
//!     → arrow.rs   (how a request was transformed: -> ~> => ≈>)
//!
//! Providers:
//!     → tracing (default; fmt subscriber with EnvFilter)
//!     → console (plain stdout/stderr)
//! ```
//!
//! # Design Decisions
//! - Level and provider can change at runtime without locks
//! - Request/response spans come from tower-http's TraceLayer

pub mod arrow;
pub mod logging;
