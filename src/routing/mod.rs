//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (host, path, headers)
//!     → router.rs   (first route whose context matches)
//!     → context.rs  (literal prefix | glob set | predicate)
//!     → rewrite.rs  (path rewrite table or function)
//!     → target.rs   (per-request target table)
//!     → ProxyDecision (upstream URI) or no match
//!
//! Route Compilation (at startup and on reload):
//!     RouteConfig[]
//!     → Compile contexts, regex rewrite rules, target tables
//!     → Freeze as immutable Router
//! ```
//!
//! # Design Decisions
//! - Routes compiled once per config, immutable at runtime
//! - Malformed contexts and rewrite tables are rejected at compile time
//! - Deterministic: same input always matches same route
//! - First match wins (declaration order)

pub mod context;
pub mod pattern;
pub mod rewrite;
pub mod router;
pub mod target;

pub use context::{match_context, ContextSpec, Truthy};
pub use rewrite::{create_path_rewriter, PathRewriter};
pub use router::{ProxyDecision, Route, Router};
pub use target::TargetTable;
