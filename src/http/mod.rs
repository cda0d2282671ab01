//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, proxy middleware)
//!     → request.rs (read-only view: path, original URL, host)
//!     → [routing layer decides route, path and target]
//!     → upstream client │ websocket.rs (upgrade + frame relay)
//!     → events.rs (proxyReq / proxyRes / proxyReqWs / open / close / error)
//!     → response.rs (error responses)
//!     → Send to client
//! ```

pub mod error;
pub mod events;
pub mod request;
pub mod response;
pub mod server;
pub mod websocket;

pub use error::ProxyError;
pub use events::{EventBindings, ForwardConfig, ProxyEvent, ProxyHooks};
pub use request::{RequestHead, RequestView};
pub use response::{BufferedResponse, ProxyResponse};
pub use server::HttpServer;
