//! Transport failures surfaced to the `error` hook.
//!
//! Upstream failures are classified into short, stable codes
//! (`ECONNREFUSED`, `ECONNRESET`, `ENOTFOUND`, `ETIMEDOUT`, `HPE_INVALID_*`)
//! so that hooks and the default status table do not depend on the
//! error types of the client libraries.

use std::error::Error as StdError;
use std::io;

use thiserror::Error;
use tokio_tungstenite::tungstenite;

#[derive(Debug, Clone, Error)]
#[error("{message} ({code})")]
pub struct ProxyError {
    code: String,
    message: String,
}

impl ProxyError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Classify a failure of the pooled HTTP client.
    pub fn from_client_error(err: &hyper_util::client::legacy::Error) -> Self {
        let code = classify_chain(err).unwrap_or(if err.is_connect() {
            "ECONNREFUSED"
        } else {
            "EPROXY"
        });
        Self::new(code, chain_message(err))
    }

    /// Classify a failed upstream WebSocket handshake.
    pub fn from_ws_error(err: &tungstenite::Error) -> Self {
        let code = match err {
            tungstenite::Error::Io(io_err) => io_code(io_err),
            tungstenite::Error::Url(_) => "EINVALIDURL",
            tungstenite::Error::Http(_) => "HPE_INVALID_UPGRADE",
            tungstenite::Error::HttpFormat(_) | tungstenite::Error::Protocol(_) => "HPE_INVALID_CONSTANT",
            tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => "ECONNRESET",
            _ => "EPROXY",
        };
        Self::new(code, err.to_string())
    }

    /// The error raised when the forward URI cannot be built.
    pub fn invalid_url(reason: impl Into<String>) -> Self {
        Self::new("EINVALIDURL", reason)
    }
}

fn io_code(err: &io::Error) -> &'static str {
    match err.kind() {
        io::ErrorKind::ConnectionRefused => "ECONNREFUSED",
        io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::UnexpectedEof => "ECONNRESET",
        io::ErrorKind::TimedOut => "ETIMEDOUT",
        io::ErrorKind::NotFound => "ENOTFOUND",
        _ if err.to_string().contains("failed to lookup address") => "ENOTFOUND",
        _ => "EPROXY",
    }
}

/// Walk the source chain looking for something recognizable.
fn classify_chain(err: &(dyn StdError + 'static)) -> Option<&'static str> {
    let mut current = Some(err);
    while let Some(e) = current {
        if e.to_string().contains("dns error") {
            return Some("ENOTFOUND");
        }
        if let Some(io_err) = e.downcast_ref::<io::Error>() {
            let code = io_code(io_err);
            if code != "EPROXY" {
                return Some(code);
            }
        }
        if let Some(hyper_err) = e.downcast_ref::<hyper::Error>() {
            if hyper_err.is_parse() {
                return Some("HPE_INVALID_CONSTANT");
            }
            if hyper_err.is_incomplete_message() || hyper_err.is_canceled() {
                return Some("ECONNRESET");
            }
            if hyper_err.is_timeout() {
                return Some("ETIMEDOUT");
            }
        }
        current = e.source();
    }
    None
}

fn chain_message(err: &(dyn StdError + 'static)) -> String {
    let mut parts = vec![err.to_string()];
    let mut current = err.source();
    while let Some(e) = current {
        parts.push(e.to_string());
        current = e.source();
    }
    parts.join(": ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_codes() {
        let refused = io::Error::from(io::ErrorKind::ConnectionRefused);
        assert_eq!(classify_chain(&refused), Some("ECONNREFUSED"));

        let reset = io::Error::from(io::ErrorKind::ConnectionReset);
        assert_eq!(classify_chain(&reset), Some("ECONNRESET"));

        let other = io::Error::new(io::ErrorKind::Other, "boom");
        assert_eq!(classify_chain(&other), None);
    }

    #[test]
    fn test_nested_dns_failure() {
        #[derive(Debug, Error)]
        #[error("client error (Connect)")]
        struct Outer(#[source] io::Error);

        let err = Outer(io::Error::new(io::ErrorKind::Other, "dns error: no record"));
        assert_eq!(classify_chain(&err), Some("ENOTFOUND"));
        assert_eq!(chain_message(&err), "client error (Connect): dns error: no record");
    }

    #[test]
    fn test_ws_codes() {
        let err = tungstenite::Error::Io(io::Error::from(io::ErrorKind::ConnectionRefused));
        assert_eq!(ProxyError::from_ws_error(&err).code(), "ECONNREFUSED");
        assert_eq!(ProxyError::from_ws_error(&tungstenite::Error::ConnectionClosed).code(), "ECONNRESET");
    }

    #[test]
    fn test_display() {
        let err = ProxyError::new("ECONNREFUSED", "connection refused");
        assert_eq!(err.to_string(), "connection refused (ECONNREFUSED)");
    }
}
