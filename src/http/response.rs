//! Response handling for proxy failures.
//!
//! # Responsibilities
//! - Abstract the minimal response surface error hooks write to
//! - Buffer what a hook writes and turn it into an HTTP response
//! - Map backend errors to appropriate HTTP status codes
//!
//! # Design Decisions
//! - Hooks see a `ProxyResponse` trait object, never the transport's
//!   concrete response type
//! - Once headers are committed, status writes are ignored

use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

/// Response surface available to `error` hooks.
pub trait ProxyResponse: Send {
    /// True once the status line has been committed.
    fn headers_sent(&self) -> bool;

    /// Commit the status line.
    fn write_head(&mut self, status: StatusCode);

    /// Write the body and finish the response.
    fn end(&mut self, body: String);
}

/// In-memory [`ProxyResponse`].
#[derive(Debug, Default, Clone)]
pub struct BufferedResponse {
    status: Option<StatusCode>,
    body: Option<String>,
    headers_sent: bool,
}

impl BufferedResponse {
    pub fn new() -> Self {
        Self::default()
    }

    /// A response whose headers are already on the wire.
    pub fn committed() -> Self {
        Self {
            headers_sent: true,
            ..Self::default()
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    pub fn is_ended(&self) -> bool {
        self.body.is_some()
    }
}

impl ProxyResponse for BufferedResponse {
    fn headers_sent(&self) -> bool {
        self.headers_sent
    }

    fn write_head(&mut self, status: StatusCode) {
        if self.headers_sent {
            return;
        }
        self.status = Some(status);
        self.headers_sent = true;
    }

    fn end(&mut self, body: String) {
        self.body = Some(body);
    }
}

impl IntoResponse for BufferedResponse {
    fn into_response(self) -> Response {
        let status = self.status.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = Response::new(Body::from(self.body.unwrap_or_default()));
        *response.status_mut() = status;
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        response
    }
}

/// Status code for a transport error code.
///
/// `HPE_INVALID*` parser failures are 502, connection failures
/// (`ECONNRESET`, `ENOTFOUND`, `ECONNREFUSED`) are 504, anything else 500.
pub fn error_status(code: &str) -> StatusCode {
    if code.starts_with("HPE_INVALID") {
        return StatusCode::BAD_GATEWAY;
    }
    match code {
        "ECONNRESET" | "ENOTFOUND" | "ECONNREFUSED" => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_table() {
        let codes = [
            ("HPE_INVALID_FOO", 502),
            ("HPE_INVALID_BAR", 502),
            ("ECONNREFUSED", 504),
            ("ENOTFOUND", 504),
            ("ECONNRESET", 504),
            ("ETIMEDOUT", 500),
            ("any", 500),
        ];
        for (code, status) in codes {
            assert_eq!(error_status(code).as_u16(), status, "code {code}");
        }
    }

    #[test]
    fn test_committed_ignores_status() {
        let mut res = BufferedResponse::committed();
        res.write_head(StatusCode::BAD_GATEWAY);
        res.end("body".into());
        assert_eq!(res.status(), None);
        assert_eq!(res.body(), Some("body"));
    }

    #[test]
    fn test_into_response() {
        let mut res = BufferedResponse::new();
        res.write_head(StatusCode::GATEWAY_TIMEOUT);
        res.end("oops".into());
        let response = res.into_response();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    }
}
