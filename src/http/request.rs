//! Read-only request projections.
//!
//! # Responsibilities
//! - Expose the parts of an inbound request the routing layer reads
//!   (method, URI, headers)
//! - Derive the matching path (query stripped) and the original URL
//!   (query kept) used for rewriting and error bodies
//!
//! # Design Decisions
//! - `RequestView` borrows; it never clones headers on the hot path
//! - `RequestHead` is the owned snapshot kept alive across a WebSocket
//!   upgrade, where the original request is consumed

use axum::http::{header, request, HeaderMap, Method, Request, Uri};

/// Borrowed view of an inbound request.
#[derive(Debug, Clone, Copy)]
pub struct RequestView<'a> {
    method: &'a Method,
    uri: &'a Uri,
    headers: &'a HeaderMap,
}

impl<'a> RequestView<'a> {
    pub fn new(method: &'a Method, uri: &'a Uri, headers: &'a HeaderMap) -> Self {
        Self { method, uri, headers }
    }

    pub fn from_request<B>(req: &'a Request<B>) -> Self {
        Self::new(req.method(), req.uri(), req.headers())
    }

    pub fn from_parts(parts: &'a request::Parts) -> Self {
        Self::new(&parts.method, &parts.uri, &parts.headers)
    }

    pub fn method(&self) -> &'a Method {
        self.method
    }

    pub fn uri(&self) -> &'a Uri {
        self.uri
    }

    pub fn headers(&self) -> &'a HeaderMap {
        self.headers
    }

    /// Pathname used for matching; never contains a query string.
    pub fn path(&self) -> &'a str {
        self.uri.path()
    }

    /// Path and query as received, e.g. `/api/users?page=2`.
    pub fn original_url(&self) -> &'a str {
        self.uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/")
    }

    /// Host header, falling back to the URI authority for absolute-form targets.
    pub fn host(&self) -> Option<&'a str> {
        self.headers
            .get(header::HOST)
            .and_then(|h| h.to_str().ok())
            .or_else(|| self.uri.authority().map(|a| a.as_str()))
    }

    /// True for `Connection: upgrade` + `Upgrade: websocket` requests.
    pub fn is_websocket_upgrade(&self) -> bool {
        let connection_upgrade = self
            .headers
            .get_all(header::CONNECTION)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(','))
            .any(|token| token.trim().eq_ignore_ascii_case("upgrade"));

        let upgrade_websocket = self
            .headers
            .get(header::UPGRADE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.eq_ignore_ascii_case("websocket"))
            .unwrap_or(false);

        connection_upgrade && upgrade_websocket
    }
}

/// Owned copy of a request head.
#[derive(Debug, Clone)]
pub struct RequestHead {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
}

impl RequestHead {
    pub fn from_parts(parts: &request::Parts) -> Self {
        Self {
            method: parts.method.clone(),
            uri: parts.uri.clone(),
            headers: parts.headers.clone(),
        }
    }

    pub fn view(&self) -> RequestView<'_> {
        RequestView::new(&self.method, &self.uri, &self.headers)
    }
}

/// Connection-scoped headers that must not be forwarded.
pub const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-connection",
    "proxy-authenticate",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Remove [`HOP_BY_HOP`] headers in place.
pub fn strip_hop_headers(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn test_view_paths() {
        let req = Request::builder()
            .uri("/api/users?page=2")
            .header("Host", "localhost:3000")
            .body(Body::empty())
            .unwrap();
        let view = RequestView::from_request(&req);

        assert_eq!(view.path(), "/api/users");
        assert_eq!(view.original_url(), "/api/users?page=2");
        assert_eq!(view.host(), Some("localhost:3000"));
        assert_eq!(*view.method(), Method::GET);
    }

    #[test]
    fn test_host_from_absolute_uri() {
        let req = Request::builder()
            .uri("http://example.com/api")
            .body(Body::empty())
            .unwrap();
        let view = RequestView::from_request(&req);
        assert_eq!(view.host(), Some("example.com"));
        assert_eq!(view.original_url(), "/api");
    }

    #[test]
    fn test_websocket_upgrade_detection() {
        let req = Request::builder()
            .uri("/socket")
            .header("Connection", "keep-alive, Upgrade")
            .header("Upgrade", "websocket")
            .body(Body::empty())
            .unwrap();
        assert!(RequestView::from_request(&req).is_websocket_upgrade());

        let plain = Request::builder().uri("/socket").body(Body::empty()).unwrap();
        assert!(!RequestView::from_request(&plain).is_websocket_upgrade());
    }

    #[test]
    fn test_head_snapshot() {
        let req = Request::builder()
            .method(Method::POST)
            .uri("/submit")
            .body(Body::empty())
            .unwrap();
        let (parts, _) = req.into_parts();
        let head = RequestHead::from_parts(&parts);
        assert_eq!(*head.view().method(), Method::POST);
        assert_eq!(head.view().path(), "/submit");
    }

    #[test]
    fn test_strip_hop_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, "keep-alive".parse().unwrap());
        headers.insert(header::TRANSFER_ENCODING, "chunked".parse().unwrap());
        headers.insert(header::ACCEPT, "text/html".parse().unwrap());
        strip_hop_headers(&mut headers);
        assert_eq!(headers.len(), 1);
        assert!(headers.contains_key(header::ACCEPT));
    }
}
