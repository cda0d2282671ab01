//! Route lookup and forwarding decisions.
//!
//! # Responsibilities
//! - Compile each `RouteConfig` into a [`Route`] (context, target, rewriter)
//! - Find the first route whose context matches a request
//! - Produce a [`ProxyDecision`]: rewritten path, chosen target, upstream URI
//!
//! # Design Decisions
//! - Immutable after construction; hot reload swaps a whole new `Router`
//! - First match wins, in declaration order
//! - Explicit `None` for no match rather than a silent default route

use std::fmt;

use axum::http::Uri;
use url::Url;

use crate::config::{ConfigError, RouteConfig};
use crate::http::error::ProxyError;
use crate::http::RequestView;
use crate::observability::arrow::format_arrow;
use crate::observability::logging::Logger;
use crate::routing::context::ContextSpec;
use crate::routing::rewrite::{create_path_rewriter, PathRewriter};
use crate::routing::target::{parse_target, TargetTable};

/// A compiled proxying rule.
#[derive(Clone)]
pub struct Route {
    name: String,
    context: ContextSpec,
    target: Url,
    router: Option<TargetTable>,
    rewriter: Option<PathRewriter>,
    ws: bool,
    change_origin: bool,
}

impl Route {
    /// Route forwarding everything under `context` to `target` unchanged.
    pub fn new(name: impl Into<String>, context: ContextSpec, target: Url) -> Self {
        Self {
            name: name.into(),
            context,
            target,
            router: None,
            rewriter: None,
            ws: false,
            change_origin: false,
        }
    }

    /// Compile a configured route.
    ///
    /// Without a `context` the target is read as shorthand: its path becomes
    /// the context and is dropped from the target, and a `ws`/`wss` scheme
    /// turns on WebSocket proxying.
    pub fn from_config(config: &RouteConfig) -> Result<Self, ConfigError> {
        let mut target = parse_target(&config.target)?;
        let (context, ws) = match &config.context {
            Some(value) => (ContextSpec::from_value(value)?, config.ws),
            None => {
                let context = target.path().parse::<ContextSpec>()?;
                target.set_path("");
                target.set_query(None);
                let ws = config.ws || matches!(target.scheme(), "ws" | "wss");
                (context, ws)
            }
        };

        Ok(Self {
            name: config.name.clone(),
            context,
            target,
            router: TargetTable::from_value(config.router.as_ref())?,
            rewriter: create_path_rewriter(config.path_rewrite.as_ref())?,
            ws,
            change_origin: config.change_origin,
        })
    }

    pub fn with_rewriter(mut self, rewriter: PathRewriter) -> Self {
        self.rewriter = Some(rewriter);
        self
    }

    pub fn with_router(mut self, router: TargetTable) -> Self {
        self.router = Some(router);
        self
    }

    pub fn with_ws(mut self, ws: bool) -> Self {
        self.ws = ws;
        self
    }

    pub fn with_change_origin(mut self, change_origin: bool) -> Self {
        self.change_origin = change_origin;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn context(&self) -> &ContextSpec {
        &self.context
    }

    pub fn target(&self) -> &Url {
        &self.target
    }

    pub fn ws(&self) -> bool {
        self.ws
    }

    pub fn change_origin(&self) -> bool {
        self.change_origin
    }

    pub fn matches(&self, req: &RequestView<'_>) -> bool {
        self.context.matches(req.original_url(), req)
    }

    /// Rewrite the path and pick the target for a matched request.
    pub fn decide(&self, req: &RequestView<'_>) -> ProxyDecision {
        let original_url = req.original_url().to_string();
        let path = match &self.rewriter {
            Some(rewriter) => rewriter.rewrite(&original_url, req),
            None => original_url.clone(),
        };
        let target = self
            .router
            .as_ref()
            .and_then(|table| table.resolve(req))
            .unwrap_or_else(|| self.target.clone());

        ProxyDecision {
            original_url,
            path,
            original_target: self.target.clone(),
            target,
        }
    }

    /// Log the creation lines for this route.
    pub fn announce(&self, logger: &Logger) {
        logger.info(format_args!(
            "[HPM] Proxy created: {} -> {}",
            self.context, self.target
        ));
        if let Some(rewriter) = &self.rewriter {
            for rule in rewriter.rules() {
                logger.info(format_args!(
                    "[HPM] Proxy rewrite rule created: \"{}\" ~> \"{}\"",
                    rule.pattern(),
                    rule.replacement()
                ));
            }
        }
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("name", &self.name)
            .field("context", &self.context)
            .field("target", &self.target.as_str())
            .field("router", &self.router)
            .field("rewriter", &self.rewriter)
            .field("ws", &self.ws)
            .field("change_origin", &self.change_origin)
            .finish()
    }
}

/// Where and how a single request is forwarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyDecision {
    /// Path and query as received.
    pub original_url: String,
    /// Path and query after rewriting.
    pub path: String,
    /// The route's configured target.
    pub original_target: Url,
    /// The target actually used (may come from a target table).
    pub target: Url,
}

impl ProxyDecision {
    pub fn arrow(&self) -> &'static str {
        format_arrow(
            &self.original_url,
            &self.path,
            self.original_target.as_str(),
            self.target.as_str(),
        )
    }

    /// `host[:port]` of the chosen target.
    pub fn authority(&self) -> String {
        let host = self.target.host_str().unwrap_or_default();
        match self.target.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        }
    }

    /// Target path joined with the rewritten path; never empty.
    pub fn joined_path(&self) -> String {
        let base = self.target.path().trim_end_matches('/');
        let mut joined = String::from(base);
        if !self.path.is_empty() && !self.path.starts_with('/') && !self.path.starts_with('?') {
            joined.push('/');
        }
        joined.push_str(&self.path);
        if !joined.starts_with('/') {
            joined.insert(0, '/');
        }
        joined
    }

    /// Absolute upstream URI for the HTTP client.
    pub fn forward_uri(&self) -> Result<Uri, ProxyError> {
        let scheme = match self.target.scheme() {
            "ws" => "http",
            "wss" => "https",
            other => other,
        };
        self.build_uri(scheme)
    }

    /// Absolute upstream URI for the WebSocket handshake.
    pub fn ws_uri(&self) -> Result<Uri, ProxyError> {
        let scheme = match self.target.scheme() {
            "http" => "ws",
            "https" => "wss",
            other => other,
        };
        self.build_uri(scheme)
    }

    fn build_uri(&self, scheme: &str) -> Result<Uri, ProxyError> {
        format!("{scheme}://{}{}", self.authority(), self.joined_path())
            .parse::<Uri>()
            .map_err(|e| ProxyError::invalid_url(e.to_string()))
    }
}

/// Ordered set of routes.
#[derive(Debug, Clone, Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    pub fn new(routes: Vec<Route>) -> Self {
        Self { routes }
    }

    /// Compile every route, then log their creation.
    pub fn from_config(routes: &[RouteConfig], logger: &Logger) -> Result<Self, ConfigError> {
        let routes = routes
            .iter()
            .map(Route::from_config)
            .collect::<Result<Vec<_>, _>>()?;
        let router = Self::new(routes);
        router.announce(logger);
        Ok(router)
    }

    pub fn announce(&self, logger: &Logger) {
        for route in &self.routes {
            route.announce(logger);
        }
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// First route whose context matches.
    pub fn match_request(&self, req: &RequestView<'_>) -> Option<&Route> {
        self.routes.iter().find(|route| route.matches(req))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::logging::tests::Capture;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::json;

    fn route_config(name: &str, context: serde_json::Value, target: &str) -> RouteConfig {
        RouteConfig {
            name: name.to_string(),
            context: Some(context),
            target: target.to_string(),
            path_rewrite: None,
            router: None,
            ws: false,
            change_origin: false,
        }
    }

    fn request(uri: &str, host: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header("Host", host)
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn test_first_match_wins() {
        let router = Router::from_config(
            &[
                route_config("api", json!("/api"), "http://localhost:3000"),
                route_config("all", json!("/"), "http://localhost:4000"),
            ],
            &Logger::new(),
        )
        .unwrap();

        let req = request("/api/users", "example.com");
        let route = router.match_request(&RequestView::from_request(&req)).unwrap();
        assert_eq!(route.name(), "api");

        let req = request("/other", "example.com");
        let route = router.match_request(&RequestView::from_request(&req)).unwrap();
        assert_eq!(route.name(), "all");
    }

    #[test]
    fn test_no_match() {
        let router = Router::from_config(
            &[route_config("api", json!(["/api", "/ajax"]), "http://localhost:3000")],
            &Logger::new(),
        )
        .unwrap();
        let req = request("/rest/users", "example.com");
        assert!(router.match_request(&RequestView::from_request(&req)).is_none());
    }

    #[test]
    fn test_decision_with_rewrite() {
        let mut config = route_config("api", json!("/foobar/api"), "http://localhost:3000");
        config.path_rewrite = Some(json!({ "^/foobar/api/": "/api/" }));
        let route = Route::from_config(&config).unwrap();

        let req = request("/foobar/api/lorum/ipsum?x=1", "example.com");
        let decision = route.decide(&RequestView::from_request(&req));

        assert_eq!(decision.original_url, "/foobar/api/lorum/ipsum?x=1");
        assert_eq!(decision.path, "/api/lorum/ipsum?x=1");
        assert_eq!(decision.arrow(), "~>");
        assert_eq!(
            decision.forward_uri().unwrap(),
            "http://localhost:3000/api/lorum/ipsum?x=1"
        );
    }

    #[test]
    fn test_decision_with_target_table() {
        let mut config = route_config("api", json!("/"), "http://localhost:3000");
        config.router = Some(json!({
            "alpha.localhost": "http://localhost:6001",
            "beta.localhost/rest": "http://localhost:6002"
        }));
        let route = Route::from_config(&config).unwrap();

        let req = request("/x", "alpha.localhost");
        let decision = route.decide(&RequestView::from_request(&req));
        assert_eq!(decision.target.as_str(), "http://localhost:6001/");
        assert_eq!(decision.arrow(), "=>");

        let req = request("/rest/users", "beta.localhost");
        let decision = route.decide(&RequestView::from_request(&req));
        assert_eq!(decision.authority(), "localhost:6002");

        let req = request("/x", "gamma.localhost");
        let decision = route.decide(&RequestView::from_request(&req));
        assert_eq!(decision.target.as_str(), "http://localhost:3000/");
        assert_eq!(decision.arrow(), "->");
    }

    #[test]
    fn test_joined_path() {
        let route = Route::new(
            "r",
            ContextSpec::default(),
            Url::parse("http://localhost:3000/base/").unwrap(),
        )
        .with_rewriter(PathRewriter::from_fn(|_, _| String::new()));

        let req = request("/remove", "example.com");
        let decision = route.decide(&RequestView::from_request(&req));
        assert_eq!(decision.joined_path(), "/base");

        let route = Route::new(
            "r",
            ContextSpec::default(),
            Url::parse("http://localhost:3000").unwrap(),
        )
        .with_rewriter(PathRewriter::from_fn(|_, _| String::new()));
        let decision = route.decide(&RequestView::from_request(&req));
        assert_eq!(decision.joined_path(), "/");
        assert_eq!(decision.forward_uri().unwrap(), "http://localhost:3000/");
    }

    #[test]
    fn test_ws_uri() {
        let route = Route::new(
            "ws",
            "/socket".parse().unwrap(),
            Url::parse("http://localhost:3000").unwrap(),
        )
        .with_ws(true);
        let req = request("/socket", "example.com");
        let decision = route.decide(&RequestView::from_request(&req));
        assert_eq!(decision.ws_uri().unwrap(), "ws://localhost:3000/socket");
    }

    #[test]
    fn test_shorthand_target() {
        let mut config = route_config("short", json!(null), "http://localhost:3000/api");
        config.context = None;
        let route = Route::from_config(&config).unwrap();
        assert_eq!(route.target().as_str(), "http://localhost:3000/");
        assert!(!route.ws());

        let req = request("/api/users", "example.com");
        assert!(route.matches(&RequestView::from_request(&req)));
        let decision = route.decide(&RequestView::from_request(&req));
        assert_eq!(decision.forward_uri().unwrap(), "http://localhost:3000/api/users");

        let req = request("/other", "example.com");
        assert!(!route.matches(&RequestView::from_request(&req)));
    }

    #[test]
    fn test_shorthand_ws_target() {
        let mut config = route_config("short", json!(null), "ws://localhost:8000");
        config.context = None;
        let route = Route::from_config(&config).unwrap();
        assert!(route.ws());
        assert_eq!(route.target().as_str(), "ws://localhost:8000/");

        let req = request("/anything", "example.com");
        assert!(route.matches(&RequestView::from_request(&req)));
    }

    #[test]
    fn test_explicit_context_keeps_target_path() {
        let config = route_config("full", json!("/api"), "ws://localhost:8000/base");
        let route = Route::from_config(&config).unwrap();
        assert!(!route.ws());
        assert_eq!(route.target().as_str(), "ws://localhost:8000/base");
    }

    #[test]
    fn test_invalid_route_config() {
        let config = route_config("bad", json!(["/api", "**/*.js"]), "http://localhost:3000");
        assert!(matches!(
            Route::from_config(&config),
            Err(ConfigError::InvalidContext(_))
        ));

        let config = route_config("bad", json!("/api"), "not a url");
        assert!(matches!(
            Route::from_config(&config),
            Err(ConfigError::InvalidTarget { .. })
        ));
    }

    #[test]
    fn test_creation_logs() {
        let capture = Capture::default();
        let logger = Logger::new();
        logger.set_provider(capture.clone());

        let mut config = route_config("api", json!("/api"), "http://localhost:3000");
        config.path_rewrite = Some(json!({ "^/api/old": "/api/new" }));
        Router::from_config(&[config], &logger).unwrap();

        assert_eq!(
            capture.messages("info"),
            [
                "[HPM] Proxy created: \"/api\" -> http://localhost:3000/",
                "[HPM] Proxy rewrite rule created: \"^/api/old\" ~> \"/api/new\"",
            ]
        );
    }
}
