//! HTTP server setup and the proxy middleware.
//!
//! # Responsibilities
//! - Create the Axum app: proxy middleware in front of a 404 fallback
//! - Match each request against the live route table
//! - Forward matched requests upstream, firing `proxyReq` / `proxyRes`
//! - Turn transport failures into `error` events
//! - Swap the route table when a reloaded config arrives

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderValue, StatusCode, Version},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    Router,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::{ConfigError, ProxyConfig, TimeoutConfig};
use crate::http::error::ProxyError;
use crate::http::events::{EventBindings, ForwardConfig, ProxyHooks};
use crate::http::request::{strip_hop_headers, RequestHead, RequestView};
use crate::http::response::BufferedResponse;
use crate::http::websocket;
use crate::observability::logging::Logger;
use crate::routing::{ProxyDecision, Route, Router as ProxyRouter};

/// Application state injected into the middleware.
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<ArcSwap<ProxyRouter>>,
    pub events: Arc<EventBindings>,
    pub logger: Arc<Logger>,
    pub client: Client<HttpConnector, Body>,
}

/// HTTP server for the proxy.
pub struct HttpServer {
    app: Router,
    state: AppState,
}

impl HttpServer {
    /// Server with default hooks, logging through [`Logger::global`].
    pub fn new(config: &ProxyConfig) -> Result<Self, ConfigError> {
        Self::with_hooks(config, ProxyHooks::default(), Logger::global())
    }

    pub fn with_hooks(
        config: &ProxyConfig,
        hooks: ProxyHooks,
        logger: Arc<Logger>,
    ) -> Result<Self, ConfigError> {
        let router = ProxyRouter::from_config(&config.routes, &logger)?;
        Ok(Self::from_router(router, &config.timeouts, hooks, logger))
    }

    /// Server over an already-compiled route table.
    ///
    /// Routes built in code (function rewriters, predicate contexts) enter here.
    pub fn from_router(
        router: ProxyRouter,
        timeouts: &TimeoutConfig,
        hooks: ProxyHooks,
        logger: Arc<Logger>,
    ) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(timeouts.connect_secs)));
        let client = Client::builder(TokioExecutor::new()).build(connector);

        let state = AppState {
            router: Arc::new(ArcSwap::from_pointee(router)),
            events: Arc::new(EventBindings::build(&hooks, logger.clone())),
            logger,
            client,
        };

        let app = Self::build_router(timeouts, state.clone());
        Self { app, state }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(timeouts: &TimeoutConfig, state: AppState) -> Router {
        Router::new()
            .fallback(no_route)
            .layer(middleware::from_fn_with_state(state, proxy_middleware))
            .layer(TimeoutLayer::new(Duration::from_secs(timeouts.request_secs)))
            .layer(TraceLayer::new_for_http())
    }

    /// Handle to the live route table.
    pub fn routes(&self) -> Arc<ArcSwap<ProxyRouter>> {
        self.state.router.clone()
    }

    /// Apply each config received on `updates` until the channel closes.
    ///
    /// A config that fails to compile is logged and the current routes stay.
    pub fn watch_updates(&self, mut updates: mpsc::UnboundedReceiver<ProxyConfig>) -> JoinHandle<()> {
        let routes = self.state.router.clone();
        let logger = self.state.logger.clone();

        tokio::spawn(async move {
            while let Some(config) = updates.recv().await {
                if let Err(e) = logger.configure(
                    &config.observability.log_level,
                    &config.observability.log_provider,
                ) {
                    tracing::warn!(error = %e, "Ignoring invalid logging settings");
                }
                match ProxyRouter::from_config(&config.routes, &logger) {
                    Ok(router) => {
                        routes.store(Arc::new(router));
                        tracing::info!(routes = config.routes.len(), "Route table reloaded");
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to apply reloaded config. Keeping current routes.");
                    }
                }
            }
        })
    }

    /// The Axum app, for embedding or for tests.
    pub fn into_router(self) -> Router {
        self.app
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.app.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Proxy requests that match a route; pass everything else on.
async fn proxy_middleware(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let router = state.router.load_full();
    let view = RequestView::from_request(&request);

    let Some(route) = router.match_request(&view) else {
        return next.run(request).await;
    };
    let decision = route.decide(&view);

    if view.is_websocket_upgrade() {
        if !route.ws() {
            return next.run(request).await;
        }
        return websocket::proxy_upgrade(&state, route, decision, request).await;
    }

    forward_http(&state, route, decision, request).await
}

async fn forward_http(
    state: &AppState,
    route: &Route,
    decision: ProxyDecision,
    request: Request,
) -> Response {
    let (mut parts, body) = request.into_parts();
    let head = RequestHead::from_parts(&parts);
    let view = head.view();
    let forward = ForwardConfig::new(decision.target.clone());

    let uri = match decision.forward_uri() {
        Ok(uri) => uri,
        Err(e) => return report_error(state, &e, &view, &forward),
    };

    state.logger.debug(format_args!(
        "[HPM] {} {} {} {}",
        parts.method,
        decision.original_url,
        decision.arrow(),
        uri
    ));

    parts.uri = uri;
    parts.version = Version::HTTP_11;
    strip_hop_headers(&mut parts.headers);
    if route.change_origin() {
        match HeaderValue::from_str(&decision.authority()) {
            Ok(host) => {
                parts.headers.insert(header::HOST, host);
            }
            Err(e) => {
                return report_error(state, &ProxyError::invalid_url(e.to_string()), &view, &forward)
            }
        }
    }
    state.events.emit_proxy_req(&mut parts, &view);

    match state.client.request(Request::from_parts(parts, body)).await {
        Ok(response) => {
            let (mut parts, body) = response.into_parts();
            strip_hop_headers(&mut parts.headers);
            state.events.emit_proxy_res(&mut parts, &view);
            Response::from_parts(parts, Body::new(body))
        }
        Err(e) => report_error(state, &ProxyError::from_client_error(&e), &view, &forward),
    }
}

/// Run the `error` hook against a fresh response and return what it wrote.
pub(crate) fn report_error(
    state: &AppState,
    err: &ProxyError,
    view: &RequestView<'_>,
    forward: &ForwardConfig,
) -> Response {
    let mut res = BufferedResponse::new();
    state.events.emit_error(err, view, &mut res, forward);
    res.into_response()
}

async fn no_route() -> Response {
    (StatusCode::NOT_FOUND, "No matching route found").into_response()
}

/// Wait for shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
