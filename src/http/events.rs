//! Proxy lifecycle hooks.
//!
//! # Responsibilities
//! - Name the six lifecycle events the transport emits
//! - Bind user callbacks (`on_error`, `on_proxy_req`, ...) to them
//! - Fill `error` and `close` with safe defaults when unset
//!
//! # Event Flow
//! ```text
//! HTTP:      proxyReq (outgoing head) → proxyRes (upstream head) | error
//! WebSocket: proxyReqWs (handshake) → open → ... → close       | error
//! ```
//!
//! # Design Decisions
//! - A static table pairs each event with its option field, so there is no
//!   lookup by name at runtime; unknown fields cannot be bound at all
//! - The default error handler is the terminal sink for transport failures
//!   and never panics

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use axum::http::{request, response};
use url::Url;

use crate::http::error::ProxyError;
use crate::http::request::RequestView;
use crate::http::response::{error_status, ProxyResponse};
use crate::observability::logging::Logger;

/// The canonical proxy events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProxyEvent {
    Error,
    ProxyReq,
    ProxyReqWs,
    ProxyRes,
    Open,
    Close,
}

/// Event name and the option field that overrides it.
const EVENT_TABLE: [(ProxyEvent, &str, &str); 6] = [
    (ProxyEvent::Error, "error", "onError"),
    (ProxyEvent::ProxyReq, "proxyReq", "onProxyReq"),
    (ProxyEvent::ProxyReqWs, "proxyReqWs", "onProxyReqWs"),
    (ProxyEvent::ProxyRes, "proxyRes", "onProxyRes"),
    (ProxyEvent::Open, "open", "onOpen"),
    (ProxyEvent::Close, "close", "onClose"),
];

impl ProxyEvent {
    pub const ALL: [ProxyEvent; 6] = [
        ProxyEvent::Error,
        ProxyEvent::ProxyReq,
        ProxyEvent::ProxyReqWs,
        ProxyEvent::ProxyRes,
        ProxyEvent::Open,
        ProxyEvent::Close,
    ];

    fn entry(self) -> (ProxyEvent, &'static str, &'static str) {
        EVENT_TABLE[self as usize]
    }

    pub fn name(self) -> &'static str {
        self.entry().1
    }

    /// The `on<Event>` option field bound to this event.
    pub fn option_field(self) -> &'static str {
        self.entry().2
    }

    pub fn from_option_field(field: &str) -> Option<Self> {
        EVENT_TABLE
            .iter()
            .find(|(_, _, f)| *f == field)
            .map(|(event, _, _)| *event)
    }
}

impl FromStr for ProxyEvent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EVENT_TABLE
            .iter()
            .find(|(_, name, _)| *name == s)
            .map(|(event, _, _)| *event)
            .ok_or_else(|| format!("unknown proxy event: {s}"))
    }
}

impl fmt::Display for ProxyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where the failed request was being sent.
#[derive(Debug, Clone, Default)]
pub struct ForwardConfig {
    pub target: Option<Url>,
}

impl ForwardConfig {
    pub fn new(target: Url) -> Self {
        Self {
            target: Some(target),
        }
    }

    /// `host[:port]` of the target, if one is set.
    pub fn target_host(&self) -> Option<String> {
        let target = self.target.as_ref()?;
        let host = target.host_str()?;
        Some(match target.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        })
    }
}

pub type ErrorHook =
    Arc<dyn Fn(&ProxyError, &RequestView<'_>, &mut dyn ProxyResponse, &ForwardConfig) + Send + Sync>;
pub type ProxyReqHook = Arc<dyn Fn(&mut request::Parts, &RequestView<'_>) + Send + Sync>;
pub type ProxyResHook = Arc<dyn Fn(&mut response::Parts, &RequestView<'_>) + Send + Sync>;
pub type ConnectionHook = Arc<dyn Fn(&RequestView<'_>) + Send + Sync>;

/// User-supplied callbacks, one optional field per event.
#[derive(Clone, Default)]
pub struct ProxyHooks {
    pub on_error: Option<ErrorHook>,
    pub on_proxy_req: Option<ProxyReqHook>,
    pub on_proxy_req_ws: Option<ProxyReqHook>,
    pub on_proxy_res: Option<ProxyResHook>,
    pub on_open: Option<ConnectionHook>,
    pub on_close: Option<ConnectionHook>,
}

impl ProxyHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: Fn(&ProxyError, &RequestView<'_>, &mut dyn ProxyResponse, &ForwardConfig) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(f));
        self
    }

    pub fn on_proxy_req<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut request::Parts, &RequestView<'_>) + Send + Sync + 'static,
    {
        self.on_proxy_req = Some(Arc::new(f));
        self
    }

    pub fn on_proxy_req_ws<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut request::Parts, &RequestView<'_>) + Send + Sync + 'static,
    {
        self.on_proxy_req_ws = Some(Arc::new(f));
        self
    }

    pub fn on_proxy_res<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut response::Parts, &RequestView<'_>) + Send + Sync + 'static,
    {
        self.on_proxy_res = Some(Arc::new(f));
        self
    }

    pub fn on_open<F>(mut self, f: F) -> Self
    where
        F: Fn(&RequestView<'_>) + Send + Sync + 'static,
    {
        self.on_open = Some(Arc::new(f));
        self
    }

    pub fn on_close<F>(mut self, f: F) -> Self
    where
        F: Fn(&RequestView<'_>) + Send + Sync + 'static,
    {
        self.on_close = Some(Arc::new(f));
        self
    }

    /// Whether the field for `event` carries a callback.
    pub fn has(&self, event: ProxyEvent) -> bool {
        match event {
            ProxyEvent::Error => self.on_error.is_some(),
            ProxyEvent::ProxyReq => self.on_proxy_req.is_some(),
            ProxyEvent::ProxyReqWs => self.on_proxy_req_ws.is_some(),
            ProxyEvent::ProxyRes => self.on_proxy_res.is_some(),
            ProxyEvent::Open => self.on_open.is_some(),
            ProxyEvent::Close => self.on_close.is_some(),
        }
    }
}

impl fmt::Debug for ProxyHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let set: Vec<_> = ProxyEvent::ALL
            .into_iter()
            .filter(|e| self.has(*e))
            .map(ProxyEvent::option_field)
            .collect();
        f.debug_struct("ProxyHooks").field("set", &set).finish()
    }
}

/// Callbacks bound to every event the transport emits.
///
/// `error` and `close` are always bound (user callback or default); the
/// other four are bound only when the user supplied them.
#[derive(Clone)]
pub struct EventBindings {
    error: ErrorHook,
    proxy_req: Option<ProxyReqHook>,
    proxy_req_ws: Option<ProxyReqHook>,
    proxy_res: Option<ProxyResHook>,
    open: Option<ConnectionHook>,
    close: ConnectionHook,
}

impl EventBindings {
    pub fn build(hooks: &ProxyHooks, logger: Arc<Logger>) -> Self {
        let error = hooks.on_error.clone().unwrap_or_else(|| {
            let logger = logger.clone();
            let hook: ErrorHook = Arc::new(
                move |err: &ProxyError, req: &RequestView<'_>, res: &mut dyn ProxyResponse, fwd: &ForwardConfig| {
                    default_error_handler(&logger, err, req, res, fwd)
                },
            );
            hook
        });

        let close = hooks.on_close.clone().unwrap_or_else(|| {
            let logger = logger.clone();
            let hook: ConnectionHook =
                Arc::new(move |_req: &RequestView<'_>| logger.info("[HPM] Client disconnected"));
            hook
        });

        let bindings = Self {
            error,
            proxy_req: hooks.on_proxy_req.clone(),
            proxy_req_ws: hooks.on_proxy_req_ws.clone(),
            proxy_res: hooks.on_proxy_res.clone(),
            open: hooks.on_open.clone(),
            close,
        };

        logger.debug(format_args!(
            "[HPM] Subscribed to http-proxy events: {:?}",
            bindings.bound_events().iter().map(|e| e.name()).collect::<Vec<_>>()
        ));
        bindings
    }

    pub fn is_bound(&self, event: ProxyEvent) -> bool {
        match event {
            ProxyEvent::Error | ProxyEvent::Close => true,
            ProxyEvent::ProxyReq => self.proxy_req.is_some(),
            ProxyEvent::ProxyReqWs => self.proxy_req_ws.is_some(),
            ProxyEvent::ProxyRes => self.proxy_res.is_some(),
            ProxyEvent::Open => self.open.is_some(),
        }
    }

    pub fn bound_events(&self) -> Vec<ProxyEvent> {
        ProxyEvent::ALL
            .into_iter()
            .filter(|e| self.is_bound(*e))
            .collect()
    }

    pub fn emit_error(
        &self,
        err: &ProxyError,
        req: &RequestView<'_>,
        res: &mut dyn ProxyResponse,
        forward: &ForwardConfig,
    ) {
        (self.error)(err, req, res, forward);
    }

    pub fn emit_proxy_req(&self, outgoing: &mut request::Parts, req: &RequestView<'_>) {
        if let Some(hook) = &self.proxy_req {
            hook(outgoing, req);
        }
    }

    pub fn emit_proxy_req_ws(&self, handshake: &mut request::Parts, req: &RequestView<'_>) {
        if let Some(hook) = &self.proxy_req_ws {
            hook(handshake, req);
        }
    }

    pub fn emit_proxy_res(&self, upstream: &mut response::Parts, req: &RequestView<'_>) {
        if let Some(hook) = &self.proxy_res {
            hook(upstream, req);
        }
    }

    pub fn emit_open(&self, req: &RequestView<'_>) {
        if let Some(hook) = &self.open {
            hook(req);
        }
    }

    pub fn emit_close(&self, req: &RequestView<'_>) {
        (self.close)(req);
    }
}

impl fmt::Debug for EventBindings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBindings")
            .field("bound", &self.bound_events())
            .finish()
    }
}

/// Shorthand for [`EventBindings::build`].
pub fn build_bindings(hooks: &ProxyHooks, logger: Arc<Logger>) -> EventBindings {
    EventBindings::build(hooks, logger)
}

/// Report a proxying failure to the client.
///
/// Sets the status from [`error_status`] unless headers are already
/// committed, then always writes the error body and ends the response.
pub fn default_error_handler(
    logger: &Logger,
    err: &ProxyError,
    req: &RequestView<'_>,
    res: &mut dyn ProxyResponse,
    forward: &ForwardConfig,
) {
    let host = req
        .host()
        .map(str::to_string)
        .or_else(|| forward.target_host())
        .unwrap_or_default();
    let url = req.original_url();

    if !res.headers_sent() {
        res.write_head(error_status(err.code()));
    }

    logger.error(format_args!(
        "[HPM] Error occurred while trying to proxy request {} from {} to {} ({})",
        url,
        host,
        forward.target.as_ref().map(Url::as_str).unwrap_or("<none>"),
        err.code()
    ));

    res.end(format!("Error occured while trying to proxy to: {host}{url}"));
}
