//! WebSocket proxy handling.
//!
//! # Responsibilities
//! - Complete the upgrade handshake with the client
//! - Open the upstream WebSocket, firing `proxyReqWs` on its handshake
//! - Relay frames in both directions, firing `open` and `close`
//!
//! # Data Flow
//! ```text
//! Client ←──── WebSocket frames ────→ Proxy ←──── WebSocket frames ────→ Backend
//! ```
//!
//! # Design Decisions
//! - The upstream connection is made before the client upgrade is accepted,
//!   so a dead backend still gets a plain HTTP error response
//! - Frame-level forwarding (no message buffering)
//! - Close frames propagated in both directions

use axum::{
    extract::ws::{self, WebSocket, WebSocketUpgrade},
    extract::{FromRequestParts, Request},
    http::{header, request},
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    tungstenite::{self, client::IntoClientRequest, protocol::CloseFrame},
    MaybeTlsStream, WebSocketStream,
};

use crate::http::error::ProxyError;
use crate::http::events::ForwardConfig;
use crate::http::request::{RequestHead, HOP_BY_HOP};
use crate::http::server::{report_error, AppState};
use crate::routing::{ProxyDecision, Route};

type Upstream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Proxy an upgrade request for a `ws`-enabled route.
pub async fn proxy_upgrade(
    state: &AppState,
    route: &Route,
    decision: ProxyDecision,
    request: Request,
) -> Response {
    let (mut parts, _body) = request.into_parts();
    let head = RequestHead::from_parts(&parts);
    let forward = ForwardConfig::new(decision.target.clone());

    let upgrade = match WebSocketUpgrade::from_request_parts(&mut parts, &()).await {
        Ok(upgrade) => upgrade,
        Err(rejection) => return rejection.into_response(),
    };

    let mut handshake = match upstream_handshake(&head, route, &decision) {
        Ok(parts) => parts,
        Err(e) => return report_error(state, &e, &head.view(), &forward),
    };
    state.events.emit_proxy_req_ws(&mut handshake, &head.view());

    state.logger.debug(format_args!(
        "[HPM] Upgrading to WebSocket: {} {} {}",
        decision.original_url,
        decision.arrow(),
        handshake.uri
    ));

    let upstream = match tokio_tungstenite::connect_async(request::Request::from_parts(handshake, ())).await {
        Ok((upstream, _)) => upstream,
        Err(e) => {
            return report_error(state, &ProxyError::from_ws_error(&e), &head.view(), &forward)
        }
    };

    let events = state.events.clone();
    upgrade.on_upgrade(move |client| async move {
        let view = head.view();
        events.emit_open(&view);
        relay(client, upstream).await;
        events.emit_close(&view);
    })
}

/// Handshake head for the upstream connection.
///
/// Client headers are carried over except connection-scoped ones and the
/// client's own `Sec-WebSocket-*` negotiation.
fn upstream_handshake(
    head: &RequestHead,
    route: &Route,
    decision: &ProxyDecision,
) -> Result<request::Parts, ProxyError> {
    let handshake = decision
        .ws_uri()?
        .into_client_request()
        .map_err(|e| ProxyError::from_ws_error(&e))?;
    let (mut parts, ()) = handshake.into_parts();

    for (name, value) in &head.headers {
        let lower = name.as_str();
        if HOP_BY_HOP.contains(&lower) || lower.starts_with("sec-websocket-") {
            continue;
        }
        if *name == header::HOST {
            if !route.change_origin() {
                parts.headers.insert(header::HOST, value.clone());
            }
            continue;
        }
        parts.headers.append(name.clone(), value.clone());
    }
    Ok(parts)
}

async fn relay(client: WebSocket, upstream: Upstream) {
    let (mut client_tx, mut client_rx) = client.split();
    let (mut upstream_tx, mut upstream_rx) = upstream.split();

    let client_to_upstream = async {
        while let Some(Ok(msg)) = client_rx.next().await {
            let closing = matches!(msg, ws::Message::Close(_));
            if upstream_tx.send(to_upstream(msg)).await.is_err() || closing {
                break;
            }
        }
        let _ = upstream_tx.close().await;
    };

    let upstream_to_client = async {
        while let Some(Ok(msg)) = upstream_rx.next().await {
            let Some(msg) = to_client(msg) else {
                continue;
            };
            let closing = matches!(msg, ws::Message::Close(_));
            if client_tx.send(msg).await.is_err() || closing {
                break;
            }
        }
        let _ = client_tx.close().await;
    };

    tokio::select! {
        _ = client_to_upstream => tracing::debug!("client side of websocket closed"),
        _ = upstream_to_client => tracing::debug!("upstream side of websocket closed"),
    }
}

fn to_upstream(msg: ws::Message) -> tungstenite::Message {
    match msg {
        ws::Message::Text(text) => tungstenite::Message::Text(text.as_str().to_owned().into()),
        ws::Message::Binary(data) => tungstenite::Message::Binary(data),
        ws::Message::Ping(data) => tungstenite::Message::Ping(data),
        ws::Message::Pong(data) => tungstenite::Message::Pong(data),
        ws::Message::Close(frame) => tungstenite::Message::Close(frame.map(|f| CloseFrame {
            code: f.code.into(),
            reason: f.reason.as_str().to_owned().into(),
        })),
    }
}

fn to_client(msg: tungstenite::Message) -> Option<ws::Message> {
    Some(match msg {
        tungstenite::Message::Text(text) => ws::Message::Text(text.as_str().to_owned().into()),
        tungstenite::Message::Binary(data) => ws::Message::Binary(data),
        tungstenite::Message::Ping(data) => ws::Message::Ping(data),
        tungstenite::Message::Pong(data) => ws::Message::Pong(data),
        tungstenite::Message::Close(frame) => ws::Message::Close(frame.map(|f| ws::CloseFrame {
            code: f.code.into(),
            reason: f.reason.as_str().to_owned().into(),
        })),
        tungstenite::Message::Frame(_) => return None,
    })
}
