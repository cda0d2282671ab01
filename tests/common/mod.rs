//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    http::{HeaderMap, HeaderName, Method, Uri},
    response::IntoResponse,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::handshake::server::{
    ErrorResponse, Request as HsRequest, Response as HsResponse,
};

use proxy_middleware::HttpServer;

async fn bind_local() -> TcpListener {
    TcpListener::bind("127.0.0.1:0").await.unwrap()
}

/// Backend answering `"{method} {uri}"`.
///
/// Request headers `host` and `x-added` come back as `x-echo-host` and
/// `x-echo-added`.
pub async fn start_echo_backend() -> SocketAddr {
    async fn echo(method: Method, uri: Uri, headers: HeaderMap) -> impl IntoResponse {
        let mut echoed = HeaderMap::new();
        for (from, to) in [("host", "x-echo-host"), ("x-added", "x-echo-added")] {
            if let Some(value) = headers.get(from) {
                echoed.insert(HeaderName::from_static(to), value.clone());
            }
        }
        (echoed, format!("{method} {uri}"))
    }

    let listener = bind_local().await;
    let addr = listener.local_addr().unwrap();
    let app = Router::new().fallback(echo);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// Backend that reads the request, then answers with `response` verbatim.
pub async fn start_raw_backend(response: &'static str) -> SocketAddr {
    let listener = bind_local().await;
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let _ = socket.write_all(response.as_bytes()).await;
                tokio::time::sleep(Duration::from_millis(50)).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    addr
}

/// What a WebSocket backend saw during the handshake.
#[derive(Debug, Clone, Default)]
pub struct Handshake {
    pub path: String,
    pub headers: Vec<(String, String)>,
}

impl Handshake {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

/// WebSocket backend echoing text and binary messages.
pub async fn start_ws_echo_backend() -> (SocketAddr, Arc<Mutex<Vec<Handshake>>>) {
    let listener = bind_local().await;
    let addr = listener.local_addr().unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let record = seen.clone();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let record = record.clone();
            tokio::spawn(async move {
                let callback = |req: &HsRequest, res: HsResponse| -> Result<HsResponse, ErrorResponse> {
                    let headers = req
                        .headers()
                        .iter()
                        .map(|(n, v)| (n.as_str().to_string(), v.to_str().unwrap_or_default().to_string()))
                        .collect();
                    record.lock().unwrap().push(Handshake {
                        path: req.uri().path().to_string(),
                        headers,
                    });
                    Ok(res)
                };
                let Ok(mut ws) = tokio_tungstenite::accept_hdr_async(stream, callback).await else {
                    return;
                };
                while let Some(Ok(msg)) = ws.next().await {
                    if msg.is_text() || msg.is_binary() {
                        if ws.send(msg).await.is_err() {
                            break;
                        }
                    } else if msg.is_close() {
                        break;
                    }
                }
            });
        }
    });
    (addr, seen)
}

/// An address nothing listens on.
pub async fn unused_addr() -> SocketAddr {
    let listener = bind_local().await;
    listener.local_addr().unwrap()
}

/// Serve the proxy on an ephemeral port.
pub async fn start_proxy(server: HttpServer) -> SocketAddr {
    let listener = bind_local().await;
    let addr = listener.local_addr().unwrap();
    let app = server.into_router();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// Poll `check` until it holds or a few seconds pass.
pub async fn eventually(check: impl Fn() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}
