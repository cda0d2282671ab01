//! Echo backend for trying the proxy locally.
//!
//! Plain HTTP requests get back the method and path the backend saw, so a
//! path rewrite is visible end to end. `/socket` upgrades to a WebSocket
//! that echoes every text or binary message.

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    http::{Method, Uri},
    response::Response,
    routing::get,
    Router,
};
use std::net::SocketAddr;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let app = Router::new()
        .route("/socket", get(socket))
        .fallback(echo);

    let addr = SocketAddr::from(([127, 0, 0, 1], 8081));
    println!("Mock backend listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn echo(method: Method, uri: Uri) -> String {
    format!("{method} {uri}")
}

async fn socket(upgrade: WebSocketUpgrade) -> Response {
    upgrade.on_upgrade(|mut ws: WebSocket| async move {
        while let Some(Ok(msg)) = ws.recv().await {
            let reply = match msg {
                Message::Text(_) | Message::Binary(_) => msg,
                Message::Close(_) => break,
                _ => continue,
            };
            if ws.send(reply).await.is_err() {
                break;
            }
        }
    })
}
