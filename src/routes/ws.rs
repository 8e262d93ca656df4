use axum::{
    extract::{ws::{Message, WebSocket, WebSocketUpgrade}, Extension},
    response::IntoResponse,
    routing::get,
    Router,
};
use futures_util::stream::StreamExt;
use tracing::{debug, info};

use crate::{hub::Hub, protocol::{ClientEvent, ServerEvent}, session::Session};

pub fn router() -> Router {
    Router::new().route("/ws", get(ws_handler))
}

async fn ws_handler(ws: WebSocketUpgrade, Extension(hub): Extension<Hub>) -> impl IntoResponse {
    ws.on_upgrade(move |sock| user_ws(sock, hub))
}

/* ---------------- per connection ---------------- */
async fn user_ws(mut sock: WebSocket, hub: Hub) {
    let mut session = Session::new();
    info!(session_id = %session.id(), "socket connected");

    loop {
        tokio::select! {
            incoming = sock.next() => {
                let Some(Ok(msg)) = incoming else { break };
                match msg {
                    Message::Text(raw) => {
                        let Some(event) = ClientEvent::parse(&raw) else {
                            debug!(session_id = %session.id(), "ignoring malformed frame");
                            continue;
                        };
                        debug!(session_id = %session.id(), event = event.name(), "inbound");
                        if let Some(reply) = hub.dispatch(&mut session, event).await {
                            if send(&mut sock, &reply).await.is_err() { break; }
                        }
                    }
                    Message::Close(_) => break,
                    // tungstenite answers pings itself
                    Message::Binary(_) | Message::Ping(_) | Message::Pong(_) => {}
                }
            }
            Some(event) = hub.next_event(&mut session) => {
                if send(&mut sock, &event).await.is_err() { break; }
            }
        }
    }

    hub.disconnect(session).await;
}

async fn send(sock: &mut WebSocket, event: &ServerEvent) -> Result<(), axum::Error> {
    sock.send(Message::Text(event.to_json())).await
}
