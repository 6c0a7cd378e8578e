//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{future, SinkExt, StreamExt};
use tracing::{debug, error, info, warn};

use crate::app::AppState;
use crate::game::{Connection, TransportError};
use crate::ws::session::Session;

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (ws_sink, ws_stream) = socket.split();

    // Outbound text frames go through the connection's own lock
    let sink = ws_sink.with(|text: String| future::ok::<_, TransportError>(Message::Text(text)));
    let conn = Connection::new(sink);
    let conn_id = conn.id();

    info!(conn_id = %conn_id, "New WebSocket connection");

    run_session(Session::new(state.arena.clone(), conn), ws_stream).await;

    info!(conn_id = %conn_id, "WebSocket connection closed");
}

/// Reader loop: one frame at a time, so a player's requests apply in arrival order
async fn run_session(
    mut session: Session,
    mut ws_stream: futures::stream::SplitStream<WebSocket>,
) {
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => session.handle_text(&text).await,
            Ok(Message::Binary(_)) => {
                warn!(player_id = ?session.player_id(), "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                debug!(player_id = ?session.player_id(), "Received ping/pong");
            }
            Ok(Message::Close(_)) => {
                info!(player_id = ?session.player_id(), "Client initiated close");
                break;
            }
            Err(e) => {
                error!(player_id = ?session.player_id(), error = %e, "WebSocket error");
                break;
            }
        }
    }

    session.close().await;
}
