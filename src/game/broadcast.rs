//! Delivery of server messages to connected viewers
//!
//! Each connection wraps an outbound text sink behind its own async mutex, so
//! two tasks sending to the same viewer never interleave frames. A failed send
//! tears the connection down through the same path as a voluntary leave.

use futures::{Sink, SinkExt};
use std::fmt;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::ws::protocol::ServerMsg;

use super::arena::Arena;
use super::snapshot::Update;

/// Outbound half of a viewer's transport
pub type BoxSink = Pin<Box<dyn Sink<String, Error = TransportError> + Send>>;

/// Transport failures on send
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] axum::Error),

    #[error("connection closed")]
    Closed,
}

/// Process-unique connection identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Handle to one viewer's outbound channel. Cheap to clone.
#[derive(Clone)]
pub struct Connection {
    id: ConnectionId,
    sink: Arc<Mutex<BoxSink>>,
}

impl Connection {
    pub fn new<S>(sink: S) -> Self
    where
        S: Sink<String, Error = TransportError> + Send + 'static,
    {
        Self {
            id: ConnectionId(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed)),
            sink: Arc::new(Mutex::new(Box::pin(sink))),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Write one text frame, holding this connection's lock for the write
    pub async fn send(&self, text: String) -> Result<(), TransportError> {
        let mut sink = self.sink.lock().await;
        sink.send(text).await
    }

    /// Best-effort close of the outbound half
    pub async fn close(&self) {
        let mut sink = self.sink.lock().await;
        let _ = sink.close().await;
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection").field("id", &self.id).finish()
    }
}

fn encode(msg: &ServerMsg) -> Option<String> {
    serde_json::to_string(msg)
        .map_err(|e| error!(error = %e, "Failed to encode server message"))
        .ok()
}

impl Arena {
    /// Send to a single viewer; a failure drops that viewer
    pub async fn send_to(&self, conn: &Connection, msg: &ServerMsg) {
        let Some(text) = encode(msg) else {
            return;
        };
        if let Err(e) = conn.send(text).await {
            warn!(conn_id = %conn.id(), error = %e, "Send failed, dropping connection");
            conn.close().await;
            if self.drop_connections(&[conn.id()]) {
                self.publish(Update::Full).await;
            }
        }
    }

    /// Snapshot the state for `update` under the shared lock, then broadcast it
    pub(super) async fn publish(&self, update: Update) {
        let messages = self.state.read().build(update, Instant::now());
        self.broadcast(messages).await;
    }

    /// Deliver `messages` in order to every registered viewer. Viewers whose
    /// send fails are dropped, and the survivors get a fresh full update; this
    /// repeats until a round goes through without new failures.
    pub async fn broadcast(&self, mut messages: Vec<ServerMsg>) {
        loop {
            let payloads: Vec<String> = messages.iter().filter_map(encode).collect();
            let targets = self.state.read().connections();

            let mut failed = Vec::new();
            for conn in &targets {
                for text in &payloads {
                    if let Err(e) = conn.send(text.clone()).await {
                        warn!(conn_id = %conn.id(), error = %e, "Broadcast failed, dropping connection");
                        conn.close().await;
                        failed.push(conn.id());
                        break;
                    }
                }
            }

            if failed.is_empty() || !self.drop_connections(&failed) {
                return;
            }
            messages = self.state.read().build(Update::Full, Instant::now());
        }
    }

    /// Deregister connections; true if any was still registered
    fn drop_connections(&self, ids: &[ConnectionId]) -> bool {
        let mut state = self.state.write();
        let mut removed = false;
        for &id in ids {
            if let Some(player) = state.remove_connection(id) {
                info!(player_id = %player.id, conn_id = %id, name = %player.name, "Dropped unreachable player");
                removed = true;
            }
        }
        removed
    }
}

#[cfg(test)]
pub(crate) fn test_connection() -> (Connection, futures::channel::mpsc::UnboundedReceiver<String>) {
    let (tx, rx) = futures::channel::mpsc::unbounded();
    (Connection::new(tx.sink_map_err(|_| TransportError::Closed)), rx)
}

/// Decode everything queued on a test receiver
#[cfg(test)]
pub(crate) fn drain(rx: &mut futures::channel::mpsc::UnboundedReceiver<String>) -> Vec<ServerMsg> {
    let mut out = Vec::new();
    while let Ok(text) = rx.try_recv() {
        out.push(serde_json::from_str(&text).expect("valid server message"));
    }
    out
}
