//! Per-connection request dispatch into the arena

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::game::{Arena, Connection, PlayerId};
use crate::ws::protocol::{ClientMsg, DirectionRequest, JoinRequest};

/// State of one viewer's session: its connection and, once joined, its player
pub struct Session {
    arena: Arc<Arena>,
    conn: Connection,
    player_id: Option<PlayerId>,
}

impl Session {
    pub fn new(arena: Arc<Arena>, conn: Connection) -> Self {
        Self {
            arena,
            conn,
            player_id: None,
        }
    }

    pub fn player_id(&self) -> Option<PlayerId> {
        self.player_id
    }

    /// Decode and dispatch one text frame. Malformed frames are ignored.
    pub async fn handle_text(&mut self, text: &str) {
        match serde_json::from_str::<ClientMsg>(text) {
            Ok(msg) => self.dispatch(msg).await,
            Err(e) => {
                warn!(conn_id = %self.conn.id(), error = %e, "Failed to parse client message");
            }
        }
    }

    pub async fn dispatch(&mut self, msg: ClientMsg) {
        match msg {
            ClientMsg::Join(req) => self.handle_join(req).await,
            ClientMsg::Move(DirectionRequest { direction }) => {
                if let Some(id) = self.player_id {
                    self.arena.move_player(id, direction).await;
                }
            }
            ClientMsg::Shoot(DirectionRequest { direction }) => {
                if let Some(id) = self.player_id {
                    self.arena.shoot(id, direction);
                }
            }
        }
    }

    async fn handle_join(&mut self, req: JoinRequest) {
        match self
            .arena
            .join(&self.conn, &req.name, &req.character, req.spectator)
            .await
        {
            // The greeting can fail and drop the player before we get here
            Ok(player) if self.arena.contains(player.id) => self.player_id = Some(player.id),
            Ok(player) => debug!(player_id = %player.id, "Player dropped during join"),
            Err(e) => debug!(conn_id = %self.conn.id(), error = %e, "Join rejected"),
        }
    }

    /// Tear the session down; removes the bound player if there is one
    pub async fn close(self) {
        if self.arena.leave(self.conn.id()).await {
            info!(conn_id = %self.conn.id(), "Session closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::broadcast::{drain, test_connection};
    use crate::ws::protocol::ServerMsg;
    use std::time::Duration;

    const JOIN: &str = r#"{"type":"join","data":{"name":"neo","character":"N","spectator":false}}"#;

    #[tokio::test(start_paused = true)]
    async fn join_binds_player_and_dispatches_moves() {
        let arena = Arena::new();
        let (conn, mut rx) = test_connection();
        let mut session = Session::new(arena.clone(), conn);

        session.handle_text(JOIN).await;
        let id = session.player_id().expect("joined");
        assert!(matches!(drain(&mut rx).first(), Some(ServerMsg::Welcome(w)) if w.player_id == id));

        session
            .handle_text(r#"{"type":"move","data":{"direction":"down"}}"#)
            .await;
        assert_eq!(arena.player_list()[0].position, "(75,21)");
        assert_eq!(drain(&mut rx).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn requests_before_join_are_ignored() {
        let arena = Arena::new();
        let (conn, mut rx) = test_connection();
        let mut session = Session::new(arena.clone(), conn);

        session
            .handle_text(r#"{"type":"move","data":{"direction":"up"}}"#)
            .await;
        session
            .handle_text(r#"{"type":"shoot","data":{"direction":"up"}}"#)
            .await;
        assert!(session.player_id().is_none());
        assert!(drain(&mut rx).is_empty());
        assert_eq!(arena.stats().bullets, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn bad_join_keeps_connection_usable() {
        let arena = Arena::new();
        let (conn, mut rx) = test_connection();
        let mut session = Session::new(arena.clone(), conn);

        session
            .handle_text(r#"{"type":"join","data":{"name":"x","character":"too long"}}"#)
            .await;
        session.handle_text("not json at all").await;
        assert!(session.player_id().is_none());
        assert!(drain(&mut rx).is_empty());

        session.handle_text(JOIN).await;
        assert!(session.player_id().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn join_on_dead_transport_leaves_session_unbound() {
        let arena = Arena::new();
        let (conn, rx) = test_connection();
        drop(rx);
        let mut session = Session::new(arena.clone(), conn);

        session.handle_text(JOIN).await;
        assert!(session.player_id().is_none());
        assert_eq!(arena.stats().players, 0);
        assert_eq!(arena.stats().connections, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_direction_is_ignored() {
        let arena = Arena::new();
        let (conn, mut rx) = test_connection();
        let mut session = Session::new(arena.clone(), conn);
        session.handle_text(JOIN).await;
        drain(&mut rx);

        session
            .handle_text(r#"{"type":"move","data":{"direction":"diagonal"}}"#)
            .await;
        assert!(drain(&mut rx).is_empty());
        assert_eq!(arena.player_list()[0].position, "(75,20)");
    }

    #[tokio::test(start_paused = true)]
    async fn shoot_spawns_bullet_and_close_removes_player() {
        let arena = Arena::new();
        let (conn, mut rx) = test_connection();
        let mut session = Session::new(arena.clone(), conn);
        session.handle_text(JOIN).await;
        drain(&mut rx);

        session
            .handle_text(r#"{"type":"shoot","data":{"direction":"left"}}"#)
            .await;
        assert_eq!(arena.stats().bullets, 1);
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(matches!(drain(&mut rx).as_slice(), [ServerMsg::WorldUpdate(_)]));

        session.close().await;
        assert_eq!(arena.stats().players, 0);
        assert_eq!(arena.stats().connections, 0);
    }
}
