//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};

use crate::game::{Direction, PlayerId};

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum ClientMsg {
    /// Bind a new player (or spectator) to this connection
    Join(JoinRequest),

    /// Step one cell
    Move(DirectionRequest),

    /// Fire a bullet
    Shoot(DirectionRequest),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JoinRequest {
    pub name: String,
    /// Requested glyph; must be exactly one character unless spectating
    pub character: String,
    pub spectator: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DirectionRequest {
    pub direction: Direction,
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum ServerMsg {
    /// Private greeting after a successful join
    Welcome(Welcome),

    /// Rendered world frame
    WorldUpdate(String),

    /// Everyone currently connected
    PlayerList(Vec<PlayerEntry>),

    /// Score table
    Leaderboard(Vec<LeaderboardEntry>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Welcome {
    pub player_id: PlayerId,
    pub world: String,
    pub players: Vec<PlayerEntry>,
    pub leaderboard: Vec<LeaderboardEntry>,
}

/// Row of the player list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerEntry {
    pub id: PlayerId,
    pub name: String,
    pub character: String,
    /// Formatted as `(x,y)`
    pub position: String,
    pub kills: u32,
    pub deaths: u32,
    pub status: String,
}

/// Row of the leaderboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub name: String,
    pub character: String,
    pub kills: u32,
    pub deaths: u32,
    /// Kill/death ratio with two decimals
    pub kdr: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_join() {
        let msg: ClientMsg = serde_json::from_value(json!({
            "type": "join",
            "data": { "name": "bob", "character": "B", "spectator": false }
        }))
        .unwrap();
        match msg {
            ClientMsg::Join(req) => {
                assert_eq!(req.name, "bob");
                assert_eq!(req.character, "B");
                assert!(!req.spectator);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn join_fields_default_when_missing() {
        let msg: ClientMsg =
            serde_json::from_value(json!({ "type": "join", "data": { "spectator": true } })).unwrap();
        let ClientMsg::Join(req) = msg else {
            panic!("expected join");
        };
        assert!(req.spectator);
        assert!(req.character.is_empty());
    }

    #[test]
    fn decodes_move_and_shoot() {
        let mv: ClientMsg =
            serde_json::from_str(r#"{"type":"move","data":{"direction":"up"}}"#).unwrap();
        assert!(matches!(mv, ClientMsg::Move(DirectionRequest { direction: Direction::Up })));
        let shot: ClientMsg =
            serde_json::from_str(r#"{"type":"shoot","data":{"direction":"right"}}"#).unwrap();
        assert!(matches!(
            shot,
            ClientMsg::Shoot(DirectionRequest { direction: Direction::Right })
        ));
    }

    #[test]
    fn rejects_unknown_type_and_direction() {
        assert!(serde_json::from_str::<ClientMsg>(r#"{"type":"dance","data":{}}"#).is_err());
        assert!(
            serde_json::from_str::<ClientMsg>(r#"{"type":"move","data":{"direction":"north"}}"#)
                .is_err()
        );
    }

    #[test]
    fn encodes_world_update_and_welcome() {
        let text = serde_json::to_value(ServerMsg::WorldUpdate("+-+\n".into())).unwrap();
        assert_eq!(text, json!({ "type": "worldUpdate", "data": "+-+\n" }));

        let id = PlayerId::new();
        let welcome = serde_json::to_value(ServerMsg::Welcome(Welcome {
            player_id: id,
            world: String::new(),
            players: vec![],
            leaderboard: vec![],
        }))
        .unwrap();
        assert_eq!(welcome["type"], "welcome");
        assert_eq!(welcome["data"]["playerId"], json!(id.to_string()));
    }

    #[test]
    fn encodes_leaderboard_rows() {
        let value = serde_json::to_value(ServerMsg::Leaderboard(vec![LeaderboardEntry {
            rank: 1,
            name: "a".into(),
            character: "A".into(),
            kills: 2,
            deaths: 0,
            kdr: "2.00".into(),
        }]))
        .unwrap();
        assert_eq!(value["type"], "leaderboard");
        assert_eq!(value["data"][0]["kdr"], "2.00");
        assert_eq!(value["data"][0]["rank"], 1);
    }
}
