//! Player list and leaderboard snapshot building

use tokio::time::Instant;

use crate::ws::protocol::{LeaderboardEntry, PlayerEntry};

use super::entity::Player;

/// Which messages a state change has to fan out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Update {
    /// World frame only
    World,
    /// World frame and player list
    Roster,
    /// World frame, player list and leaderboard
    Full,
}

/// One row per player, in the order given
pub fn player_list(players: &[&Player], now: Instant) -> Vec<PlayerEntry> {
    players
        .iter()
        .map(|p| PlayerEntry {
            id: p.id,
            name: p.name.clone(),
            character: p.glyph.to_string(),
            position: p.position(),
            kills: p.kills,
            deaths: p.deaths,
            status: p.status(now),
        })
        .collect()
}

/// Kills descending, then deaths ascending. The sort is stable, so players
/// tied on both keep the order they were given in.
pub fn leaderboard(players: &[&Player]) -> Vec<LeaderboardEntry> {
    let mut ranked = players.to_vec();
    ranked.sort_by(|a, b| b.kills.cmp(&a.kills).then(a.deaths.cmp(&b.deaths)));

    ranked
        .into_iter()
        .enumerate()
        .map(|(i, p)| LeaderboardEntry {
            rank: i as u32 + 1,
            name: p.name.clone(),
            character: p.glyph.to_string(),
            kills: p.kills,
            deaths: p.deaths,
            kdr: format!("{:.2}", p.kdr()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn scored(name: &str, kills: u32, deaths: u32, seq: u64) -> Player {
        let mut p = Player::new(name, 'X', false, 0, 0, seq, Instant::now());
        p.kills = kills;
        p.deaths = deaths;
        p
    }

    #[test]
    fn leaderboard_orders_by_kills_then_deaths() {
        let a = scored("a", 1, 0, 0);
        let b = scored("b", 3, 2, 1);
        let c = scored("c", 3, 1, 2);
        let d = scored("d", 0, 0, 3);
        let board = leaderboard(&[&a, &b, &c, &d]);

        let names: Vec<&str> = board.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["c", "b", "a", "d"]);
        assert_eq!(board.iter().map(|e| e.rank).collect::<Vec<_>>(), [1, 2, 3, 4]);

        for pair in board.windows(2) {
            let (hi, lo) = (&pair[0], &pair[1]);
            assert!(hi.kills > lo.kills || (hi.kills == lo.kills && hi.deaths <= lo.deaths));
        }
    }

    #[test]
    fn kdr_has_two_decimals() {
        let a = scored("a", 2, 0, 0);
        let b = scored("b", 1, 3, 1);
        let board = leaderboard(&[&a, &b]);
        assert_eq!(board[0].kdr, "2.00");
        assert_eq!(board[1].kdr, "0.33");
    }

    #[test]
    fn ties_keep_input_order() {
        let a = scored("a", 1, 1, 0);
        let b = scored("b", 1, 1, 1);
        let board = leaderboard(&[&a, &b]);
        assert_eq!(board[0].name, "a");
        assert_eq!(board[1].name, "b");
    }

    #[test]
    fn player_list_formats_rows() {
        let now = Instant::now();
        let mut p = Player::new("eve", 'E', false, 12, 7, 0, now);
        p.kills = 4;
        let mut q = Player::new("joe", 'J', false, 1, 1, 1, now);
        q.alive = false;
        q.respawn_at = Some(now + Duration::from_secs(3));

        let rows = player_list(&[&p, &q], now);
        assert_eq!(rows[0].position, "(12,7)");
        assert_eq!(rows[0].character, "E");
        assert_eq!(rows[0].kills, 4);
        assert_eq!(rows[0].status, "Alive");
        assert_eq!(rows[1].status, "Dead (3.0s remaining)");
    }
}
