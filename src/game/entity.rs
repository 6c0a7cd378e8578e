//! Players and bullets

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::time::Instant;
use uuid::Uuid;

use crate::util::time::SHOOT_COOLDOWN;

/// Glyph stamped on the grid for every bullet in flight
pub const BULLET_GLYPH: char = '*';

/// Longest display name kept after trimming
pub const MAX_NAME_LEN: usize = 15;

/// Opaque player/session identifier, generated at join
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(Uuid);

impl PlayerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PlayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Bullet identifier, a nanosecond creation stamp unique within the world
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BulletId(u64);

impl BulletId {
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for BulletId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bullet_{}", self.0)
    }
}

/// Cardinal direction used by both move and shoot requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// Unit vector on the grid; y grows downwards
    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }
}

/// Player state (authoritative)
#[derive(Debug, Clone)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub glyph: char,

    // Position
    pub x: i32,
    pub y: i32,

    // Score
    pub kills: u32,
    pub deaths: u32,

    // Lifecycle
    pub alive: bool,
    pub spectator: bool,
    pub last_active: Instant,
    pub last_shot: Option<Instant>,
    pub respawn_at: Option<Instant>,

    /// Position in join order, used to keep snapshots stable
    pub join_seq: u64,
}

impl Player {
    pub fn new(
        name: &str,
        glyph: char,
        spectator: bool,
        x: i32,
        y: i32,
        join_seq: u64,
        now: Instant,
    ) -> Self {
        Self {
            id: PlayerId::new(),
            name: clean_name(name),
            glyph,
            x,
            y,
            kills: 0,
            deaths: 0,
            alive: true,
            spectator,
            last_active: now,
            last_shot: None,
            respawn_at: None,
            join_seq,
        }
    }

    /// Whether this player blocks the given cell for movement, spawning and hits.
    /// Spectators count too; they are only left out of the rendered frame.
    pub fn occupies(&self, x: i32, y: i32) -> bool {
        self.alive && self.x == x && self.y == y
    }

    /// Dead players and spectators cannot move or shoot
    pub fn can_act(&self) -> bool {
        self.alive && !self.spectator
    }

    /// Cooldown check against the last successful shot
    pub fn can_shoot(&self, now: Instant) -> bool {
        self.can_act()
            && self
                .last_shot
                .map_or(true, |last| now.saturating_duration_since(last) >= SHOOT_COOLDOWN)
    }

    /// Human readable liveness, e.g. `Dead (2.4s remaining)`
    pub fn status(&self, now: Instant) -> String {
        if self.alive {
            return "Alive".to_string();
        }
        let remaining = self
            .respawn_at
            .map(|at| at.saturating_duration_since(now).as_secs_f64())
            .unwrap_or(0.0);
        format!("Dead ({:.1}s remaining)", remaining)
    }

    /// Kill/death ratio; equals the kill count while deaths are zero
    pub fn kdr(&self) -> f64 {
        if self.deaths == 0 {
            self.kills as f64
        } else {
            self.kills as f64 / self.deaths as f64
        }
    }

    pub fn position(&self) -> String {
        format!("({},{})", self.x, self.y)
    }
}

/// Validate a requested glyph. Spectators may leave it empty.
pub fn parse_glyph(raw: &str, spectator: bool) -> Option<char> {
    let mut chars = raw.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if !c.is_control() => Some(c),
        _ if spectator => Some(' '),
        _ => None,
    }
}

fn clean_name(raw: &str) -> String {
    let name: String = raw.trim().chars().take(MAX_NAME_LEN).collect();
    if name.is_empty() {
        "Player".to_string()
    } else {
        name
    }
}

/// Bullet in flight
#[derive(Debug, Clone)]
pub struct Bullet {
    pub owner_id: PlayerId,
    pub x: i32,
    pub y: i32,
    pub dx: i32,
    pub dy: i32,
    pub glyph: char,
}

impl Bullet {
    pub fn new(owner_id: PlayerId, x: i32, y: i32, direction: Direction) -> Self {
        let (dx, dy) = direction.delta();
        Self {
            owner_id,
            x,
            y,
            dx,
            dy,
            glyph: BULLET_GLYPH,
        }
    }

    /// Move one cell along the direction vector
    pub fn advance(&mut self) {
        self.x += self.dx;
        self.y += self.dy;
    }
}
