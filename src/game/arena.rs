//! Arena state and the authoritative simulation operations
//!
//! Every player, bullet and connection lives in one [`ArenaState`] behind a
//! single reader/writer lock. Mutations take the write lock for the state
//! change only; all network sends happen after the guard is released.
//! Bullets and respawns run as their own tasks and re-resolve their entity by
//! id on every step, so a missing entity simply ends the task.

use parking_lot::RwLock;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::util::time::{unix_nanos, BULLET_TICK, RESPAWN_DELAY};
use crate::ws::protocol::{LeaderboardEntry, PlayerEntry, ServerMsg, Welcome};

use super::broadcast::{Connection, ConnectionId};
use super::entity::{parse_glyph, Bullet, BulletId, Direction, Player, PlayerId};
use super::snapshot::{leaderboard, player_list, Update};
use super::world::World;

/// Random placements tried before a respawn falls back to the world center
pub const RESPAWN_ATTEMPTS: u32 = 50;

/// Errors surfaced by arena operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArenaError {
    #[error("glyph must be exactly one printable character, got {0:?}")]
    InvalidGlyph(String),
}

/// Counters for the health endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ArenaStats {
    pub players: usize,
    pub connections: usize,
    pub bullets: usize,
}

/// Outcome of one bullet step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulletStep {
    /// Already removed by someone else
    Gone,
    /// Still in flight
    Flying,
    /// Left the grid and was removed
    OutOfBounds,
    /// Struck a player and was removed
    Hit { victim: PlayerId, shooter: PlayerId },
}

/// A connection bound to its player
struct Session {
    conn: Connection,
    player_id: PlayerId,
}

/// Everything guarded by the arena lock
pub struct ArenaState {
    pub world: World,
    pub players: HashMap<PlayerId, Player>,
    sessions: HashMap<ConnectionId, Session>,
    joins: u64,
    last_bullet_id: u64,
}

impl ArenaState {
    pub fn new(world: World) -> Self {
        Self {
            world,
            players: HashMap::new(),
            sessions: HashMap::new(),
            joins: 0,
            last_bullet_id: 0,
        }
    }

    /// Register a player at the world center and bind it to `conn`.
    /// Returns the new player and the one previously bound to `conn`, if any.
    /// No collision check: a join may overlap whoever stands at the center.
    pub fn add_player(
        &mut self,
        conn: Connection,
        name: &str,
        glyph: char,
        spectator: bool,
        now: Instant,
    ) -> (Player, Option<Player>) {
        let (x, y) = self.world.center();
        let player = Player::new(name, glyph, spectator, x, y, self.joins, now);
        self.joins += 1;

        let displaced = self
            .sessions
            .insert(
                conn.id(),
                Session {
                    conn,
                    player_id: player.id,
                },
            )
            .and_then(|old| self.players.remove(&old.player_id));
        self.players.insert(player.id, player.clone());

        (player, displaced)
    }

    /// Drop a connection and its bound player
    pub fn remove_connection(&mut self, id: ConnectionId) -> Option<Player> {
        let session = self.sessions.remove(&id)?;
        self.players.remove(&session.player_id)
    }

    /// Whether an alive player other than `except` stands on the cell
    pub fn is_occupied(&self, x: i32, y: i32, except: Option<PlayerId>) -> bool {
        self.players
            .values()
            .any(|p| Some(p.id) != except && p.occupies(x, y))
    }

    pub fn move_player(&mut self, id: PlayerId, direction: Direction, now: Instant) -> bool {
        let Some(player) = self.players.get(&id) else {
            return false;
        };
        if !player.can_act() {
            return false;
        }

        let (dx, dy) = direction.delta();
        let (x, y) = self.world.clamp(player.x + dx, player.y + dy);
        if self.is_occupied(x, y, Some(id)) {
            return false;
        }

        let Some(player) = self.players.get_mut(&id) else {
            return false;
        };
        player.x = x;
        player.y = y;
        player.last_active = now;
        true
    }

    /// Spawn a bullet on the shooter's cell. `None` when the shooter is
    /// unknown, dead, spectating or still cooling down.
    pub fn shoot(&mut self, id: PlayerId, direction: Direction, now: Instant) -> Option<BulletId> {
        let player = self.players.get(&id)?;
        if !player.can_shoot(now) {
            return None;
        }
        let (x, y) = (player.x, player.y);

        let bullet_id = self.next_bullet_id();
        self.world
            .bullets
            .insert(bullet_id, Bullet::new(id, x, y, direction));
        if let Some(player) = self.players.get_mut(&id) {
            player.last_shot = Some(now);
        }
        Some(bullet_id)
    }

    /// Creation-time id, bumped past the previous one on equal clock readings
    fn next_bullet_id(&mut self) -> BulletId {
        let raw = unix_nanos().max(self.last_bullet_id + 1);
        self.last_bullet_id = raw;
        BulletId::from_raw(raw)
    }

    /// Move a bullet one cell and resolve what it ran into
    pub fn advance_bullet(&mut self, id: BulletId, now: Instant) -> BulletStep {
        let Some(bullet) = self.world.bullets.get_mut(&id) else {
            return BulletStep::Gone;
        };
        bullet.advance();
        let (x, y, shooter) = (bullet.x, bullet.y, bullet.owner_id);

        if !self.world.in_bounds(x, y) {
            self.world.bullets.remove(&id);
            return BulletStep::OutOfBounds;
        }

        let victim = self
            .players
            .values()
            .filter(|p| p.id != shooter && p.occupies(x, y))
            .min_by_key(|p| p.join_seq)
            .map(|p| p.id);
        let Some(victim) = victim else {
            return BulletStep::Flying;
        };

        self.world.bullets.remove(&id);
        if let Some(player) = self.players.get_mut(&victim) {
            player.alive = false;
            player.deaths += 1;
            player.respawn_at = Some(now + RESPAWN_DELAY);
        }
        if let Some(player) = self.players.get_mut(&shooter) {
            player.kills += 1;
        }
        BulletStep::Hit { victim, shooter }
    }

    /// Bring a dead player back on a free cell chosen by `pick`. After
    /// [`RESPAWN_ATTEMPTS`] misses the player lands on the world center even
    /// if that cell is taken. `None` if the player is gone or already alive.
    pub fn respawn(
        &mut self,
        id: PlayerId,
        mut pick: impl FnMut(u32, &World) -> (i32, i32),
    ) -> Option<(i32, i32)> {
        if self.players.get(&id)?.alive {
            return None;
        }

        let cell = (0..RESPAWN_ATTEMPTS)
            .map(|attempt| pick(attempt, &self.world))
            .find(|&(x, y)| self.world.in_bounds(x, y) && !self.is_occupied(x, y, None))
            .unwrap_or_else(|| self.world.center());

        let player = self.players.get_mut(&id)?;
        player.x = cell.0;
        player.y = cell.1;
        player.alive = true;
        player.respawn_at = None;
        Some(cell)
    }

    /// Players in join order
    pub fn ordered_players(&self) -> Vec<&Player> {
        let mut players: Vec<&Player> = self.players.values().collect();
        players.sort_by_key(|p| p.join_seq);
        players
    }

    pub fn render(&self) -> String {
        self.world.render(self.ordered_players())
    }

    pub fn player_list(&self, now: Instant) -> Vec<PlayerEntry> {
        player_list(&self.ordered_players(), now)
    }

    pub fn leaderboard(&self) -> Vec<LeaderboardEntry> {
        leaderboard(&self.ordered_players())
    }

    /// Messages for an update, all taken from this one snapshot
    pub fn build(&self, update: Update, now: Instant) -> Vec<ServerMsg> {
        let players = self.ordered_players();
        let mut messages = vec![ServerMsg::WorldUpdate(
            self.world.render(players.iter().copied()),
        )];
        if update != Update::World {
            messages.push(ServerMsg::PlayerList(player_list(&players, now)));
        }
        if update == Update::Full {
            messages.push(ServerMsg::Leaderboard(leaderboard(&players)));
        }
        messages
    }

    pub fn welcome(&self, player_id: PlayerId, now: Instant) -> ServerMsg {
        let players = self.ordered_players();
        ServerMsg::Welcome(Welcome {
            player_id,
            world: self.world.render(players.iter().copied()),
            players: player_list(&players, now),
            leaderboard: leaderboard(&players),
        })
    }

    pub fn connections(&self) -> Vec<Connection> {
        self.sessions.values().map(|s| s.conn.clone()).collect()
    }

    pub fn stats(&self) -> ArenaStats {
        ArenaStats {
            players: self.players.len(),
            connections: self.sessions.len(),
            bullets: self.world.bullets.len(),
        }
    }
}

/// Pseudo-random cell seeded from the clock, one fresh seed per attempt
fn time_seeded_cell(attempt: u32, world: &World) -> (i32, i32) {
    let mut rng = ChaCha8Rng::seed_from_u64(unix_nanos() ^ (u64::from(attempt) << 32));
    (
        rng.gen_range(0..world.width()),
        rng.gen_range(0..world.height()),
    )
}

/// The shared arena
pub struct Arena {
    pub(super) state: RwLock<ArenaState>,
}

impl Arena {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::with_world(World::default()))
    }

    pub fn with_world(world: World) -> Self {
        Self {
            state: RwLock::new(ArenaState::new(world)),
        }
    }

    /// Bind a new player to `conn`, greet it privately, then tell everyone
    pub async fn join(
        &self,
        conn: &Connection,
        name: &str,
        character: &str,
        spectator: bool,
    ) -> Result<Player, ArenaError> {
        let glyph = parse_glyph(character, spectator)
            .ok_or_else(|| ArenaError::InvalidGlyph(character.to_string()))?;

        let (player, displaced, welcome) = {
            let mut state = self.state.write();
            let now = Instant::now();
            let (player, displaced) = state.add_player(conn.clone(), name, glyph, spectator, now);
            let welcome = state.welcome(player.id, now);
            (player, displaced, welcome)
        };

        if let Some(old) = displaced {
            info!(player_id = %old.id, name = %old.name, "Player replaced by rejoin");
        }
        info!(
            player_id = %player.id,
            conn_id = %conn.id(),
            name = %player.name,
            glyph = %player.glyph,
            spectator,
            "Player joined"
        );

        self.send_to(conn, &welcome).await;
        self.publish(Update::Full).await;
        Ok(player)
    }

    /// Step one cell; broadcasts the world frame when the move happened
    pub async fn move_player(&self, id: PlayerId, direction: Direction) -> bool {
        let moved = self.state.write().move_player(id, direction, Instant::now());
        if moved {
            debug!(player_id = %id, ?direction, "Player moved");
            self.publish(Update::World).await;
        }
        moved
    }

    /// Fire a bullet and start its timeline. The bullet shows up on its
    /// first tick, so nothing is broadcast here.
    pub fn shoot(self: &Arc<Self>, id: PlayerId, direction: Direction) -> bool {
        let bullet = self.state.write().shoot(id, direction, Instant::now());
        match bullet {
            Some(bullet_id) => {
                debug!(player_id = %id, bullet_id = %bullet_id, ?direction, "Player shot");
                tokio::spawn(Arc::clone(self).run_bullet(bullet_id));
                true
            }
            None => false,
        }
    }

    /// Remove a connection and its player
    pub async fn leave(&self, conn_id: ConnectionId) -> bool {
        let removed = self.state.write().remove_connection(conn_id);
        match removed {
            Some(player) => {
                info!(player_id = %player.id, conn_id = %conn_id, name = %player.name, "Player left");
                self.publish(Update::Full).await;
                true
            }
            None => false,
        }
    }

    pub fn player_list(&self) -> Vec<PlayerEntry> {
        self.state.read().player_list(Instant::now())
    }

    pub fn leaderboard(&self) -> Vec<LeaderboardEntry> {
        self.state.read().leaderboard()
    }

    pub fn render(&self) -> String {
        self.state.read().render()
    }

    pub fn stats(&self) -> ArenaStats {
        self.state.read().stats()
    }

    /// Whether `id` still belongs to a registered player
    pub fn contains(&self, id: PlayerId) -> bool {
        self.state.read().players.contains_key(&id)
    }

    async fn run_bullet(self: Arc<Self>, id: BulletId) {
        let mut ticker = interval_at(Instant::now() + BULLET_TICK, BULLET_TICK);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let step = self.state.write().advance_bullet(id, Instant::now());
            match step {
                BulletStep::Gone => return,
                BulletStep::Flying => self.publish(Update::World).await,
                BulletStep::OutOfBounds => {
                    debug!(bullet_id = %id, "Bullet left the arena");
                    self.publish(Update::World).await;
                    return;
                }
                BulletStep::Hit { victim, shooter } => {
                    info!(bullet_id = %id, shooter_id = %shooter, victim_id = %victim, "Player killed");
                    tokio::spawn(Arc::clone(&self).run_respawn(victim));
                    self.publish(Update::Full).await;
                    return;
                }
            }
        }
    }

    async fn run_respawn(self: Arc<Self>, id: PlayerId) {
        sleep(RESPAWN_DELAY).await;

        let cell = self.state.write().respawn(id, time_seeded_cell);
        if let Some((x, y)) = cell {
            info!(player_id = %id, x, y, "Player respawned");
            self.publish(Update::Roster).await;
        }
    }

    #[cfg(test)]
    pub(crate) fn with_state<R>(&self, f: impl FnOnce(&mut ArenaState) -> R) -> R {
        f(&mut *self.state.write())
    }
}
