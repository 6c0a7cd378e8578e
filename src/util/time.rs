//! Time utilities for the arena simulation

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Interval between two advancement steps of a single bullet
pub const BULLET_TICK: Duration = Duration::from_millis(100);

/// Minimum time between two successful shots by the same player
pub const SHOOT_COOLDOWN: Duration = Duration::from_millis(500);

/// Time a killed player stays dead before the respawn timeline runs
pub const RESPAWN_DELAY: Duration = Duration::from_secs(3);

/// Get current Unix timestamp in nanoseconds
pub fn unix_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_nanos() as u64
}

/// Server start time for uptime tracking
static SERVER_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize server start time (call once at startup)
pub fn init_server_time() {
    SERVER_START.get_or_init(Instant::now);
}

/// Get server uptime in seconds
pub fn uptime_secs() -> u64 {
    SERVER_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}
