//! World grid and ASCII frame rendering

use parking_lot::Mutex;
use std::collections::HashMap;

use super::entity::{Bullet, BulletId, Player};

/// Arena width in cells
pub const WORLD_WIDTH: i32 = 150;
/// Arena height in cells
pub const WORLD_HEIGHT: i32 = 40;

const EMPTY_CELL: char = ' ';

/// Fixed-size grid holding the bullets in flight
pub struct World {
    width: i32,
    height: i32,
    pub bullets: HashMap<BulletId, Bullet>,
    /// Scratch cells reused by every render; never resized
    grid: Mutex<Vec<char>>,
}

impl World {
    pub fn new(width: i32, height: i32) -> Self {
        let cells = (width.max(0) * height.max(0)) as usize;
        Self {
            width,
            height,
            bullets: HashMap::new(),
            grid: Mutex::new(vec![EMPTY_CELL; cells]),
        }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && x < self.width && y >= 0 && y < self.height
    }

    /// Clamp a candidate cell onto the grid (never wraps)
    pub fn clamp(&self, x: i32, y: i32) -> (i32, i32) {
        (x.clamp(0, self.width - 1), y.clamp(0, self.height - 1))
    }

    pub fn center(&self) -> (i32, i32) {
        (self.width / 2, self.height / 2)
    }

    /// Render the bordered frame. Players are stamped after bullets so a
    /// player glyph wins over a bullet on the same cell.
    pub fn render<'a>(&self, players: impl IntoIterator<Item = &'a Player>) -> String {
        let mut grid = self.grid.lock();
        grid.fill(EMPTY_CELL);

        let width = self.width as usize;
        let index = |x: i32, y: i32| y as usize * width + x as usize;

        for bullet in self.bullets.values() {
            if self.in_bounds(bullet.x, bullet.y) {
                grid[index(bullet.x, bullet.y)] = bullet.glyph;
            }
        }

        for player in players {
            if player.alive && !player.spectator && self.in_bounds(player.x, player.y) {
                grid[index(player.x, player.y)] = player.glyph;
            }
        }

        let border = format!("+{}+\n", "-".repeat(width));
        let mut frame = String::with_capacity(border.len() * (self.height as usize + 2));
        frame.push_str(&border);
        for row in grid.chunks(width.max(1)).take(self.height as usize) {
            frame.push('|');
            frame.extend(row.iter());
            frame.push_str("|\n");
        }
        frame.push_str(&border);
        frame
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new(WORLD_WIDTH, WORLD_HEIGHT)
    }
}
