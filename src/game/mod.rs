//! Game simulation modules

pub mod arena;
pub mod broadcast;
pub mod entity;
pub mod snapshot;
pub mod world;

pub use arena::{Arena, ArenaStats};
pub use broadcast::{Connection, TransportError};
pub use entity::{Direction, PlayerId};
