//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::game::Arena;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub arena: Arc<Arena>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
            arena: Arena::new(),
        }
    }
}
