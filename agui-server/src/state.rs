//! Application state for the AG-UI server.

use std::sync::Arc;

use crate::config::RecipeConfig;
use crate::shared_state::SharedStateStore;

/// Shared application state, cloned into each request handler.
#[derive(Clone)]
pub struct AppState {
    /// The process-wide shared-state store.
    pub shared: Arc<SharedStateStore>,
    /// Recipe pacing configuration.
    pub config: Arc<RecipeConfig>,
}

impl AppState {
    pub fn new(config: RecipeConfig) -> Self {
        Self {
            shared: Arc::new(SharedStateStore::new()),
            config: Arc::new(config),
        }
    }

    /// Build state around an existing store (used by tests and embedders).
    pub fn with_store(shared: Arc<SharedStateStore>, config: RecipeConfig) -> Self {
        Self {
            shared,
            config: Arc::new(config),
        }
    }
}
