//! Router builder for the AG-UI producer endpoints.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::RecipeConfig;
use crate::error::BuildError;
use crate::recipes;
use crate::shared_state::SharedStateStore;
use crate::state::AppState;

/// Builder for the AG-UI endpoint router.
///
/// # Example
///
/// ```rust,no_run
/// use agui_server::AguiRouter;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let app = AguiRouter::new().with_cors().build();
///
/// let listener = tokio::net::TcpListener::bind("0.0.0.0:8000").await?;
/// axum::serve(listener, app).await?;
/// # Ok(())
/// # }
/// ```
pub struct AguiRouter {
    config: RecipeConfig,
    shared: Option<Arc<SharedStateStore>>,
    cors: bool,
}

impl Default for AguiRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl AguiRouter {
    pub fn new() -> Self {
        Self {
            config: RecipeConfig::default(),
            shared: None,
            cors: false,
        }
    }

    /// Override the recipe pacing configuration.
    pub fn with_config(mut self, config: RecipeConfig) -> Self {
        self.config = config;
        self
    }

    /// Share an existing state store instead of creating a fresh one.
    ///
    /// Useful when an embedding application also mutates the store.
    pub fn with_shared_store(mut self, store: Arc<SharedStateStore>) -> Self {
        self.shared = Some(store);
        self
    }

    /// Enable permissive CORS on every endpoint.
    pub fn with_cors(mut self) -> Self {
        self.cors = true;
        self
    }

    /// Build the router with all eight endpoints mounted.
    pub fn build(self) -> Router {
        let state = match self.shared {
            Some(store) => AppState::with_store(store, self.config),
            None => AppState::new(self.config),
        };

        let mut router = Router::new()
            .route(
                "/tool_based_generative_ui",
                post(recipes::haiku::handler),
            )
            .route("/agentic_chat", post(recipes::chat::handler))
            .route(
                "/agentic_generative_ui",
                post(recipes::generative_ui::handler),
            )
            .route("/human_in_the_loop", post(recipes::human_loop::handler))
            .route(
                "/predictive_state_updates",
                post(recipes::predictive::handler),
            )
            .route(
                "/shared_state",
                get(recipes::shared::subscribe_handler).post(recipes::shared::mutate_handler),
            )
            .route("/tools", get(recipes::tools::handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http());

        if self.cors {
            router = router.layer(CorsLayer::permissive());
        }

        router
    }

    /// Build the router nested under a prefix path.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::EmptyPrefix`] if the prefix is empty.
    pub fn build_nested(self, prefix: impl Into<String>) -> Result<Router, BuildError> {
        let prefix = prefix.into();
        if prefix.is_empty() {
            return Err(BuildError::EmptyPrefix);
        }
        Ok(Router::new().nest(&prefix, self.build()))
    }
}
