//! # agui-server
//!
//! The producer half of the AG-UI protocol: an axum router whose endpoints
//! each emit a fixed, paced event sequence over SSE, plus a process-wide
//! shared-state store fanned out to any number of subscribers.
//!
//! # Example
//!
//! ```rust,no_run
//! use agui_server::AguiRouter;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let app = AguiRouter::new().with_cors().build();
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8000").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod emitter;
pub mod error;
pub(crate) mod recipes;
pub mod router;
pub mod shared_state;
pub(crate) mod state;

// Re-exports
pub use config::RecipeConfig;
pub use emitter::{Disconnected, RunEmitter, RunPhase};
pub use error::{BuildError, ServerError, ServerResult};
pub use router::AguiRouter;
pub use shared_state::{
    MutationOutcome, MutationRequest, SharedStateStore, StateChange, StateSnapshot,
};
