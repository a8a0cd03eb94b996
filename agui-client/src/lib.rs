//! # agui-client
//!
//! The consumer half of the AG-UI protocol: HTTP transport with auth and
//! retry, SSE event ingestion, incremental reconstruction of text, tool
//! calls and shared state, file-backed session persistence, renderers, a
//! local tool registry, and the interactive decision layer.
//!
//! ## Quick start
//!
//! ```ignore
//! use agui_client::{AguiClient, ClientConfig, RunRequest, SessionStore};
//! use agui_client::interactive::{ApprovalMode, StdinPrompter};
//! use agui_client::renderer::TextRenderer;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::default();
//! let store = SessionStore::new(ClientConfig::config_dir())?;
//! let client = AguiClient::new(config, store)?;
//!
//! let outcome = client
//!     .execute(
//!         RunRequest {
//!             endpoint: "/agentic_chat",
//!             message: Some("What's the weather like?"),
//!             interactive: false,
//!             approval: ApprovalMode::Auto,
//!         },
//!         &TextRenderer,
//!         &StdinPrompter,
//!     )
//!     .await?;
//! println!("{}", outcome.text);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod interactive;
pub mod renderer;
pub mod run;
pub mod session;
pub mod stream;
pub mod tools;
pub mod transport;

pub use client::{AguiClient, RunRequest};
pub use config::{ClientConfig, LogFormat, OutputMode, RetryConfig};
pub use error::{ClientError, Result};
pub use interactive::{
    ApprovalMode, DecisionPrompter, RunDecision, ScriptedPrompter, StdinPrompter, ToolDecision,
};
pub use renderer::{JsonRenderer, RecordingRenderer, Renderer, TextRenderer};
pub use run::{CompletedToolCall, RunConsumer, RunOutcome, RunTerminal};
pub use session::{Session, SessionError, SessionStore, SessionSummary};
pub use stream::EventStream;
pub use tools::{ClientTool, CurrentTime, EchoTool, ToolError, ToolExecution, ToolRegistry};
pub use transport::Transport;
