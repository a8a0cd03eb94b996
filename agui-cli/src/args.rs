//! Command-line argument tree.

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(
    name = "agui",
    version,
    about = "AG-UI protocol client and demo server",
    propagate_version = true
)]
pub struct Cli {
    #[command(flatten)]
    pub common: CommonArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Flags shared by every command; each one overrides config and env.
#[derive(Debug, Args)]
pub struct CommonArgs {
    /// Producer base URL.
    #[arg(long, global = true)]
    pub server: Option<String>,

    /// API key for authenticated producers.
    #[arg(long, global = true)]
    pub api_key: Option<String>,

    /// Header carrying the key (Authorization or X-API-Key).
    #[arg(long, global = true)]
    pub auth_header: Option<String>,

    /// Scheme prefix used with the Authorization header.
    #[arg(long, global = true)]
    pub auth_scheme: Option<String>,

    /// Log verbosity (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log output format.
    #[arg(long, global = true, value_enum)]
    pub log_format: Option<FormatArg>,

    /// Event rendering mode.
    #[arg(long, global = true, value_enum)]
    pub output: Option<FormatArg>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ApprovalArg {
    /// Approve every tool call silently.
    Auto,
    /// Prompt for every tool call.
    Manual,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the client version.
    Version,

    /// Run the demo producer.
    Serve(ServeArgs),

    /// Chat against the agentic chat endpoint.
    Chat(ChatArgs),

    /// Run the tool-based generative UI recipe.
    Ui(MessageArgs),

    /// Stream an arbitrary run endpoint.
    Stream(StreamArgs),

    /// Run the human-in-the-loop recipe.
    #[command(name = "human-loop")]
    HumanLoop(HumanLoopArgs),

    /// Run the agentic generative UI (state machine) recipe.
    State(MessageArgs),

    /// Run the predictive state updates recipe.
    Predictive(MessageArgs),

    /// Shared-state subscription and mutations.
    Shared {
        #[command(subcommand)]
        command: SharedCommand,
    },

    /// Inspect and run tools.
    Tools {
        #[command(subcommand)]
        command: ToolsCommand,
    },

    /// Manage conversation sessions.
    Session {
        #[command(subcommand)]
        command: SessionCommand,
    },

    /// Manage client configuration.
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Listen address.
    #[arg(long, default_value = "127.0.0.1:8000")]
    pub addr: String,

    /// Enable permissive CORS.
    #[arg(long)]
    pub cors: bool,

    /// Delay between streamed chunks, in milliseconds.
    #[arg(long)]
    pub chunk_delay_ms: Option<u64>,

    /// Delay between generative-UI steps, in milliseconds.
    #[arg(long)]
    pub step_delay_ms: Option<u64>,
}

#[derive(Debug, Args)]
pub struct ChatArgs {
    /// The user message.
    pub message: String,

    /// Prompt apply/regenerate/cancel when tool results are present.
    #[arg(long)]
    pub interactive: bool,
}

#[derive(Debug, Args)]
pub struct MessageArgs {
    /// Optional user message for the run input.
    pub message: Option<String>,
}

#[derive(Debug, Args)]
pub struct StreamArgs {
    /// Endpoint path to post the run to.
    #[arg(long, default_value = "/agentic_chat")]
    pub endpoint: String,

    /// Optional user message for the run input.
    pub message: Option<String>,
}

#[derive(Debug, Args)]
pub struct HumanLoopArgs {
    /// The user message.
    pub message: String,

    /// Tool approval mode.
    #[arg(long, value_enum, default_value = "manual")]
    pub approval: ApprovalArg,
}

#[derive(Debug, Subcommand)]
pub enum SharedCommand {
    /// Subscribe to the shared-state stream.
    Watch {
        /// Client id echoed in keepalive frames.
        #[arg(long)]
        cid: Option<String>,
        /// Ask the producer to drive demo mutations.
        #[arg(long)]
        demo: bool,
        /// Stop after this many events.
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Increment the shared counter.
    Increment,
    /// Decrement the shared counter.
    Decrement,
    /// Reset the shared counter.
    Reset,
    /// Append an item.
    Add {
        /// Item value as JSON (strings may be given bare).
        value: Option<String>,
    },
    /// Clear all items.
    Clear,
}

#[derive(Debug, Subcommand)]
pub enum ToolsCommand {
    /// List the producer's tools.
    List,
    /// Show one producer tool, schema included.
    Describe { name: String },
    /// Execute a local client tool.
    Run {
        name: String,
        /// Argument object as JSON.
        #[arg(long, default_value = "{}")]
        args: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum SessionCommand {
    /// Open a fresh session and make it active.
    Open {
        #[arg(long)]
        label: Option<String>,
        /// Attach metadata entries (repeatable).
        #[arg(long = "meta", value_name = "KEY=VALUE")]
        meta: Vec<String>,
    },
    /// Clear the active session pointer.
    Close,
    /// List stored sessions.
    List,
    /// Export the active session to a file.
    Save { path: std::path::PathBuf },
    /// Make a stored session active.
    Load { thread_id: String },
    /// Re-open the most recently used session.
    Resume,
    /// Export one session to a file.
    Export {
        thread_id: String,
        path: std::path::PathBuf,
    },
    /// Import a session file into the store.
    Import { path: std::path::PathBuf },
    /// Print a session's conversation history.
    History {
        /// Defaults to the active session.
        thread_id: Option<String>,
    },
    /// Delete a stored session.
    Delete { thread_id: String },
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the effective configuration.
    Show,
    /// Print the config and session paths.
    Paths,
    /// Read one config key.
    Get { key: String },
    /// Write one config key.
    Set { key: String, value: String },
    /// Clear one config key.
    Unset { key: String },
}
