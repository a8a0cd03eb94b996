//! Run one agentic chat turn against a local producer and print the
//! streamed reply.
//!
//! Start a producer first (`agui serve` or the server crate's
//! `basic_server` example), then `cargo run --example simple_chat`.

use agui_client::interactive::StdinPrompter;
use agui_client::{
    AguiClient, ApprovalMode, ClientConfig, RunRequest, SessionStore, TextRenderer,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ClientConfig::default();
    let store = SessionStore::new(ClientConfig::config_dir())?;
    let client = AguiClient::new(config, store)?;

    let outcome = client
        .execute(
            RunRequest {
                endpoint: "/agentic_chat",
                message: Some("What's the weather like in San Francisco?"),
                interactive: false,
                approval: ApprovalMode::Auto,
            },
            &TextRenderer,
            &StdinPrompter,
        )
        .await?;

    println!("---");
    println!("assembled reply: {}", outcome.text);
    println!("tool calls observed: {}", outcome.tool_calls.len());
    Ok(())
}
