//! Agentic chat recipe.
//!
//! A short assistant message, a complete weather tool call, then a longer
//! paced text response. Exercises the full text and tool-call lifecycles
//! in one run.

use agui_core::{now_ms, Event, Role, RunInput};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use tokio::sync::mpsc;

use super::{run_identity, sse_response, RESPONSE_BUFFER};
use crate::config::RecipeConfig;
use crate::emitter::{Disconnected, RunEmitter};
use crate::state::AppState;

const REPLY_CHUNKS: &[&str] = &[
    "The forecast ",
    "for San Francisco ",
    "looks clear: ",
    "18°C, light wind ",
    "from the northwest, ",
    "and no rain expected ",
    "before the weekend.",
];

pub async fn handler(
    State(state): State<AppState>,
    Json(input): Json<RunInput>,
) -> impl IntoResponse {
    let (thread_id, run_id) = run_identity(&input.thread_id, &input.run_id);
    let (tx, rx) = mpsc::channel(RESPONSE_BUFFER);
    let config = state.config.clone();

    tokio::spawn(async move {
        let mut emitter = RunEmitter::new(tx, thread_id, run_id);
        let _ = run(&mut emitter, &config).await;
    });

    sse_response(rx)
}

async fn run(emitter: &mut RunEmitter, config: &RecipeConfig) -> Result<(), Disconnected> {
    emitter.start().await?;

    // Opening assistant message, streamed as one delta.
    let message_id = format!("msg-{}", uuid::Uuid::new_v4());
    emitter
        .emit(Event::TextMessageStart {
            message_id: message_id.clone(),
            role: Role::Assistant,
            timestamp: now_ms(),
        })
        .await?;
    emitter
        .emit(Event::TextMessageContent {
            message_id: message_id.clone(),
            delta: "Let me check the weather for you.".to_string(),
            timestamp: now_ms(),
        })
        .await?;
    emitter
        .emit(Event::TextMessageEnd {
            message_id,
            timestamp: now_ms(),
        })
        .await?;

    emitter.pace(config.tool_pause()).await?;

    // Weather tool call with its full arguments in a single delta.
    let tool_call_id = format!("call-{}", uuid::Uuid::new_v4());
    emitter
        .emit(Event::ToolCallStart {
            tool_call_id: tool_call_id.clone(),
            name: "get_weather".to_string(),
            parent_message_id: None,
            timestamp: now_ms(),
        })
        .await?;
    emitter
        .emit(Event::ToolCallArgs {
            tool_call_id: tool_call_id.clone(),
            delta: Some(r#"{"location":"San Francisco","unit":"celsius"}"#.to_string()),
            args: None,
            timestamp: now_ms(),
        })
        .await?;
    emitter
        .emit(Event::ToolCallEnd {
            tool_call_id,
            result: None,
            timestamp: now_ms(),
        })
        .await?;

    // Closing response, paced chunk by chunk.
    let message_id = format!("msg-{}", uuid::Uuid::new_v4());
    emitter
        .emit(Event::TextMessageStart {
            message_id: message_id.clone(),
            role: Role::Assistant,
            timestamp: now_ms(),
        })
        .await?;
    for chunk in REPLY_CHUNKS {
        emitter.pace(config.chunk_delay()).await?;
        emitter
            .emit(Event::TextMessageContent {
                message_id: message_id.clone(),
                delta: chunk.to_string(),
                timestamp: now_ms(),
            })
            .await?;
    }
    emitter
        .emit(Event::TextMessageEnd {
            message_id,
            timestamp: now_ms(),
        })
        .await?;

    emitter.finish().await
}
