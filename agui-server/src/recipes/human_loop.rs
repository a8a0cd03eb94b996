//! Human-in-the-loop recipe.
//!
//! Branches on the role of the last message in the request. A fresh user
//! turn produces a `generate_task_steps` tool call whose JSON arguments
//! stream out fragment by fragment; a `tool` turn (the operator already
//! answered) produces a short confirmation message instead.

use agui_core::{now_ms, Event, Role, RunInput};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use tokio::sync::mpsc;

use super::{run_identity, sse_response, RESPONSE_BUFFER};
use crate::config::RecipeConfig;
use crate::emitter::{Disconnected, RunEmitter};
use crate::error::ServerError;
use crate::state::AppState;

const TASK_STEPS: &[&str] = &[
    "Review the incoming request",
    "Identify affected systems",
    "Draft the change plan",
    "Estimate the blast radius",
    "Collect required approvals",
    "Schedule the maintenance window",
    "Apply the change",
    "Verify system health",
    "Notify stakeholders",
    "Archive the runbook entry",
];

pub async fn handler(
    State(state): State<AppState>,
    Json(input): Json<RunInput>,
) -> Result<impl IntoResponse, ServerError> {
    if input.messages.is_empty() {
        return Err(ServerError::InvalidRequest(
            "messages must not be empty".to_string(),
        ));
    }

    let (thread_id, run_id) = run_identity(&input.thread_id, &input.run_id);
    let (tx, rx) = mpsc::channel(RESPONSE_BUFFER);
    let config = state.config.clone();
    let last_role = input.last_role();

    tokio::spawn(async move {
        let mut emitter = RunEmitter::new(tx, thread_id, run_id);
        let result = match last_role {
            Some(Role::Tool) => confirmation(&mut emitter, &config).await,
            _ => propose_steps(&mut emitter, &config).await,
        };
        if result.is_err() {
            tracing::debug!("human-loop client disconnected mid-run");
        }
    });

    Ok(sse_response(rx))
}

/// Stream the step proposal as an incrementally valid JSON argument buffer.
async fn propose_steps(emitter: &mut RunEmitter, config: &RecipeConfig) -> Result<(), Disconnected> {
    emitter.start().await?;

    let tool_call_id = format!("call-{}", uuid::Uuid::new_v4());
    emitter
        .emit(Event::ToolCallStart {
            tool_call_id: tool_call_id.clone(),
            name: "generate_task_steps".to_string(),
            parent_message_id: None,
            timestamp: now_ms(),
        })
        .await?;

    emitter
        .emit(args_delta(&tool_call_id, r#"{"steps":["#))
        .await?;

    for (index, description) in TASK_STEPS.iter().enumerate() {
        emitter.pace(config.chunk_delay()).await?;
        let step = serde_json::json!({ "step": index + 1, "description": description });
        let fragment = if index == 0 {
            step.to_string()
        } else {
            format!(",{}", step)
        };
        emitter.emit(args_delta(&tool_call_id, &fragment)).await?;
    }

    emitter.emit(args_delta(&tool_call_id, "]}")).await?;
    emitter
        .emit(Event::ToolCallEnd {
            tool_call_id,
            result: None,
            timestamp: now_ms(),
        })
        .await?;

    emitter.finish().await
}

async fn confirmation(emitter: &mut RunEmitter, config: &RecipeConfig) -> Result<(), Disconnected> {
    emitter.start().await?;

    let message_id = format!("msg-{}", uuid::Uuid::new_v4());
    emitter
        .emit(Event::TextMessageStart {
            message_id: message_id.clone(),
            role: Role::Assistant,
            timestamp: now_ms(),
        })
        .await?;

    for delta in [
        "Thanks! ",
        "I've recorded the step results ",
        "and the plan is now complete.",
    ] {
        emitter.pace(config.chunk_delay()).await?;
        emitter
            .emit(Event::TextMessageContent {
                message_id: message_id.clone(),
                delta: delta.to_string(),
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

fn args_delta(tool_call_id: &str, fragment: &str) -> Event {
    Event::ToolCallArgs {
        tool_call_id: tool_call_id.to_string(),
        delta: Some(fragment.to_string()),
        args: None,
        timestamp: now_ms(),
    }
}
