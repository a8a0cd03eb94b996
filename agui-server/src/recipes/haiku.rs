//! Tool-based generative UI recipe.
//!
//! The whole result arrives as one MESSAGES_SNAPSHOT carrying a single
//! assistant message whose `generate_haiku` tool call already holds the
//! complete arguments. No streaming deltas.

use agui_core::{now_ms, Event, Message, Role, RunInput, ToolCall};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use tokio::sync::mpsc;

use super::{run_identity, sse_response, RESPONSE_BUFFER};
use crate::emitter::RunEmitter;
use crate::state::AppState;

pub async fn handler(
    State(_state): State<AppState>,
    Json(input): Json<RunInput>,
) -> impl IntoResponse {
    let (thread_id, run_id) = run_identity(&input.thread_id, &input.run_id);
    let (tx, rx) = mpsc::channel(RESPONSE_BUFFER);

    tokio::spawn(async move {
        let mut emitter = RunEmitter::new(tx, thread_id, run_id);
        let _ = run(&mut emitter).await;
    });

    sse_response(rx)
}

async fn run(emitter: &mut RunEmitter) -> Result<(), crate::emitter::Disconnected> {
    emitter.start().await?;

    let arguments = serde_json::json!({
        "topic": "nature",
        "japanese": ["春の雨降る", "新緑の葉に優しく", "命再び"],
        "english": [
            "Spring rain falling down",
            "Gentle drops on new green leaves",
            "Life begins again"
        ],
    });

    let message = Message {
        id: format!("msg-{}", uuid::Uuid::new_v4()),
        role: Role::Assistant,
        content: None,
        tool_calls: Some(vec![ToolCall::function(
            format!("call-{}", uuid::Uuid::new_v4()),
            "generate_haiku",
            arguments.to_string(),
        )]),
        tool_call_id: None,
    };

    emitter
        .emit(Event::MessagesSnapshot {
            messages: vec![message],
            timestamp: now_ms(),
        })
        .await?;

    emitter.finish().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emitter::RunPhase;
    use tokio::sync::mpsc;

    async fn collect(rx: &mut mpsc::Receiver<agui_core::SseFrame>) -> Vec<serde_json::Value> {
        let mut events = Vec::new();
        while let Some(frame) = rx.recv().await {
            events.push(serde_json::from_str(&frame.data).unwrap());
        }
        events
    }

    #[tokio::test]
    async fn test_sequence_is_snapshot_only() {
        let (tx, mut rx) = mpsc::channel(100);
        let mut emitter = RunEmitter::new(tx, "t1", "r1");
        run(&mut emitter).await.unwrap();
        assert_eq!(emitter.phase(), RunPhase::Finished);
        drop(emitter);

        let events = collect(&mut rx).await;
        let types: Vec<_> = events.iter().map(|e| e["type"].as_str().unwrap()).collect();
        assert_eq!(types, vec!["RUN_STARTED", "MESSAGES_SNAPSHOT", "RUN_FINISHED"]);
    }

    #[tokio::test]
    async fn test_tool_call_arguments_are_complete_json() {
        let (tx, mut rx) = mpsc::channel(100);
        let mut emitter = RunEmitter::new(tx, "t1", "r1");
        run(&mut emitter).await.unwrap();
        drop(emitter);

        let events = collect(&mut rx).await;
        let call = &events[1]["messages"][0]["toolCalls"][0];
        assert_eq!(call["function"]["name"], "generate_haiku");
        let arguments: serde_json::Value =
            serde_json::from_str(call["function"]["arguments"].as_str().unwrap()).unwrap();
        assert_eq!(arguments["english"].as_array().unwrap().len(), 3);
        assert_eq!(arguments["japanese"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_disconnected_client_aborts_without_terminal() {
        let (tx, rx) = mpsc::channel(100);
        drop(rx);
        let mut emitter = RunEmitter::new(tx, "t1", "r1");
        assert!(run(&mut emitter).await.is_err());
        assert_eq!(emitter.phase(), RunPhase::Aborted);
    }
}
