//! Agentic generative UI recipe.
//!
//! A ten-step plan published as a STATE_SNAPSHOT, each step flipped to
//! completed by one RFC 6902 STATE_DELTA, then a final authoritative
//! snapshot.

use agui_core::{apply_patch, now_ms, Event, PatchOp, RunInput};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;
use tokio::sync::mpsc;

use super::{run_identity, sse_response, RESPONSE_BUFFER};
use crate::config::RecipeConfig;
use crate::emitter::{Disconnected, RunEmitter};
use crate::state::AppState;

const STEP_DESCRIPTIONS: &[&str] = &[
    "Analyzing the request",
    "Gathering context",
    "Sketching the layout",
    "Selecting components",
    "Wiring data sources",
    "Applying styling",
    "Validating accessibility",
    "Rendering preview",
    "Collecting feedback",
    "Finalizing output",
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

    let steps: Vec<_> = STEP_DESCRIPTIONS
        .iter()
        .map(|description| json!({ "description": description, "status": "pending" }))
        .collect();
    let mut working = json!({ "steps": steps });

    emitter
        .emit(Event::StateSnapshot {
            snapshot: working.clone(),
            timestamp: now_ms(),
        })
        .await?;

    for index in 0..STEP_DESCRIPTIONS.len() {
        emitter.pace(config.step_delay()).await?;

        let op = PatchOp::replace(format!("/steps/{}/status", index), json!("completed"));
        // The working copy tracks what the client should now hold.
        apply_patch(&mut working, std::slice::from_ref(&op))
            .expect("step path exists in working state");

        emitter.emit(Event::state_delta(vec![op])).await?;
    }

    emitter
        .emit(Event::StateSnapshot {
            snapshot: working,
            timestamp: now_ms(),
        })
        .await?;

    emitter.finish().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    async fn collect(rx: &mut mpsc::Receiver<agui_core::SseFrame>) -> Vec<serde_json::Value> {
        let mut events = Vec::new();
        while let Some(frame) = rx.recv().await {
            events.push(serde_json::from_str(&frame.data).unwrap());
        }
        events
    }

    #[tokio::test]
    async fn test_ten_deltas_between_two_snapshots() {
        let (tx, mut rx) = mpsc::channel(100);
        let mut emitter = RunEmitter::new(tx, "t1", "r1");
        run(&mut emitter, &RecipeConfig::instant()).await.unwrap();
        drop(emitter);

        let events = collect(&mut rx).await;
        let types: Vec<_> = events.iter().map(|e| e["type"].as_str().unwrap()).collect();
        assert_eq!(types.iter().filter(|t| **t == "STATE_DELTA").count(), 10);
        assert_eq!(types.first().copied(), Some("RUN_STARTED"));
        assert_eq!(types[1], "STATE_SNAPSHOT");
        assert_eq!(types[types.len() - 2], "STATE_SNAPSHOT");
        assert_eq!(types.last().copied(), Some("RUN_FINISHED"));
    }

    #[tokio::test]
    async fn test_deltas_replay_to_final_snapshot() {
        let (tx, mut rx) = mpsc::channel(100);
        let mut emitter = RunEmitter::new(tx, "t1", "r1");
        run(&mut emitter, &RecipeConfig::instant()).await.unwrap();
        drop(emitter);

        let events = collect(&mut rx).await;
        let mut state = events[1]["snapshot"].clone();
        for event in &events {
            if event["type"] != "STATE_DELTA" {
                continue;
            }
            let ops: Vec<PatchOp> = serde_json::from_value(event["delta"].clone()).unwrap();
            apply_patch(&mut state, &ops).unwrap();
        }
        assert_eq!(state, events[events.len() - 2]["snapshot"]);
    }

    #[tokio::test]
    async fn test_each_delta_targets_the_next_step() {
        let (tx, mut rx) = mpsc::channel(100);
        let mut emitter = RunEmitter::new(tx, "t1", "r1");
        run(&mut emitter, &RecipeConfig::instant()).await.unwrap();
        drop(emitter);

        let events = collect(&mut rx).await;
        let paths: Vec<String> = events
            .iter()
            .filter(|e| e["type"] == "STATE_DELTA")
            .map(|e| e["delta"][0]["path"].as_str().unwrap().to_string())
            .collect();
        for (index, path) in paths.iter().enumerate() {
            assert_eq!(path, &format!("/steps/{}/status", index));
        }
    }
}
