//! Predictive state updates recipe.
//!
//! The server publishes a predicted delta immediately, simulates the real
//! work, then either confirms the prediction or corrects it, and closes
//! with an authoritative snapshot plus a named `completion` frame.

use agui_core::{apply_patch, now_ms, Event, PatchOp, RunInput, SseFrame};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use rand::Rng;
use serde_json::json;
use tokio::sync::mpsc;

use super::{run_identity, sse_response, RESPONSE_BUFFER};
use crate::config::RecipeConfig;
use crate::emitter::{Disconnected, RunEmitter};
use crate::state::AppState;

pub async fn handler(
    State(state): State<AppState>,
    Json(input): Json<RunInput>,
) -> impl IntoResponse {
    let (thread_id, run_id) = run_identity(&input.thread_id, &input.run_id);
    let (tx, rx) = mpsc::channel(RESPONSE_BUFFER);
    let config = state.config.clone();

    tokio::spawn(async move {
        let mut emitter = RunEmitter::new(tx, thread_id, run_id);
        let correct = rand::thread_rng().gen_bool(config.predictive_correct_ratio.clamp(0.0, 1.0));
        let _ = run(&mut emitter, &config, correct).await;
    });

    sse_response(rx)
}

async fn run(
    emitter: &mut RunEmitter,
    config: &RecipeConfig,
    correct: bool,
) -> Result<(), Disconnected> {
    emitter.start().await?;

    let prediction_id = format!("pred-{}", uuid::Uuid::new_v4());
    let base = json!({ "counter": 0, "items": [], "version": 1 });

    // Advisory hint that the following deltas are speculative; UI layers
    // keyed on PredictState may switch to predictive document mode.
    emitter
        .emit(Event::Custom {
            name: "PredictState".to_string(),
            value: json!([{ "state_key": "counter", "tool": "update_counter" }]),
            timestamp: now_ms(),
        })
        .await?;

    emitter
        .emit(Event::StateSnapshot {
            snapshot: base.clone(),
            timestamp: now_ms(),
        })
        .await?;

    let predicted_ops = vec![
        PatchOp::replace("/counter", json!(3)),
        PatchOp::replace("/version", json!(2)),
        PatchOp::add("/items/-", json!({ "id": "item_1", "predicted": true })),
    ];
    emitter
        .emit(prediction_delta(
            &prediction_id,
            predicted_ops.clone(),
            Marker::Predictive,
        ))
        .await?;

    // Simulated processing while the client renders the prediction.
    emitter.pace(config.processing_delay()).await?;

    let mut actual = base;
    if correct {
        apply_patch(&mut actual, &predicted_ops).expect("prediction applies to base state");
        emitter
            .emit(prediction_delta(&prediction_id, vec![], Marker::Confirmed))
            .await?;
    } else {
        let corrective_ops = vec![
            PatchOp::replace("/counter", json!(5)),
            PatchOp::replace("/version", json!(2)),
            PatchOp::replace("/items", json!([{ "id": "item_1", "predicted": false }])),
        ];
        apply_patch(&mut actual, &corrective_ops).expect("correction applies to base state");
        emitter
            .emit(prediction_delta(
                &prediction_id,
                corrective_ops,
                Marker::Corrective,
            ))
            .await?;
    }

    emitter
        .emit(Event::StateSnapshot {
            snapshot: actual,
            timestamp: now_ms(),
        })
        .await?;

    emitter.finish().await?;

    // Named terminal frame so UI layers can key on the sequence outcome.
    let completion = json!({
        "type": "predictive_sequence_complete",
        "predictionId": prediction_id,
        "correct": correct,
    });
    emitter
        .frame(SseFrame::named("completion", completion.to_string()))
        .await
}

enum Marker {
    Predictive,
    Confirmed,
    Corrective,
}

fn prediction_delta(prediction_id: &str, ops: Vec<PatchOp>, marker: Marker) -> Event {
    let (predictive, confirmed, corrective) = match marker {
        Marker::Predictive => (Some(true), None, None),
        Marker::Confirmed => (None, Some(true), None),
        Marker::Corrective => (None, None, Some(true)),
    };
    Event::StateDelta {
        delta: None,
        patches: Some(ops),
        path: None,
        version: None,
        predictive,
        corrective,
        confirmed,
        prediction_id: Some(prediction_id.to_string()),
        timestamp: now_ms(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    async fn collect_frames(
        rx: &mut mpsc::Receiver<SseFrame>,
    ) -> Vec<(Option<String>, serde_json::Value)> {
        let mut frames = Vec::new();
        while let Some(frame) = rx.recv().await {
            frames.push((frame.event.clone(), serde_json::from_str(&frame.data).unwrap()));
        }
        frames
    }

    #[tokio::test]
    async fn test_confirmed_path_final_state_is_prediction() {
        let (tx, mut rx) = mpsc::channel(100);
        let mut emitter = RunEmitter::new(tx, "t1", "r1");
        run(&mut emitter, &RecipeConfig::instant(), true).await.unwrap();
        drop(emitter);

        let frames = collect_frames(&mut rx).await;
        let confirming = frames
            .iter()
            .find(|(_, v)| v["confirmed"] == true)
            .expect("confirming delta");
        assert_eq!(confirming.1["patches"].as_array().unwrap().len(), 0);

        let last_snapshot = frames
            .iter()
            .filter(|(_, v)| v["type"] == "STATE_SNAPSHOT")
            .next_back()
            .unwrap();
        assert_eq!(last_snapshot.1["snapshot"]["counter"], 3);
        assert_eq!(last_snapshot.1["snapshot"]["items"][0]["predicted"], true);
    }

    #[tokio::test]
    async fn test_corrective_path_overrides_prediction() {
        let (tx, mut rx) = mpsc::channel(100);
        let mut emitter = RunEmitter::new(tx, "t1", "r1");
        run(&mut emitter, &RecipeConfig::instant(), false).await.unwrap();
        drop(emitter);

        let frames = collect_frames(&mut rx).await;
        let last_snapshot = frames
            .iter()
            .filter(|(_, v)| v["type"] == "STATE_SNAPSHOT")
            .next_back()
            .unwrap();
        assert_eq!(last_snapshot.1["snapshot"]["counter"], 5);
        assert_eq!(last_snapshot.1["snapshot"]["items"][0]["predicted"], false);
    }

    #[tokio::test]
    async fn test_completion_frame_is_last_and_named() {
        let (tx, mut rx) = mpsc::channel(100);
        let mut emitter = RunEmitter::new(tx, "t1", "r1");
        run(&mut emitter, &RecipeConfig::instant(), true).await.unwrap();
        drop(emitter);

        let frames = collect_frames(&mut rx).await;
        let (event, payload) = frames.last().unwrap();
        assert_eq!(event.as_deref(), Some("completion"));
        assert_eq!(payload["type"], "predictive_sequence_complete");
        assert_eq!(payload["correct"], true);
        assert!(payload["predictionId"].as_str().unwrap().starts_with("pred-"));
    }

    #[tokio::test]
    async fn test_predict_state_hint_precedes_first_snapshot() {
        let (tx, mut rx) = mpsc::channel(100);
        let mut emitter = RunEmitter::new(tx, "t1", "r1");
        run(&mut emitter, &RecipeConfig::instant(), true).await.unwrap();
        drop(emitter);

        let frames = collect_frames(&mut rx).await;
        let custom = frames
            .iter()
            .position(|(_, v)| v["type"] == "CUSTOM" && v["name"] == "PredictState")
            .expect("PredictState hint");
        let snapshot = frames
            .iter()
            .position(|(_, v)| v["type"] == "STATE_SNAPSHOT")
            .unwrap();
        assert!(custom < snapshot);
    }
}
