//! Shared-state subscription and mutation endpoints.
//!
//! GET opens a long-lived SSE subscription: one STATE_SNAPSHOT, then every
//! store delta in version order until the client disconnects, with a named
//! `keepalive` frame on an interval. POST applies one mutation operation
//! and answers with the resulting store summary.

use std::time::Duration;

use agui_core::{now_ms, Event, SseFrame};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;

use super::{sse_response, RESPONSE_BUFFER};
use crate::error::ServerError;
use crate::shared_state::{MutationRequest, StateChange};
use crate::state::AppState;

/// Cadence of automatic demo mutations when `?demo=true`.
const DEMO_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Deserialize)]
pub struct SubscribeQuery {
    /// Client identifier echoed in keepalive frames.
    #[serde(default)]
    pub cid: Option<String>,
    /// Drive periodic demo mutations for this subscriber.
    #[serde(default)]
    pub demo: bool,
}

pub async fn subscribe_handler(
    State(state): State<AppState>,
    Query(query): Query<SubscribeQuery>,
) -> impl IntoResponse {
    let (tx, rx) = mpsc::channel(RESPONSE_BUFFER);
    let cid = query
        .cid
        .unwrap_or_else(|| format!("cid-{}", uuid::Uuid::new_v4()));
    let demo = query.demo;
    let keepalive = state.config.keepalive_interval();

    tokio::spawn(async move {
        let _ = forward(state, tx, cid, demo, keepalive).await;
    });

    sse_response(rx)
}

async fn forward(
    state: AppState,
    tx: mpsc::Sender<SseFrame>,
    cid: String,
    demo: bool,
    keepalive: Duration,
) -> Result<(), ()> {
    let (snapshot, mut changes) = state.shared.watch();

    send_event(
        &tx,
        Event::StateSnapshot {
            snapshot: snapshot.payload,
            timestamp: now_ms(),
        },
    )
    .await?;

    let mut keepalive_timer = tokio::time::interval(keepalive);
    keepalive_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    keepalive_timer.reset();

    let mut demo_timer = tokio::time::interval(DEMO_INTERVAL);
    demo_timer.reset();

    let mut sequence: u64 = 0;

    loop {
        tokio::select! {
            change = changes.recv() => match change {
                Ok(change) => send_event(&tx, delta_event(change)).await?,
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(%cid, missed, "shared-state watcher lagged");
                    send_event(&tx, lag_warning(missed)).await?;
                }
                Err(RecvError::Closed) => return Ok(()),
            },
            _ = keepalive_timer.tick() => {
                sequence += 1;
                let payload = json!({
                    "type": "keepalive",
                    "timestamp": chrono::Utc::now().to_rfc3339(),
                    "sequence": sequence,
                    "cid": cid,
                });
                if tx
                    .send(SseFrame::named("keepalive", payload.to_string()))
                    .await
                    .is_err()
                {
                    return Err(());
                }
            }
            _ = demo_timer.tick(), if demo => {
                let _ = state.shared.apply_operation(&MutationRequest {
                    op: "increment_counter".to_string(),
                    value: None,
                });
            }
            _ = tx.closed() => return Ok(()),
        }
    }
}

fn delta_event(change: StateChange) -> Event {
    Event::state_delta_versioned(change.version, change.ops)
}

fn lag_warning(missed: u64) -> Event {
    let mut fields = serde_json::Map::new();
    fields.insert("dropped".to_string(), json!(missed));
    Event::Warning {
        message: "subscriber lagged; oldest deltas dropped".to_string(),
        fields,
        timestamp: now_ms(),
    }
}

async fn send_event(tx: &mpsc::Sender<SseFrame>, event: Event) -> Result<(), ()> {
    let data = match event.encode() {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(_) => return Ok(()),
    };
    tx.send(SseFrame::data(data)).await.map_err(|_| ())
}

/// Apply one mutation op and echo the resulting store summary.
pub async fn mutate_handler(
    State(state): State<AppState>,
    Json(request): Json<MutationRequest>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let outcome = state.shared.apply_operation(&request)?;
    Ok(Json(json!({
        "success": true,
        "operation": outcome.operation,
        "state": {
            "version": outcome.version,
            "counter": outcome.counter,
            "items_count": outcome.items_count,
            "watchers": outcome.watchers,
        },
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RecipeConfig;
    use agui_core::SseFrame;

    fn state() -> AppState {
        AppState::new(RecipeConfig::instant())
    }

    fn increment() -> MutationRequest {
        MutationRequest {
            op: "increment_counter".to_string(),
            value: None,
        }
    }

    #[tokio::test]
    async fn test_forward_opens_with_snapshot_then_deltas() {
        let state = state();
        let shared = state.shared.clone();
        let (tx, mut rx) = mpsc::channel::<SseFrame>(100);

        let handle = tokio::spawn(forward(
            state,
            tx,
            "cid-test".to_string(),
            false,
            Duration::from_secs(600),
        ));

        let snapshot: serde_json::Value =
            serde_json::from_str(&rx.recv().await.unwrap().data).unwrap();
        assert_eq!(snapshot["type"], "STATE_SNAPSHOT");
        assert_eq!(snapshot["snapshot"]["counter"], 0);

        shared.apply_operation(&increment()).unwrap();
        shared.apply_operation(&increment()).unwrap();

        let first: serde_json::Value =
            serde_json::from_str(&rx.recv().await.unwrap().data).unwrap();
        let second: serde_json::Value =
            serde_json::from_str(&rx.recv().await.unwrap().data).unwrap();
        assert_eq!(first["type"], "STATE_DELTA");
        assert_eq!(first["version"], 2);
        assert_eq!(second["version"], 3);

        drop(rx);
        handle.await.unwrap().ok();
    }

    #[tokio::test]
    async fn test_forward_emits_named_keepalive_frames() {
        let state = state();
        let (tx, mut rx) = mpsc::channel::<SseFrame>(100);

        let handle = tokio::spawn(forward(
            state,
            tx,
            "cid-keepalive".to_string(),
            false,
            Duration::from_millis(25),
        ));

        // Snapshot first, then the keepalive tick.
        let _snapshot = rx.recv().await.unwrap();
        let keepalive = rx.recv().await.unwrap();
        assert_eq!(keepalive.event.as_deref(), Some("keepalive"));

        let payload: serde_json::Value = serde_json::from_str(&keepalive.data).unwrap();
        assert_eq!(payload["type"], "keepalive");
        assert_eq!(payload["cid"], "cid-keepalive");
        assert_eq!(payload["sequence"], 1);

        let second: serde_json::Value =
            serde_json::from_str(&rx.recv().await.unwrap().data).unwrap();
        assert_eq!(second["sequence"], 2);

        drop(rx);
        handle.await.unwrap().ok();
    }

    #[tokio::test]
    async fn test_forward_stops_when_subscriber_drops() {
        let state = state();
        let (tx, rx) = mpsc::channel::<SseFrame>(100);
        drop(rx);

        let result = forward(
            state,
            tx,
            "cid-gone".to_string(),
            false,
            Duration::from_secs(600),
        )
        .await;
        assert!(result.is_err());
    }
}
