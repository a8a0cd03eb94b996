//! In-memory shared-state store with versioned fan-out.
//!
//! Single writer, many watchers. Every mutation bumps the version by one
//! and publishes an RFC 6902 delta over a broadcast channel. Watchers that
//! fall behind the channel capacity lose the oldest deltas (surfaced to
//! them as a lag notice), never stalling the writer or other watchers.

use agui_core::PatchOp;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio::sync::broadcast;

use crate::error::ServerError;

/// Broadcast capacity per watcher before the oldest delta is dropped.
const WATCHER_QUEUE_CAPACITY: usize = 64;

/// One published mutation.
#[derive(Debug, Clone)]
pub struct StateChange {
    /// Version of the state after this mutation.
    pub version: i64,
    /// Operations that take the previous state to this version.
    pub ops: Vec<PatchOp>,
}

/// A consistent read of the store.
#[derive(Debug, Clone)]
pub struct StateSnapshot {
    pub version: i64,
    pub payload: Value,
}

/// Body of the shared-state mutation endpoint.
#[derive(Debug, Deserialize)]
pub struct MutationRequest {
    pub op: String,
    #[serde(default)]
    pub value: Option<Value>,
}

/// Result of a mutation, echoed to the caller.
#[derive(Debug, Clone)]
pub struct MutationOutcome {
    pub operation: String,
    pub version: i64,
    pub counter: i64,
    pub items_count: usize,
    pub watchers: usize,
}

struct Inner {
    version: i64,
    payload: Value,
    items_created: u64,
}

/// Process-wide shared state with watcher fan-out.
pub struct SharedStateStore {
    inner: Mutex<Inner>,
    tx: broadcast::Sender<StateChange>,
}

impl Default for SharedStateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedStateStore {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(WATCHER_QUEUE_CAPACITY);
        Self {
            inner: Mutex::new(Inner {
                version: 1,
                payload: json!({ "counter": 0, "items": [] }),
                items_created: 0,
            }),
            tx,
        }
    }

    /// A consistent copy of the current state.
    pub fn snapshot(&self) -> StateSnapshot {
        let inner = self.inner.lock();
        StateSnapshot {
            version: inner.version,
            payload: inner.payload.clone(),
        }
    }

    /// Number of live watchers.
    pub fn watcher_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Subscribe and snapshot atomically.
    ///
    /// Holding the lock across both guarantees the watcher sees every
    /// delta with `version > snapshot.version` and nothing earlier.
    pub fn watch(&self) -> (StateSnapshot, broadcast::Receiver<StateChange>) {
        let inner = self.inner.lock();
        let rx = self.tx.subscribe();
        let snapshot = StateSnapshot {
            version: inner.version,
            payload: inner.payload.clone(),
        };
        (snapshot, rx)
    }

    /// Run a serialized mutation, bump the version and publish the delta.
    pub fn update(&self, mutator: impl FnOnce(&mut Value)) -> StateChange {
        let mut inner = self.inner.lock();
        let before = inner.payload.clone();
        mutator(&mut inner.payload);
        inner.version += 1;

        let change = StateChange {
            version: inner.version,
            ops: diff_top_level(&before, &inner.payload),
        };
        // No receivers is fine; the state still advanced.
        let _ = self.tx.send(change.clone());
        change
    }

    /// Apply one of the named mutation operations.
    pub fn apply_operation(
        &self,
        request: &MutationRequest,
    ) -> Result<MutationOutcome, ServerError> {
        let op = request.op.as_str();
        let change = match op {
            "increment_counter" => self.update(|state| bump_counter(state, 1)),
            "decrement_counter" => self.update(|state| bump_counter(state, -1)),
            "reset_counter" => self.update(|state| {
                state["counter"] = json!(0);
            }),
            "add_item" => {
                let value = request.value.clone().unwrap_or(Value::Null);
                let id = {
                    let mut inner = self.inner.lock();
                    inner.items_created += 1;
                    format!("item_{}", inner.items_created)
                };
                self.update(move |state| {
                    let item = json!({ "id": id, "value": value });
                    match state["items"].as_array_mut() {
                        Some(items) => items.push(item),
                        None => state["items"] = json!([item]),
                    }
                })
            }
            "clear_items" => self.update(|state| {
                state["items"] = json!([]);
            }),
            other => return Err(ServerError::UnknownOperation(other.to_string())),
        };

        let snapshot = self.snapshot();
        Ok(MutationOutcome {
            operation: op.to_string(),
            version: change.version,
            counter: snapshot.payload["counter"].as_i64().unwrap_or(0),
            items_count: snapshot.payload["items"]
                .as_array()
                .map(Vec::len)
                .unwrap_or(0),
            watchers: self.watcher_count(),
        })
    }
}

fn bump_counter(state: &mut Value, by: i64) {
    let current = state["counter"].as_i64().unwrap_or(0);
    state["counter"] = json!(current + by);
}

/// RFC 6902 delta of the top-level keys that changed between two objects.
fn diff_top_level(before: &Value, after: &Value) -> Vec<PatchOp> {
    let empty = Map::new();
    let before_map = before.as_object().unwrap_or(&empty);
    let after_map = after.as_object().unwrap_or(&empty);

    let mut ops = Vec::new();
    for (key, value) in after_map {
        match before_map.get(key) {
            Some(previous) if previous == value => {}
            Some(_) => ops.push(PatchOp::replace(format!("/{}", key), value.clone())),
            None => ops.push(PatchOp::add(format!("/{}", key), value.clone())),
        }
    }
    for key in before_map.keys() {
        if !after_map.contains_key(key) {
            ops.push(PatchOp::remove(format!("/{}", key)));
        }
    }
    ops
}

#[cfg(test)]
mod tests {
    use super::*;
    use agui_core::apply_patch;

    fn increment() -> MutationRequest {
        MutationRequest {
            op: "increment_counter".to_string(),
            value: None,
        }
    }

    #[test]
    fn test_initial_state() {
        let store = SharedStateStore::new();
        let snapshot = store.snapshot();
        assert_eq!(snapshot.version, 1);
        assert_eq!(snapshot.payload["counter"], 0);
        assert_eq!(snapshot.payload["items"], json!([]));
    }

    #[test]
    fn test_each_mutation_bumps_version_by_one() {
        let store = SharedStateStore::new();
        let outcome = store.apply_operation(&increment()).unwrap();
        assert_eq!(outcome.version, 2);
        let outcome = store.apply_operation(&increment()).unwrap();
        assert_eq!(outcome.version, 3);
        assert_eq!(outcome.counter, 2);
    }

    #[test]
    fn test_add_item_assigns_sequential_ids() {
        let store = SharedStateStore::new();
        store
            .apply_operation(&MutationRequest {
                op: "add_item".to_string(),
                value: Some(json!("first")),
            })
            .unwrap();
        let outcome = store
            .apply_operation(&MutationRequest {
                op: "add_item".to_string(),
                value: Some(json!("second")),
            })
            .unwrap();
        assert_eq!(outcome.items_count, 2);

        let snapshot = store.snapshot();
        assert_eq!(snapshot.payload["items"][0]["id"], "item_1");
        assert_eq!(snapshot.payload["items"][1]["id"], "item_2");
        assert_eq!(snapshot.payload["items"][1]["value"], "second");
    }

    #[test]
    fn test_clear_items_and_reset_counter() {
        let store = SharedStateStore::new();
        store.apply_operation(&increment()).unwrap();
        store
            .apply_operation(&MutationRequest {
                op: "add_item".to_string(),
                value: None,
            })
            .unwrap();

        let outcome = store
            .apply_operation(&MutationRequest {
                op: "clear_items".to_string(),
                value: None,
            })
            .unwrap();
        assert_eq!(outcome.items_count, 0);

        let outcome = store
            .apply_operation(&MutationRequest {
                op: "reset_counter".to_string(),
                value: None,
            })
            .unwrap();
        assert_eq!(outcome.counter, 0);
    }

    #[test]
    fn test_unknown_operation_rejected() {
        let store = SharedStateStore::new();
        let result = store.apply_operation(&MutationRequest {
            op: "teleport".to_string(),
            value: None,
        });
        assert!(matches!(result, Err(ServerError::UnknownOperation(_))));
    }

    #[tokio::test]
    async fn test_watchers_see_ordered_contiguous_versions() {
        let store = SharedStateStore::new();
        let (snapshot_a, mut rx_a) = store.watch();
        let (snapshot_b, mut rx_b) = store.watch();
        assert_eq!(snapshot_a.version, 1);
        assert_eq!(snapshot_b.version, 1);

        store.apply_operation(&increment()).unwrap();
        store
            .apply_operation(&MutationRequest {
                op: "add_item".to_string(),
                value: None,
            })
            .unwrap();

        for rx in [&mut rx_a, &mut rx_b] {
            let first = rx.recv().await.unwrap();
            let second = rx.recv().await.unwrap();
            assert_eq!(first.version, 2);
            assert_eq!(second.version, 3);
        }
    }

    #[tokio::test]
    async fn test_delta_applied_to_snapshot_matches_next_snapshot() {
        let store = SharedStateStore::new();
        let (snapshot, mut rx) = store.watch();
        let mut state = snapshot.payload;

        store.apply_operation(&increment()).unwrap();
        let change = rx.recv().await.unwrap();
        apply_patch(&mut state, &change.ops).unwrap();

        assert_eq!(state, store.snapshot().payload);
    }

    #[tokio::test]
    async fn test_late_subscriber_sees_only_later_versions() {
        let store = SharedStateStore::new();
        store.apply_operation(&increment()).unwrap();

        let (snapshot, mut rx) = store.watch();
        assert_eq!(snapshot.version, 2);

        store.apply_operation(&increment()).unwrap();
        let change = rx.recv().await.unwrap();
        assert_eq!(change.version, 3);
    }

    #[tokio::test]
    async fn test_slow_watcher_lags_without_blocking_writer() {
        let store = SharedStateStore::new();
        let (_, mut rx) = store.watch();

        for _ in 0..(WATCHER_QUEUE_CAPACITY + 10) {
            store.apply_operation(&increment()).unwrap();
        }

        // The receiver lags rather than the writer stalling; after the lag
        // notice, delivery resumes in order.
        match rx.recv().await {
            Err(broadcast::error::RecvError::Lagged(missed)) => assert!(missed >= 10),
            other => panic!("expected lag, got {:?}", other),
        }
        let next = rx.recv().await.unwrap();
        let after = rx.recv().await.unwrap();
        assert_eq!(after.version, next.version + 1);
    }

    #[test]
    fn test_diff_covers_add_replace_remove() {
        let before = json!({"a": 1, "b": 2});
        let after = json!({"a": 1, "b": 3, "c": 4});
        let ops = diff_top_level(&before, &after);
        assert_eq!(ops.len(), 2);
        assert!(ops.iter().any(|op| op.op == "replace" && op.path == "/b"));
        assert!(ops.iter().any(|op| op.op == "add" && op.path == "/c"));

        let ops = diff_top_level(&json!({"a": 1}), &json!({}));
        assert_eq!(ops, vec![PatchOp::remove("/a")]);
    }

    #[test]
    fn test_watcher_count_tracks_receivers() {
        let store = SharedStateStore::new();
        assert_eq!(store.watcher_count(), 0);
        let (_, rx) = store.watch();
        assert_eq!(store.watcher_count(), 1);
        drop(rx);
        assert_eq!(store.watcher_count(), 0);
    }
}
