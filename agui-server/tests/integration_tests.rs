//! Integration tests for agui-server.
//!
//! These drive the full router→recipe→SSE flow with instant pacing and
//! assert on the decoded event sequences.

use agui_server::{AguiRouter, RecipeConfig, SharedStateStore};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use futures::StreamExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn test_router() -> axum::Router {
    AguiRouter::new()
        .with_config(RecipeConfig::instant())
        .build()
}

fn run_request(path: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(path)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn run_input(messages: Value) -> Value {
    json!({
        "threadId": "thread-test",
        "runId": "run-test",
        "messages": messages,
        "state": {},
        "tools": [],
        "context": [],
        "forwardedProps": {}
    })
}

/// Collect the `data:` payloads of every SSE frame in a finished response.
async fn collect_sse_events(body: Body) -> Vec<String> {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    let text = String::from_utf8_lossy(&bytes);
    text.lines()
        .filter(|line| line.starts_with("data: "))
        .map(|line| line.strip_prefix("data: ").unwrap().to_string())
        .collect()
}

fn extract_event_types(events: &[String]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| {
            serde_json::from_str::<Value>(e)
                .ok()
                .and_then(|v| v.get("type").and_then(|t| t.as_str().map(String::from)))
        })
        .collect()
}

// ============================================================================
// Recipe Sequences
// ============================================================================

#[tokio::test]
async fn test_tool_based_generative_ui_sequence() {
    let response = test_router()
        .oneshot(run_request(
            "/tool_based_generative_ui",
            run_input(json!([{ "id": "u1", "role": "user", "content": "Hello" }])),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"],
        "text/event-stream"
    );

    let events = collect_sse_events(response.into_body()).await;
    let types = extract_event_types(&events);
    assert_eq!(types, vec!["RUN_STARTED", "MESSAGES_SNAPSHOT", "RUN_FINISHED"]);

    // The snapshot carries one assistant message with a complete haiku call.
    let snapshot: Value = serde_json::from_str(&events[1]).unwrap();
    let call = &snapshot["messages"][0]["toolCalls"][0];
    assert_eq!(call["function"]["name"], "generate_haiku");
    let arguments: Value =
        serde_json::from_str(call["function"]["arguments"].as_str().unwrap()).unwrap();
    assert_eq!(arguments["japanese"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_agentic_chat_sequence() {
    let response = test_router()
        .oneshot(run_request(
            "/agentic_chat",
            run_input(json!([{ "id": "u1", "role": "user", "content": "Weather?" }])),
        ))
        .await
        .unwrap();

    let events = collect_sse_events(response.into_body()).await;
    let types = extract_event_types(&events);

    assert_eq!(types.first().map(String::as_str), Some("RUN_STARTED"));
    assert_eq!(types.last().map(String::as_str), Some("RUN_FINISHED"));
    assert_eq!(types.iter().filter(|t| *t == "TEXT_MESSAGE_START").count(), 2);
    assert_eq!(types.iter().filter(|t| *t == "TOOL_CALL_START").count(), 1);

    // Tool args arrive as one valid JSON delta.
    let args_event: Value = events
        .iter()
        .map(|e| serde_json::from_str::<Value>(e).unwrap())
        .find(|v| v["type"] == "TOOL_CALL_ARGS")
        .unwrap();
    let args: Value = serde_json::from_str(args_event["delta"].as_str().unwrap()).unwrap();
    assert_eq!(args["location"], "San Francisco");
}

#[tokio::test]
async fn test_agentic_generative_ui_sequence() {
    let response = test_router()
        .oneshot(run_request("/agentic_generative_ui", run_input(json!([]))))
        .await
        .unwrap();

    let events = collect_sse_events(response.into_body()).await;
    let types = extract_event_types(&events);

    assert_eq!(types.iter().filter(|t| *t == "STATE_SNAPSHOT").count(), 2);
    assert_eq!(types.iter().filter(|t| *t == "STATE_DELTA").count(), 10);

    // First snapshot is all-pending, last is all-completed.
    let first: Value = serde_json::from_str(&events[1]).unwrap();
    let last: Value = serde_json::from_str(&events[events.len() - 2]).unwrap();
    assert!(first["snapshot"]["steps"]
        .as_array()
        .unwrap()
        .iter()
        .all(|s| s["status"] == "pending"));
    assert!(last["snapshot"]["steps"]
        .as_array()
        .unwrap()
        .iter()
        .all(|s| s["status"] == "completed"));
}

#[tokio::test]
async fn test_human_in_the_loop_user_branch_streams_valid_step_json() {
    let response = test_router()
        .oneshot(run_request(
            "/human_in_the_loop",
            run_input(json!([{ "id": "u1", "role": "user", "content": "Plan it" }])),
        ))
        .await
        .unwrap();

    let events = collect_sse_events(response.into_body()).await;
    let parsed: Vec<Value> = events
        .iter()
        .map(|e| serde_json::from_str(e).unwrap())
        .collect();

    assert_eq!(
        parsed
            .iter()
            .filter(|v| v["type"] == "TOOL_CALL_START")
            .count(),
        1
    );
    assert_eq!(
        parsed[1]["name"], "generate_task_steps",
        "tool call starts right after RUN_STARTED"
    );

    // Concatenated argument deltas must form one valid JSON object.
    let buffer: String = parsed
        .iter()
        .filter(|v| v["type"] == "TOOL_CALL_ARGS")
        .map(|v| v["delta"].as_str().unwrap().to_string())
        .collect();
    let arguments: Value = serde_json::from_str(&buffer).unwrap();
    let steps = arguments["steps"].as_array().unwrap();
    assert_eq!(steps.len(), 10);
    assert_eq!(steps[0]["step"], 1);
    assert_eq!(steps[9]["step"], 10);
}

#[tokio::test]
async fn test_human_in_the_loop_tool_branch_is_text_only() {
    let response = test_router()
        .oneshot(run_request(
            "/human_in_the_loop",
            run_input(json!([
                { "id": "u1", "role": "user", "content": "Plan it" },
                { "id": "t1", "role": "tool", "content": "approved", "toolCallId": "c1" }
            ])),
        ))
        .await
        .unwrap();

    let events = collect_sse_events(response.into_body()).await;
    let types = extract_event_types(&events);
    assert!(types.contains(&"TEXT_MESSAGE_START".to_string()));
    assert!(!types.contains(&"TOOL_CALL_START".to_string()));
    assert_eq!(types.last().map(String::as_str), Some("RUN_FINISHED"));
}

#[tokio::test]
async fn test_human_in_the_loop_empty_messages_is_400() {
    let response = test_router()
        .oneshot(run_request("/human_in_the_loop", run_input(json!([]))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["code"], 400);
}

#[tokio::test]
async fn test_predictive_sequence_ends_with_completion_frame() {
    let config = RecipeConfig {
        predictive_correct_ratio: 0.0, // force the corrective path
        ..RecipeConfig::instant()
    };
    let router = AguiRouter::new().with_config(config).build();

    let response = router
        .oneshot(run_request("/predictive_state_updates", run_input(json!([]))))
        .await
        .unwrap();

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8_lossy(&bytes);
    assert!(text.contains("event: completion"));

    let events: Vec<Value> = text
        .lines()
        .filter_map(|line| line.strip_prefix("data: "))
        .map(|data| serde_json::from_str(data).unwrap())
        .collect();

    let corrective = events
        .iter()
        .find(|v| v["corrective"] == true)
        .expect("corrective delta present");
    assert_eq!(corrective["type"], "STATE_DELTA");
    assert!(corrective["patches"].is_array());

    // Final snapshot matches the corrective outcome from the scenario.
    let final_snapshot = events
        .iter()
        .filter(|v| v["type"] == "STATE_SNAPSHOT")
        .next_back()
        .unwrap();
    assert_eq!(final_snapshot["snapshot"]["counter"], 5);
    assert_eq!(final_snapshot["snapshot"]["version"], 2);

    let completion = events
        .iter()
        .find(|v| v["type"] == "predictive_sequence_complete")
        .unwrap();
    assert_eq!(completion["correct"], false);
}

#[tokio::test]
async fn test_predictive_confirmed_path_has_empty_patches() {
    let config = RecipeConfig {
        predictive_correct_ratio: 1.0,
        ..RecipeConfig::instant()
    };
    let router = AguiRouter::new().with_config(config).build();

    let response = router
        .oneshot(run_request("/predictive_state_updates", run_input(json!([]))))
        .await
        .unwrap();
    let events = collect_sse_events(response.into_body()).await;
    let parsed: Vec<Value> = events
        .iter()
        .map(|e| serde_json::from_str(e).unwrap())
        .collect();

    let confirmed = parsed
        .iter()
        .find(|v| v["confirmed"] == true)
        .expect("confirming delta present");
    assert_eq!(confirmed["patches"].as_array().unwrap().len(), 0);

    let final_snapshot = parsed
        .iter()
        .filter(|v| v["type"] == "STATE_SNAPSHOT")
        .next_back()
        .unwrap();
    assert_eq!(final_snapshot["snapshot"]["counter"], 3);
}

// ============================================================================
// Shared State Endpoints
// ============================================================================

#[tokio::test]
async fn test_shared_state_mutation_response_shape() {
    let store = Arc::new(SharedStateStore::new());
    let router = AguiRouter::new().with_shared_store(store).build();

    let response = router
        .oneshot(run_request(
            "/shared_state",
            json!({ "op": "increment_counter" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["operation"], "increment_counter");
    assert_eq!(body["state"]["version"], 2);
    assert_eq!(body["state"]["counter"], 1);
    assert_eq!(body["state"]["items_count"], 0);
}

#[tokio::test]
async fn test_shared_state_unknown_op_is_400() {
    let response = test_router()
        .oneshot(run_request("/shared_state", json!({ "op": "explode" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_shared_state_subscription_opens_with_snapshot() {
    let store = Arc::new(SharedStateStore::new());
    store
        .apply_operation(&agui_server::MutationRequest {
            op: "increment_counter".to_string(),
            value: None,
        })
        .unwrap();
    let router = AguiRouter::new().with_shared_store(store).build();

    let request = Request::builder()
        .method("GET")
        .uri("/shared_state?cid=test-client")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // The stream never ends; read only the first chunk.
    let mut stream = response.into_body().into_data_stream();
    let first = stream.next().await.unwrap().unwrap();
    let text = String::from_utf8_lossy(&first);
    assert!(text.contains("STATE_SNAPSHOT"));
    assert!(text.contains("\"counter\":1"));
}

// ============================================================================
// Tools Endpoint
// ============================================================================

#[tokio::test]
async fn test_tools_listing() {
    let request = Request::builder()
        .method("GET")
        .uri("/tools")
        .body(Body::empty())
        .unwrap();
    let response = test_router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    let tools = body["tools"].as_array().unwrap();
    assert!(tools.iter().any(|t| t["name"] == "generate_haiku"));
    assert!(tools.iter().all(|t| t["parameters"]["type"] == "object"));
}

#[tokio::test]
async fn test_nested_router() {
    let router = AguiRouter::new()
        .with_config(RecipeConfig::instant())
        .build_nested("/api")
        .unwrap();
    let request = Request::builder()
        .method("GET")
        .uri("/api/tools")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
