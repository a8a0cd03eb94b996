//! AG-UI protocol event types.
//!
//! Events are serialized with a `type` field in SCREAMING_SNAKE_CASE and
//! camelCase payload fields, as per the AG-UI specification. The union is
//! closed at the dispatcher level; unknown `type` values survive a round
//! trip through [`Event::Unknown`] with their raw JSON intact.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ProtocolError;
use crate::patch::PatchOp;
use crate::types::{Message, Role};

/// Milliseconds since the Unix epoch, for event `timestamp` fields.
pub fn now_ms() -> Option<i64> {
    Some(chrono::Utc::now().timestamp_millis())
}

/// AG-UI protocol events.
///
/// Several payload fields appear under more than one name on the wire
/// (`name`/`toolCallName`/`toolName`, `delta`/`content`). Decoding accepts
/// the union via serde aliases; encoding always emits the canonical name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum Event {
    // ===== Run Lifecycle =====
    /// Run envelope open.
    RunStarted {
        thread_id: String,
        run_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
    },

    /// Run envelope close; terminal.
    RunFinished {
        thread_id: String,
        run_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
    },

    /// Run aborted with an error; terminal.
    RunError {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
    },

    // ===== Text Messages =====
    /// Begins a message of the given role.
    TextMessageStart {
        message_id: String,
        role: Role,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
    },

    /// Append a text delta to an open message.
    TextMessageContent {
        message_id: String,
        #[serde(alias = "content")]
        delta: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
    },

    /// Combined start/content chunk with optional fields.
    TextMessageChunk {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        role: Option<Role>,
        #[serde(default, alias = "content", skip_serializing_if = "Option::is_none")]
        delta: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
    },

    /// Message text complete.
    TextMessageEnd {
        message_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
    },

    // ===== Tool Calls =====
    /// Begins a tool call.
    ToolCallStart {
        tool_call_id: String,
        #[serde(alias = "toolCallName", alias = "toolName")]
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent_message_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
    },

    /// Append to (or replace) the call's JSON argument buffer.
    ///
    /// `delta` (or `chunk`) appends; a full `args` value replaces.
    ToolCallArgs {
        tool_call_id: String,
        #[serde(default, alias = "chunk", skip_serializing_if = "Option::is_none")]
        delta: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        args: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
    },

    /// Combined tool-call chunk with optional fields.
    ToolCallChunk {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tool_call_id: Option<String>,
        #[serde(
            default,
            alias = "toolCallName",
            alias = "toolName",
            skip_serializing_if = "Option::is_none"
        )]
        name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        delta: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
    },

    /// Tool call argument stream complete.
    ToolCallEnd {
        tool_call_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
    },

    /// Tool output for a completed call.
    ToolCallResult {
        tool_call_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message_id: Option<String>,
        #[serde(alias = "content")]
        result: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        role: Option<Role>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
    },

    // ===== Thinking =====
    /// Opaque internal reasoning stream opened.
    ThinkingStart {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
    },

    /// Reasoning delta.
    ThinkingDelta {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message_id: Option<String>,
        #[serde(alias = "content")]
        delta: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
    },

    /// Reasoning content (alternate spelling used by some producers).
    ThinkingContent {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message_id: Option<String>,
        #[serde(alias = "content")]
        delta: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
    },

    /// Reasoning stream closed.
    ThinkingEnd {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
    },

    // ===== Snapshots and State =====
    /// Authoritative conversation state for the thread.
    MessagesSnapshot {
        messages: Vec<Message>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
    },

    /// Full state replacement.
    StateSnapshot {
        #[serde(alias = "state")]
        snapshot: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
    },

    /// Incremental state update.
    ///
    /// `delta` carries either an RFC 6902 array or a shallow object merge
    /// (optionally scoped by `path`); predictive producers use `patches`
    /// plus the prediction markers instead.
    StateDelta {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        delta: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        patches: Option<Vec<PatchOp>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        version: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        predictive: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        corrective: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        confirmed: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        prediction_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
    },

    // ===== Presentation and Extension =====
    /// Advisory presentation-layer hint.
    UiUpdate {
        update_type: String,
        #[serde(flatten)]
        fields: Map<String, Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
    },

    /// Extension point (e.g. `PredictState`).
    Custom {
        name: String,
        #[serde(alias = "data")]
        value: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
    },

    // ===== Telemetry =====
    /// Error telemetry within a run.
    Error {
        message: String,
        #[serde(flatten)]
        fields: Map<String, Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
    },

    /// Warning telemetry within a run.
    Warning {
        message: String,
        #[serde(flatten)]
        fields: Map<String, Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
    },

    /// Informational telemetry within a run.
    Info {
        message: String,
        #[serde(flatten)]
        fields: Map<String, Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
    },

    /// Debug telemetry within a run.
    Debug {
        message: String,
        #[serde(flatten)]
        fields: Map<String, Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
    },

    // ===== Steps and Liveness =====
    /// Multi-step progress marker: step opened.
    StepStarted {
        #[serde(alias = "stepName")]
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
    },

    /// Multi-step progress marker: step closed.
    StepFinished {
        #[serde(alias = "stepName")]
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
    },

    /// Liveness marker.
    Heartbeat {
        #[serde(flatten)]
        fields: Map<String, Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
    },

    /// Session metadata changed.
    SessionUpdate {
        #[serde(flatten)]
        fields: Map<String, Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
    },

    /// Run status metadata.
    StatusUpdate {
        #[serde(flatten)]
        fields: Map<String, Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
    },

    /// Catch-all for event types this build does not know.
    ///
    /// Never produced by serde directly; [`Event::decode`] constructs it so
    /// the raw JSON can pass through to renderers untouched.
    #[serde(skip)]
    Unknown { event_type: String, raw: Value },
}

impl Event {
    /// Decode a JSON event payload.
    ///
    /// Unknown or malformed-but-typed events come back as
    /// [`Event::Unknown`]; only non-JSON input is an error.
    pub fn decode(data: &[u8]) -> Result<Event, ProtocolError> {
        let value: Value = serde_json::from_slice(data)?;
        let event_type = value
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        match serde_json::from_value::<Event>(value.clone()) {
            Ok(event) => Ok(event),
            Err(err) => {
                tracing::debug!(%event_type, %err, "passing event through as unknown");
                Ok(Event::Unknown {
                    event_type,
                    raw: value,
                })
            }
        }
    }

    /// Encode this event as a single JSON object.
    ///
    /// Unknown events re-emit their preserved raw JSON.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        match self {
            Event::Unknown { raw, .. } => Ok(serde_json::to_vec(raw)?),
            other => Ok(serde_json::to_vec(other)?),
        }
    }

    /// A plain RFC 6902 state delta.
    pub fn state_delta(ops: Vec<PatchOp>) -> Self {
        Self::versioned_delta(ops, None)
    }

    /// An RFC 6902 state delta tagged with a fan-out version.
    pub fn state_delta_versioned(version: i64, ops: Vec<PatchOp>) -> Self {
        Self::versioned_delta(ops, Some(version))
    }

    fn versioned_delta(ops: Vec<PatchOp>, version: Option<i64>) -> Self {
        Event::StateDelta {
            delta: Some(serde_json::to_value(ops).expect("patch ops serialize")),
            patches: None,
            path: None,
            version,
            predictive: None,
            corrective: None,
            confirmed: None,
            prediction_id: None,
            timestamp: now_ms(),
        }
    }

    /// The wire name of this event's `type` field.
    pub fn event_type(&self) -> &str {
        match self {
            Event::RunStarted { .. } => "RUN_STARTED",
            Event::RunFinished { .. } => "RUN_FINISHED",
            Event::RunError { .. } => "RUN_ERROR",
            Event::TextMessageStart { .. } => "TEXT_MESSAGE_START",
            Event::TextMessageContent { .. } => "TEXT_MESSAGE_CONTENT",
            Event::TextMessageChunk { .. } => "TEXT_MESSAGE_CHUNK",
            Event::TextMessageEnd { .. } => "TEXT_MESSAGE_END",
            Event::ToolCallStart { .. } => "TOOL_CALL_START",
            Event::ToolCallArgs { .. } => "TOOL_CALL_ARGS",
            Event::ToolCallChunk { .. } => "TOOL_CALL_CHUNK",
            Event::ToolCallEnd { .. } => "TOOL_CALL_END",
            Event::ToolCallResult { .. } => "TOOL_CALL_RESULT",
            Event::ThinkingStart { .. } => "THINKING_START",
            Event::ThinkingDelta { .. } => "THINKING_DELTA",
            Event::ThinkingContent { .. } => "THINKING_CONTENT",
            Event::ThinkingEnd { .. } => "THINKING_END",
            Event::MessagesSnapshot { .. } => "MESSAGES_SNAPSHOT",
            Event::StateSnapshot { .. } => "STATE_SNAPSHOT",
            Event::StateDelta { .. } => "STATE_DELTA",
            Event::UiUpdate { .. } => "UI_UPDATE",
            Event::Custom { .. } => "CUSTOM",
            Event::Error { .. } => "ERROR",
            Event::Warning { .. } => "WARNING",
            Event::Info { .. } => "INFO",
            Event::Debug { .. } => "DEBUG",
            Event::StepStarted { .. } => "STEP_STARTED",
            Event::StepFinished { .. } => "STEP_FINISHED",
            Event::Heartbeat { .. } => "HEARTBEAT",
            Event::SessionUpdate { .. } => "SESSION_UPDATE",
            Event::StatusUpdate { .. } => "STATUS_UPDATE",
            Event::Unknown { event_type, .. } => event_type,
        }
    }

    /// Whether this event terminates a run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Event::RunFinished { .. } | Event::RunError { .. })
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
