//! Core data types shared by both halves of the protocol.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Message author role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// User message.
    User,
    /// Assistant message.
    Assistant,
    /// System message.
    System,
    /// Tool result message.
    Tool,
}

/// A conversation message.
///
/// Assistant messages may carry tool calls; tool-role messages reference
/// the call they answer via `tool_call_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    /// Create a plain text message.
    pub fn text(id: impl Into<String>, role: Role, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Create a tool-role message answering `tool_call_id`.
    pub fn tool_result(
        id: impl Into<String>,
        tool_call_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            role: Role::Tool,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
        }
    }
}

/// A tool call carried by an assistant message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    /// Always `"function"` in this protocol.
    #[serde(rename = "type")]
    pub call_type: String,
    pub function: FunctionCall,
}

impl ToolCall {
    pub fn function(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            call_type: "function".to_string(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }
}

/// The function name and JSON-encoded argument string of a tool call.
///
/// `arguments` may be assembled incrementally from streamed deltas; it is
/// only guaranteed to be valid JSON once the call's argument stream ends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: String,
}

/// Request body for the streaming producer endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunInput {
    pub thread_id: String,
    pub run_id: String,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub state: Value,
    #[serde(default)]
    pub tools: Vec<ToolDescriptor>,
    #[serde(default)]
    pub context: Vec<Value>,
    #[serde(default)]
    pub forwarded_props: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl RunInput {
    /// Create an input for a fresh run on the given thread.
    pub fn new(thread_id: impl Into<String>, run_id: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            run_id: run_id.into(),
            messages: Vec::new(),
            state: Value::Null,
            tools: Vec::new(),
            context: Vec::new(),
            forwarded_props: Map::new(),
            system_prompt: None,
            model: None,
            temperature: None,
            max_tokens: None,
        }
    }

    /// The role of the most recent message, if any.
    pub fn last_role(&self) -> Option<Role> {
        self.messages.last().map(|m| m.role)
    }
}

/// A tool advertised by either side, with a JSON-Schema parameter shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub capabilities: Vec<String>,
    pub parameters: Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_wire_field_names() {
        let message = Message {
            id: "m1".to_string(),
            role: Role::Assistant,
            content: None,
            tool_calls: Some(vec![ToolCall::function("c1", "get_weather", "{}")]),
            tool_call_id: None,
        };
        let json = serde_json::to_value(&message).unwrap();
        assert!(json.get("toolCalls").is_some());
        assert_eq!(json["toolCalls"][0]["type"], "function");
        assert_eq!(json["toolCalls"][0]["function"]["name"], "get_weather");
        assert!(json.get("content").is_none());
    }

    #[test]
    fn test_tool_result_message_links_call() {
        let message = Message::tool_result("m2", "call-001", "8");
        assert_eq!(message.role, Role::Tool);
        assert_eq!(message.tool_call_id.as_deref(), Some("call-001"));

        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["toolCallId"], "call-001");
    }

    #[test]
    fn test_run_input_defaults() {
        let input: RunInput =
            serde_json::from_str(r#"{"threadId":"t1","runId":"r1"}"#).unwrap();
        assert_eq!(input.thread_id, "t1");
        assert!(input.messages.is_empty());
        assert!(input.state.is_null());
        assert!(input.last_role().is_none());
    }

    #[test]
    fn test_run_input_round_trip() {
        let mut input = RunInput::new("t1", "r1");
        input
            .messages
            .push(Message::text("m1", Role::User, "Hello"));
        input.state = serde_json::json!({"counter": 1});

        let json = serde_json::to_string(&input).unwrap();
        let back: RunInput = serde_json::from_str(&json).unwrap();
        assert_eq!(back.messages.len(), 1);
        assert_eq!(back.last_role(), Some(Role::User));
        assert_eq!(back.state["counter"], 1);
    }

    #[test]
    fn test_role_lowercase_on_wire() {
        assert_eq!(serde_json::to_string(&Role::Assistant).unwrap(), "\"assistant\"");
        let role: Role = serde_json::from_str("\"tool\"").unwrap();
        assert_eq!(role, Role::Tool);
    }

    #[test]
    fn test_tool_descriptor_omits_empty_lists() {
        let tool = ToolDescriptor {
            name: "echo".to_string(),
            description: "Echo input".to_string(),
            tags: vec![],
            capabilities: vec![],
            parameters: serde_json::json!({"type": "object"}),
        };
        let json = serde_json::to_value(&tool).unwrap();
        assert!(json.get("tags").is_none());
        assert!(json.get("capabilities").is_none());
    }
}
