//! Event renderers.
//!
//! The consumer pipeline hands every dispatched event to a [`Renderer`].
//! Renderers are side-effect-only: they may print, they must never touch
//! pipeline state. Two built-ins exist: JSON lines and pretty terminal
//! output.

use std::io::Write;

use serde_json::Value;

/// External event sink.
pub trait Renderer: Send + Sync {
    /// Handle one dispatched event.
    ///
    /// `event_type` is the wire name (`RUN_STARTED`, ...); `json` is the
    /// full encoded event.
    fn handle_event(&self, event_type: &str, json: &[u8]);
}

/// One JSON event per line, unmodified.
pub struct JsonRenderer;

impl Renderer for JsonRenderer {
    fn handle_event(&self, _event_type: &str, json: &[u8]) {
        println!("{}", String::from_utf8_lossy(json));
    }
}

/// Pretty terminal output.
///
/// Text deltas stream in place; lifecycle and tool events get dim
/// one-line gutter markers.
pub struct TextRenderer;

impl TextRenderer {
    fn field<'a>(value: &'a Value, names: &[&str]) -> Option<&'a str> {
        names.iter().find_map(|name| value.get(name)?.as_str())
    }
}

impl Renderer for TextRenderer {
    fn handle_event(&self, event_type: &str, json: &[u8]) {
        let value: Value = match serde_json::from_slice(json) {
            Ok(value) => value,
            Err(_) => {
                println!("{}", String::from_utf8_lossy(json));
                return;
            }
        };

        match event_type {
            "RUN_STARTED" => {
                println!(
                    "\x1b[2m│ run {} started\x1b[0m",
                    value["runId"].as_str().unwrap_or("?")
                );
            }
            "RUN_FINISHED" => {
                println!("\x1b[2m│ run finished\x1b[0m");
            }
            "RUN_ERROR" | "ERROR" => {
                println!(
                    "\x1b[31m│ error: {}\x1b[0m",
                    value["message"].as_str().unwrap_or("unknown")
                );
            }
            "WARNING" => {
                println!(
                    "\x1b[33m│ warning: {}\x1b[0m",
                    value["message"].as_str().unwrap_or("")
                );
            }
            "INFO" | "DEBUG" | "STATUS_UPDATE" | "SESSION_UPDATE" => {
                println!(
                    "\x1b[2m│ {}\x1b[0m",
                    value["message"].as_str().unwrap_or(event_type)
                );
            }
            "TEXT_MESSAGE_START" => {}
            "TEXT_MESSAGE_CONTENT" | "TEXT_MESSAGE_CHUNK" => {
                if let Some(delta) = Self::field(&value, &["delta", "content"]) {
                    print!("{}", delta);
                    let _ = std::io::stdout().flush();
                }
            }
            "TEXT_MESSAGE_END" => {
                println!();
            }
            "THINKING_START" => {
                println!("\x1b[2m│ thinking…\x1b[0m");
            }
            "THINKING_DELTA" | "THINKING_CONTENT" | "THINKING_END" => {}
            "TOOL_CALL_START" => {
                let name = Self::field(&value, &["name", "toolCallName", "toolName"])
                    .unwrap_or("unknown tool");
                println!("\x1b[2m│ ⚙ {}\x1b[0m", name);
            }
            "TOOL_CALL_ARGS" | "TOOL_CALL_CHUNK" | "TOOL_CALL_END" => {}
            "TOOL_CALL_RESULT" => {
                println!(
                    "\x1b[2m│ ⚙ result: {}\x1b[0m",
                    value.get("result").or_else(|| value.get("content")).unwrap_or(&Value::Null)
                );
            }
            "STATE_SNAPSHOT" => {
                println!(
                    "\x1b[2m│ state: {}\x1b[0m",
                    value.get("snapshot").or_else(|| value.get("state")).unwrap_or(&Value::Null)
                );
            }
            "STATE_DELTA" => {
                println!("\x1b[2m│ state updated\x1b[0m");
            }
            "MESSAGES_SNAPSHOT" => {
                let count = value["messages"].as_array().map(Vec::len).unwrap_or(0);
                println!("\x1b[2m│ conversation snapshot ({} messages)\x1b[0m", count);
            }
            "STEP_STARTED" => {
                let name = Self::field(&value, &["name", "stepName"]).unwrap_or("step");
                println!("\x1b[2m│ ▸ {}\x1b[0m", name);
            }
            "STEP_FINISHED" => {
                let name = Self::field(&value, &["name", "stepName"]).unwrap_or("step");
                println!("\x1b[2m│ ✓ {}\x1b[0m", name);
            }
            "UI_UPDATE" => {
                println!(
                    "\x1b[2m│ ui {}\x1b[0m",
                    value["updateType"].as_str().unwrap_or("update")
                );
            }
            "HEARTBEAT" | "keepalive" => {}
            "CUSTOM" => {
                println!(
                    "\x1b[2m│ custom {}\x1b[0m",
                    value["name"].as_str().unwrap_or("event")
                );
            }
            _ => {
                // Unknown events pass through as raw JSON.
                println!("{}", value);
            }
        }
    }
}

/// A renderer that records what it saw (tests and scripting).
#[derive(Default)]
pub struct RecordingRenderer {
    events: std::sync::Mutex<Vec<(String, Value)>>,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn event_types(&self) -> Vec<String> {
        self.events
            .lock()
            .expect("renderer lock poisoned")
            .iter()
            .map(|(t, _)| t.clone())
            .collect()
    }

    pub fn events(&self) -> Vec<(String, Value)> {
        self.events.lock().expect("renderer lock poisoned").clone()
    }
}

impl Renderer for RecordingRenderer {
    fn handle_event(&self, event_type: &str, json: &[u8]) {
        let value = serde_json::from_slice(json).unwrap_or(Value::Null);
        self.events
            .lock()
            .expect("renderer lock poisoned")
            .push((event_type.to_string(), value));
    }
}
