//! Client-side tool registry.
//!
//! When an assistant tool call names a tool registered here, the consumer
//! executes it locally (bounded by a timeout), captures the outcome and
//! injects a synthetic `tool`-role message into the conversation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use agui_core::ToolDescriptor;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};

/// Errors a tool execution can produce.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// Arguments did not match the tool's expectations.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The tool ran and failed.
    #[error("{0}")]
    Failed(String),
}

/// A tool executable on the client.
#[async_trait]
pub trait ClientTool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// JSON-Schema of the argument object.
    fn parameters(&self) -> Value;

    async fn execute(&self, args: Value) -> Result<Value, ToolError>;
}

/// Captured outcome of one local tool execution.
#[derive(Debug, Clone)]
pub struct ToolExecution {
    pub tool_name: String,
    pub success: bool,
    /// Result on success, error text on failure.
    pub output: Value,
    pub duration: Duration,
}

impl ToolExecution {
    /// The payload injected as a `tool`-role message.
    pub fn to_result_json(&self) -> Value {
        let mut map = serde_json::Map::new();
        map.insert("success".to_string(), json!(self.success));
        let key = if self.success { "result" } else { "error" };
        map.insert(key.to_string(), self.output.clone());
        map.insert(
            "durationMs".to_string(),
            json!(self.duration.as_millis() as u64),
        );
        Value::Object(map)
    }
}

/// Registry of client-side tools with a shared execution timeout.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn ClientTool>>,
    timeout: Duration,
}

impl ToolRegistry {
    pub fn new(timeout: Duration) -> Self {
        Self {
            tools: HashMap::new(),
            timeout,
        }
    }

    /// A registry preloaded with the built-in tools.
    pub fn with_builtins(timeout: Duration) -> Self {
        let mut registry = Self::new(timeout);
        registry.register(Arc::new(CurrentTime));
        registry.register(Arc::new(EchoTool));
        registry
    }

    pub fn register(&mut self, tool: Arc<dyn ClientTool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn ClientTool>> {
        self.tools.get(name)
    }

    /// Descriptors for every registered tool, sorted by name.
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        let mut descriptors: Vec<_> = self
            .tools
            .values()
            .map(|tool| ToolDescriptor {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                tags: Vec::new(),
                capabilities: vec!["client".to_string()],
                parameters: tool.parameters(),
            })
            .collect();
        descriptors.sort_by(|a, b| a.name.cmp(&b.name));
        descriptors
    }

    /// Execute a registered tool from its JSON argument string.
    ///
    /// Returns `None` for unregistered names. Failures and timeouts are
    /// captured into the execution record, not raised: a broken tool must
    /// not fail the surrounding run.
    pub async fn run(&self, name: &str, arguments: &str) -> Option<ToolExecution> {
        let tool = self.tools.get(name)?;
        let started = Instant::now();

        let args: Value = match serde_json::from_str(arguments) {
            Ok(args) => args,
            Err(err) => {
                return Some(ToolExecution {
                    tool_name: name.to_string(),
                    success: false,
                    output: json!(format!("invalid argument JSON: {}", err)),
                    duration: started.elapsed(),
                });
            }
        };

        let outcome = tokio::time::timeout(self.timeout, tool.execute(args)).await;
        let duration = started.elapsed();

        Some(match outcome {
            Ok(Ok(result)) => ToolExecution {
                tool_name: name.to_string(),
                success: true,
                output: result,
                duration,
            },
            Ok(Err(err)) => ToolExecution {
                tool_name: name.to_string(),
                success: false,
                output: json!(err.to_string()),
                duration,
            },
            Err(_) => ToolExecution {
                tool_name: name.to_string(),
                success: false,
                output: json!(format!(
                    "timed out after {} seconds",
                    self.timeout.as_secs()
                )),
                duration,
            },
        })
    }
}

// ============================================================================
// Built-in Tools
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
struct CurrentTimeInput {
    /// IANA timezone name; UTC when omitted.
    #[serde(default)]
    timezone: Option<String>,
}

/// Report the current time.
pub struct CurrentTime;

#[async_trait]
impl ClientTool for CurrentTime {
    fn name(&self) -> &str {
        "current_time"
    }

    fn description(&self) -> &str {
        "Report the current date and time"
    }

    fn parameters(&self) -> Value {
        serde_json::to_value(schemars::schema_for!(CurrentTimeInput)).unwrap_or_default()
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let input: CurrentTimeInput =
            serde_json::from_value(args).map_err(|e| ToolError::InvalidInput(e.to_string()))?;
        let now = chrono::Utc::now();
        Ok(json!({
            "iso8601": now.to_rfc3339(),
            "timezone": input.timezone.unwrap_or_else(|| "UTC".to_string()),
        }))
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct EchoInput {
    /// Text to echo back.
    text: String,
}

/// Echo the given text back, for wiring checks.
pub struct EchoTool;

#[async_trait]
impl ClientTool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echo the provided text back"
    }

    fn parameters(&self) -> Value {
        serde_json::to_value(schemars::schema_for!(EchoInput)).unwrap_or_default()
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let input: EchoInput =
            serde_json::from_value(args).map_err(|e| ToolError::InvalidInput(e.to_string()))?;
        Ok(json!({ "echo": input.text }))
    }
}
