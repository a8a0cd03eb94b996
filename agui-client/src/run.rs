//! Per-run consumer pipeline.
//!
//! Dispatches each incoming event through the handler table, maintaining
//! the run's working set: text buffers keyed by message id, tool-call
//! assemblies keyed by call id, a thinking buffer, the thread state object
//! and the message list. Protocol violations are logged and skipped; only
//! transport faults abort the pipeline.

use std::collections::HashMap;

use agui_core::{
    apply_patch, merge_at_path, merge_object, Event, Message, PatchOp, Role, ToolCall,
};
use futures::{Stream, StreamExt};
use serde_json::Value;

use crate::error::ClientError;
use crate::interactive::{ApprovalMode, DecisionPrompter, ToolDecision};
use crate::renderer::Renderer;
use crate::tools::ToolRegistry;

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunTerminal {
    /// RUN_FINISHED arrived.
    Finished,
    /// RUN_ERROR (or an ERROR event) arrived.
    Failed {
        message: String,
        code: Option<String>,
    },
    /// The operator rejected a tool call; the run ended locally.
    Rejected,
}

/// One reconstructed tool call with its captured result, if any.
#[derive(Debug, Clone)]
pub struct CompletedToolCall {
    pub id: String,
    pub name: String,
    /// Concatenated JSON argument buffer.
    pub arguments: String,
    pub complete: bool,
    pub skipped: bool,
    pub result: Option<Value>,
}

/// Everything a run produced.
#[derive(Debug)]
pub struct RunOutcome {
    pub terminal: RunTerminal,
    /// The thread's message list as of the end of the run.
    pub messages: Vec<Message>,
    /// Messages assembled or injected during this run, in order.
    pub new_messages: Vec<Message>,
    /// Tool calls captured in the run, in arrival order.
    pub tool_calls: Vec<CompletedToolCall>,
    /// The thread state object after snapshots and deltas.
    pub state: Value,
    /// Concatenation of the run's finished assistant text.
    pub text: String,
}

struct TextBuffer {
    role: Role,
    content: String,
}

struct ToolCallAssembly {
    name: String,
    arguments: String,
    complete: bool,
    skipped: bool,
    result: Option<Value>,
}

enum Flow {
    Continue,
    Stop,
}

/// Consumes one run's event stream.
pub struct RunConsumer<'a> {
    renderer: &'a dyn Renderer,
    registry: Option<&'a ToolRegistry>,
    approval: ApprovalMode,
    prompter: Option<&'a dyn DecisionPrompter>,

    text_buffers: HashMap<String, TextBuffer>,
    tool_order: Vec<String>,
    tool_calls: HashMap<String, ToolCallAssembly>,
    thinking: String,
    state: Value,
    messages: Vec<Message>,
    new_messages: Vec<Message>,
    finished_text: String,
    terminal: Option<RunTerminal>,
}

impl<'a> RunConsumer<'a> {
    pub fn new(renderer: &'a dyn Renderer) -> Self {
        Self {
            renderer,
            registry: None,
            approval: ApprovalMode::Auto,
            prompter: None,
            text_buffers: HashMap::new(),
            tool_order: Vec::new(),
            tool_calls: HashMap::new(),
            thinking: String::new(),
            state: Value::Null,
            messages: Vec::new(),
            new_messages: Vec::new(),
            finished_text: String::new(),
            terminal: None,
        }
    }

    /// Enable local execution of tool calls whose name is registered.
    pub fn with_registry(mut self, registry: &'a ToolRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Start from known thread state and history (from the session).
    pub fn with_initial(mut self, state: Value, messages: Vec<Message>) -> Self {
        self.state = state;
        self.messages = messages;
        self
    }

    /// Route each TOOL_CALL_START through the prompter.
    pub fn with_manual_approval(mut self, prompter: &'a dyn DecisionPrompter) -> Self {
        self.approval = ApprovalMode::Manual;
        self.prompter = Some(prompter);
        self
    }

    /// Drive the stream to its terminal and build the outcome.
    ///
    /// A stream that closes without a terminal event is a transport
    /// error, never a silent success.
    pub async fn run(
        mut self,
        stream: impl Stream<Item = Result<Event, ClientError>>,
    ) -> Result<RunOutcome, ClientError> {
        futures::pin_mut!(stream);

        while let Some(item) = stream.next().await {
            let event = item?;
            let encoded = event.encode()?;
            self.renderer.handle_event(event.event_type(), &encoded);

            if let Flow::Stop = self.handle(event).await {
                break;
            }
        }

        let Some(terminal) = self.terminal.take() else {
            return Err(ClientError::Transport(
                "stream closed without a terminal event".to_string(),
            ));
        };

        Ok(RunOutcome {
            terminal,
            messages: self.messages,
            new_messages: self.new_messages,
            tool_calls: self
                .tool_order
                .iter()
                .filter_map(|id| {
                    self.tool_calls.get(id).map(|assembly| CompletedToolCall {
                        id: id.clone(),
                        name: assembly.name.clone(),
                        arguments: assembly.arguments.clone(),
                        complete: assembly.complete,
                        skipped: assembly.skipped,
                        result: assembly.result.clone(),
                    })
                })
                .collect(),
            state: self.state,
            text: self.finished_text,
        })
    }

    async fn handle(&mut self, event: Event) -> Flow {
        match event {
            Event::RunStarted { .. } => Flow::Continue,

            // ===== Text assembly =====
            Event::TextMessageStart {
                message_id, role, ..
            } => {
                self.text_buffers.insert(
                    message_id,
                    TextBuffer {
                        role,
                        content: String::new(),
                    },
                );
                Flow::Continue
            }
            Event::TextMessageContent {
                message_id, delta, ..
            } => {
                self.append_text(&message_id, Role::Assistant, &delta);
                Flow::Continue
            }
            Event::TextMessageChunk {
                message_id,
                role,
                delta,
                ..
            } => {
                let id = message_id.unwrap_or_else(|| "anonymous".to_string());
                if let Some(delta) = delta {
                    self.append_text(&id, role.unwrap_or(Role::Assistant), &delta);
                }
                Flow::Continue
            }
            Event::TextMessageEnd { message_id, .. } => {
                match self.text_buffers.remove(&message_id) {
                    Some(buffer) => {
                        self.finished_text.push_str(&buffer.content);
                        let message = Message::text(message_id, buffer.role, buffer.content);
                        self.messages.push(message.clone());
                        self.new_messages.push(message);
                    }
                    None => {
                        tracing::warn!(%message_id, "TEXT_MESSAGE_END without open buffer");
                    }
                }
                Flow::Continue
            }

            // ===== Tool-call assembly =====
            Event::ToolCallStart {
                tool_call_id, name, ..
            } => {
                let mut skipped = false;
                if self.approval == ApprovalMode::Manual {
                    if let Some(prompter) = self.prompter {
                        match prompter.decide_tool(&name, &tool_call_id) {
                            ToolDecision::Approve => {}
                            ToolDecision::Skip => skipped = true,
                            ToolDecision::Reject => {
                                self.terminal = Some(RunTerminal::Rejected);
                                return Flow::Stop;
                            }
                        }
                    }
                }
                self.tool_order.push(tool_call_id.clone());
                self.tool_calls.insert(
                    tool_call_id,
                    ToolCallAssembly {
                        name,
                        arguments: String::new(),
                        complete: false,
                        skipped,
                        result: None,
                    },
                );
                Flow::Continue
            }
            Event::ToolCallArgs {
                tool_call_id,
                delta,
                args,
                ..
            } => {
                let assembly = self.tool_assembly(&tool_call_id);
                if let Some(args) = args {
                    // A full args value replaces the buffer.
                    assembly.arguments = match args {
                        Value::String(s) => s,
                        other => other.to_string(),
                    };
                } else if let Some(delta) = delta {
                    assembly.arguments.push_str(&delta);
                }
                Flow::Continue
            }
            Event::ToolCallChunk {
                tool_call_id,
                name,
                delta,
                ..
            } => {
                let id = tool_call_id.unwrap_or_else(|| "anonymous".to_string());
                let assembly = self.tool_assembly(&id);
                if let Some(name) = name {
                    assembly.name = name;
                }
                if let Some(delta) = delta {
                    assembly.arguments.push_str(&delta);
                }
                Flow::Continue
            }
            Event::ToolCallEnd {
                tool_call_id,
                result,
                ..
            } => {
                let (name, arguments, skipped) = {
                    let assembly = self.tool_assembly(&tool_call_id);
                    assembly.complete = true;
                    if let Some(result) = result {
                        assembly.result = Some(result);
                    }
                    (
                        assembly.name.clone(),
                        assembly.arguments.clone(),
                        assembly.skipped,
                    )
                };

                if serde_json::from_str::<Value>(&arguments).is_err() {
                    tracing::warn!(
                        %tool_call_id,
                        "tool call ended with non-JSON argument buffer"
                    );
                }

                if !skipped {
                    self.execute_local_tool(&tool_call_id, &name, &arguments).await;
                }
                Flow::Continue
            }
            Event::ToolCallResult {
                tool_call_id,
                result,
                ..
            } => {
                self.tool_assembly(&tool_call_id).result = Some(result);
                Flow::Continue
            }

            // ===== Thinking =====
            Event::ThinkingStart { .. } => {
                self.thinking.clear();
                Flow::Continue
            }
            Event::ThinkingDelta { delta, .. } | Event::ThinkingContent { delta, .. } => {
                self.thinking.push_str(&delta);
                Flow::Continue
            }
            Event::ThinkingEnd { .. } => {
                // Opaque reasoning is discarded once the stream closes it.
                tracing::debug!(chars = self.thinking.len(), "discarding thinking buffer");
                self.thinking.clear();
                Flow::Continue
            }

            // ===== Snapshots and state =====
            Event::MessagesSnapshot { messages, .. } => {
                // Authoritative: replaces the thread view and any partial
                // assembly for it.
                self.text_buffers.clear();
                self.messages = messages.clone();
                self.new_messages = messages.clone();
                self.reconcile_snapshot_tool_calls(&messages);
                Flow::Continue
            }
            Event::StateSnapshot { snapshot, .. } => {
                self.state = snapshot;
                Flow::Continue
            }
            Event::StateDelta {
                delta,
                patches,
                path,
                ..
            } => {
                self.apply_state_delta(delta, patches, path);
                Flow::Continue
            }

            // ===== Presentation, extension, telemetry =====
            Event::Custom { .. }
            | Event::UiUpdate { .. }
            | Event::Warning { .. }
            | Event::Info { .. }
            | Event::Debug { .. }
            | Event::StepStarted { .. }
            | Event::StepFinished { .. }
            | Event::Heartbeat { .. }
            | Event::SessionUpdate { .. }
            | Event::StatusUpdate { .. }
            | Event::Unknown { .. } => Flow::Continue,

            Event::Error { message, .. } => {
                self.terminal = Some(RunTerminal::Failed {
                    message,
                    code: None,
                });
                Flow::Stop
            }
            Event::RunError { message, code, .. } => {
                self.terminal = Some(RunTerminal::Failed { message, code });
                Flow::Stop
            }
            Event::RunFinished { .. } => {
                self.terminal = Some(RunTerminal::Finished);
                Flow::Stop
            }
        }
    }

    fn append_text(&mut self, message_id: &str, role: Role, delta: &str) {
        if !self.text_buffers.contains_key(message_id) {
            // Content before start is a protocol violation; tolerate it by
            // opening the buffer implicitly.
            tracing::warn!(%message_id, "text delta without TEXT_MESSAGE_START");
            self.text_buffers.insert(
                message_id.to_string(),
                TextBuffer {
                    role,
                    content: String::new(),
                },
            );
        }
        if let Some(buffer) = self.text_buffers.get_mut(message_id) {
            buffer.content.push_str(delta);
        }
    }

    fn tool_assembly(&mut self, tool_call_id: &str) -> &mut ToolCallAssembly {
        if !self.tool_calls.contains_key(tool_call_id) {
            tracing::warn!(%tool_call_id, "tool call event without TOOL_CALL_START");
            self.tool_order.push(tool_call_id.to_string());
            self.tool_calls.insert(
                tool_call_id.to_string(),
                ToolCallAssembly {
                    name: String::new(),
                    arguments: String::new(),
                    complete: false,
                    skipped: false,
                    result: None,
                },
            );
        }
        self.tool_calls
            .get_mut(tool_call_id)
            .expect("assembly just ensured")
    }

    /// Execute a completed call locally when its name is registered, and
    /// inject the synthetic tool-role message for the next turn.
    async fn execute_local_tool(&mut self, tool_call_id: &str, name: &str, arguments: &str) {
        let Some(registry) = self.registry else {
            return;
        };
        let Some(execution) = registry.run(name, arguments).await else {
            return;
        };

        let result = execution.to_result_json();
        self.tool_assembly(tool_call_id).result = Some(result.clone());

        let message = Message::tool_result(
            format!("toolmsg-{}", tool_call_id),
            tool_call_id,
            result.to_string(),
        );
        self.messages.push(message.clone());
        self.new_messages.push(message);
    }

    /// Pull completed tool calls out of a messages snapshot so the
    /// interactive layer sees them even when no TOOL_CALL_* events were
    /// streamed (the tool-based UI recipe).
    fn reconcile_snapshot_tool_calls(&mut self, messages: &[Message]) {
        let last_assistant_calls: Option<&Vec<ToolCall>> = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant && m.tool_calls.is_some())
            .and_then(|m| m.tool_calls.as_ref());

        let Some(calls) = last_assistant_calls else {
            return;
        };
        for call in calls {
            if self.tool_calls.contains_key(&call.id) {
                continue;
            }
            self.tool_order.push(call.id.clone());
            self.tool_calls.insert(
                call.id.clone(),
                ToolCallAssembly {
                    name: call.function.name.clone(),
                    arguments: call.function.arguments.clone(),
                    complete: true,
                    skipped: false,
                    result: None,
                },
            );
        }
    }

    /// Apply a state delta in whichever wire form it arrived.
    fn apply_state_delta(
        &mut self,
        delta: Option<Value>,
        patches: Option<Vec<PatchOp>>,
        path: Option<String>,
    ) {
        if let Some(patches) = patches {
            if let Err(err) = apply_patch(&mut self.state, &patches) {
                tracing::warn!(%err, "state patches not applicable; skipping");
            }
            return;
        }

        let Some(delta) = delta else {
            return;
        };
        match delta {
            Value::Array(_) => match serde_json::from_value::<Vec<PatchOp>>(delta) {
                Ok(ops) => {
                    if let Err(err) = apply_patch(&mut self.state, &ops) {
                        tracing::warn!(%err, "state delta not applicable; skipping");
                    }
                }
                Err(err) => {
                    tracing::warn!(%err, "state delta array is not RFC 6902; skipping");
                }
            },
            Value::Object(map) => match path {
                Some(path) => {
                    if let Err(err) = merge_at_path(&mut self.state, &path, &map) {
                        tracing::warn!(%err, %path, "scoped state merge failed; skipping");
                    }
                }
                None => merge_object(&mut self.state, &map),
            },
            other => {
                tracing::warn!(?other, "state delta is neither array nor object; skipping");
            }
        }
    }
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
