//! High-level client facade.
//!
//! Owns the transport, the session store and the local tool registry, and
//! drives complete runs: build the input from session history, consume the
//! stream, route the outcome through the interactive decision layer, and
//! commit approved turns back to the session.

use std::sync::Arc;

use agui_core::{Message, Role, RunInput};
use serde_json::Value;

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::interactive::{ApprovalMode, DecisionPrompter, RunDecision};
use crate::renderer::Renderer;
use crate::run::{RunConsumer, RunOutcome, RunTerminal};
use crate::session::{Session, SessionStore};
use crate::tools::ToolRegistry;
use crate::transport::Transport;

/// Parameters for one command-level run.
pub struct RunRequest<'a> {
    /// Endpoint path, e.g. `/agentic_chat`.
    pub endpoint: &'a str,
    /// User message to append before posting, if any.
    pub message: Option<&'a str>,
    /// Prompt Apply/Regenerate/Cancel when tool results are present.
    pub interactive: bool,
    /// Tool-call approval mode for this run.
    pub approval: ApprovalMode,
}

/// High-level AG-UI client.
pub struct AguiClient {
    transport: Transport,
    store: SessionStore,
    registry: ToolRegistry,
    config: Arc<ClientConfig>,
}

impl AguiClient {
    pub fn new(config: ClientConfig, store: SessionStore) -> Result<Self, ClientError> {
        let config = Arc::new(config);
        Ok(Self {
            transport: Transport::new(config.clone())?,
            store,
            registry: ToolRegistry::with_builtins(config.tool_timeout()),
            config,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ToolRegistry {
        &mut self.registry
    }

    /// The active session, opening a fresh one when none is set.
    pub fn resolve_session(&self) -> Result<Session, ClientError> {
        match self.store.get_active_session()? {
            Some(session) => Ok(session),
            None => Ok(self.store.open_session(None, Default::default())?),
        }
    }

    /// Build the request body for a run on `session`.
    pub fn build_run_input(
        &self,
        session: &Session,
        run_id: &str,
        user_message: Option<&Message>,
    ) -> RunInput {
        let mut input = RunInput::new(session.thread_id.clone(), run_id.to_string());
        input.messages = session.messages.clone();
        if let Some(message) = user_message {
            input.messages.push(message.clone());
        }
        input.state = Value::Object(session.state.clone());
        input.tools = self.registry.descriptors();
        input
    }

    /// Run a streaming endpoint to completion.
    ///
    /// Regenerate re-posts the same input under a fresh run id; Cancel and
    /// Reject leave the session untouched. RUN_ERROR surfaces as
    /// [`ClientError::RunFailed`] after the renderer has seen it.
    pub async fn execute(
        &self,
        request: RunRequest<'_>,
        renderer: &dyn Renderer,
        prompter: &dyn DecisionPrompter,
    ) -> Result<RunOutcome, ClientError> {
        let session = self.resolve_session()?;
        let user_message = request.message.map(|text| {
            Message::text(
                format!("user-{}", uuid::Uuid::new_v4()),
                Role::User,
                text,
            )
        });

        loop {
            let run_id = format!("run-{}", uuid::Uuid::new_v4());
            let input = self.build_run_input(&session, &run_id, user_message.as_ref());
            let stream = self.transport.open_run(request.endpoint, &input).await?;

            let mut consumer = RunConsumer::new(renderer)
                .with_registry(&self.registry)
                .with_initial(input.state.clone(), input.messages.clone());
            if request.approval == ApprovalMode::Manual {
                consumer = consumer.with_manual_approval(prompter);
            }
            let outcome = consumer.run(stream).await?;

            match &outcome.terminal {
                RunTerminal::Failed { message, code } => {
                    return Err(ClientError::RunFailed {
                        message: message.clone(),
                        code: code.clone(),
                    });
                }
                RunTerminal::Rejected => return Ok(outcome),
                RunTerminal::Finished => {
                    if request.interactive && !outcome.tool_calls.is_empty() {
                        match prompter.decide_run(outcome.tool_calls.len()) {
                            RunDecision::Apply => {
                                self.commit(&session, user_message.as_ref(), &outcome)?;
                                return Ok(outcome);
                            }
                            RunDecision::Regenerate => continue,
                            RunDecision::Cancel => return Ok(outcome),
                        }
                    }
                    self.commit(&session, user_message.as_ref(), &outcome)?;
                    return Ok(outcome);
                }
            }
        }
    }

    /// Persist an approved turn: the user message, everything the run
    /// assembled (id-deduplicated), and the final thread state.
    fn commit(
        &self,
        session: &Session,
        user_message: Option<&Message>,
        outcome: &RunOutcome,
    ) -> Result<(), ClientError> {
        if let Some(message) = user_message {
            self.store.add_message(&session.thread_id, message.clone())?;
        }
        self.store
            .add_messages(&session.thread_id, &outcome.new_messages)?;
        if let Value::Object(state) = &outcome.state {
            self.store.replace_state(&session.thread_id, state.clone())?;
        }
        Ok(())
    }

    /// Subscribe to the shared-state stream, rendering every event until
    /// the stream ends (or `limit` events have been seen).
    pub async fn watch_shared(
        &self,
        cid: Option<&str>,
        demo: bool,
        renderer: &dyn Renderer,
        limit: Option<usize>,
    ) -> Result<usize, ClientError> {
        use futures::StreamExt;

        let stream = self.transport.open_shared(cid, demo).await?;
        futures::pin_mut!(stream);

        let mut seen = 0;
        while let Some(item) = stream.next().await {
            let event = item?;
            renderer.handle_event(event.event_type(), &event.encode()?);
            seen += 1;
            if limit.is_some_and(|limit| seen >= limit) {
                break;
            }
        }
        Ok(seen)
    }

    /// Apply a shared-state mutation op.
    pub async fn mutate_shared(
        &self,
        op: &str,
        value: Option<Value>,
    ) -> Result<Value, ClientError> {
        let mut body = serde_json::Map::new();
        body.insert("op".to_string(), Value::String(op.to_string()));
        if let Some(value) = value {
            body.insert("value".to_string(), value);
        }
        self.transport
            .post_json("/shared_state", &Value::Object(body))
            .await
    }

    /// Fetch the producer's tool catalog.
    pub async fn list_server_tools(&self) -> Result<Value, ClientError> {
        self.transport.get_json("/tools").await
    }
}
