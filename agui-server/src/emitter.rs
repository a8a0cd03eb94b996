//! Per-request run lifecycle and event emission.
//!
//! Each streaming endpoint spawns one producer task that drives a
//! [`RunEmitter`]. The emitter owns the run envelope (RUN_STARTED through
//! the terminal event) and the cancellation discipline: the SSE response
//! stream dropping means the client is gone, at which point every further
//! send fails and the run aborts without writing a terminal.

use std::time::Duration;

use agui_core::{now_ms, Event, SseFrame};
use tokio::sync::mpsc;

/// The lifecycle of a single producer run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    /// Created but RUN_STARTED not yet emitted.
    Idle,
    /// Envelope open; events flowing.
    Running,
    /// Closed with RUN_FINISHED.
    Finished,
    /// Closed with RUN_ERROR.
    Errored,
    /// Client disconnected or a write failed; no terminal was emitted.
    Aborted,
}

/// Emission failed because the client went away.
#[derive(Debug, thiserror::Error)]
#[error("client disconnected")]
pub struct Disconnected;

/// Writes protocol events for one run into the response channel.
pub struct RunEmitter {
    tx: mpsc::Sender<SseFrame>,
    thread_id: String,
    run_id: String,
    phase: RunPhase,
}

impl RunEmitter {
    pub fn new(
        tx: mpsc::Sender<SseFrame>,
        thread_id: impl Into<String>,
        run_id: impl Into<String>,
    ) -> Self {
        Self {
            tx,
            thread_id: thread_id.into(),
            run_id: run_id.into(),
            phase: RunPhase::Idle,
        }
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Open the run envelope.
    pub async fn start(&mut self) -> Result<(), Disconnected> {
        let event = Event::RunStarted {
            thread_id: self.thread_id.clone(),
            run_id: self.run_id.clone(),
            timestamp: now_ms(),
        };
        self.emit(event).await?;
        self.phase = RunPhase::Running;
        Ok(())
    }

    /// Emit one protocol event as an SSE data frame.
    pub async fn emit(&mut self, event: Event) -> Result<(), Disconnected> {
        let data = match event.encode() {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(err) => {
                // Serialization failure degrades to a RUN_ERROR payload so
                // the client still sees a terminal.
                tracing::error!(%err, "failed to serialize event");
                serde_json::json!({
                    "type": "RUN_ERROR",
                    "message": format!("failed to serialize event: {}", err),
                })
                .to_string()
            }
        };
        self.frame(SseFrame::data(data)).await
    }

    /// Emit a raw frame (used for named frames like `keepalive`).
    pub async fn frame(&mut self, frame: SseFrame) -> Result<(), Disconnected> {
        if self.tx.send(frame).await.is_err() {
            self.phase = RunPhase::Aborted;
            return Err(Disconnected);
        }
        Ok(())
    }

    /// Close the run envelope successfully.
    pub async fn finish(&mut self) -> Result<(), Disconnected> {
        let event = Event::RunFinished {
            thread_id: self.thread_id.clone(),
            run_id: self.run_id.clone(),
            result: None,
            timestamp: now_ms(),
        };
        self.emit(event).await?;
        self.phase = RunPhase::Finished;
        Ok(())
    }

    /// Close the run envelope with a domain error.
    pub async fn error(&mut self, message: impl Into<String>) -> Result<(), Disconnected> {
        let event = Event::RunError {
            message: message.into(),
            code: None,
            timestamp: now_ms(),
        };
        self.emit(event).await?;
        self.phase = RunPhase::Errored;
        Ok(())
    }

    /// Cancellable pacing sleep.
    ///
    /// Returns early with `Disconnected` the moment the client closes, so
    /// a recipe never sits out a delay for a receiver that is gone.
    pub async fn pace(&mut self, delay: Duration) -> Result<(), Disconnected> {
        if delay.is_zero() {
            return self.check_connected();
        }
        let tx = self.tx.clone();
        tokio::select! {
            _ = tokio::time::sleep(delay) => self.check_connected(),
            _ = tx.closed() => {
                self.phase = RunPhase::Aborted;
                Err(Disconnected)
            }
        }
    }

    fn check_connected(&mut self) -> Result<(), Disconnected> {
        if self.tx.is_closed() {
            self.phase = RunPhase::Aborted;
            Err(Disconnected)
        } else {
            Ok(())
        }
    }
}
