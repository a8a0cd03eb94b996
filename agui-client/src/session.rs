//! File-backed session storage.
//!
//! Two layers under the config directory: `session.json` holds the single
//! active-session pointer, `sessions/<threadId>.json` holds one full
//! record per thread. Every write is an atomic temp-file rename so a
//! crash never leaves a half-written record behind.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use agui_core::Message;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Errors that can occur during session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Storage backend error.
    #[error("Storage error: {0}")]
    Storage(String),
    /// Session not found.
    #[error("Session not found: {0}")]
    NotFound(String),
    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A persistent conversation session, keyed by thread id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub thread_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_opened_at: DateTime<Utc>,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub state: Map<String, Value>,
}

impl Session {
    fn new(thread_id: String, label: Option<String>, metadata: HashMap<String, String>) -> Self {
        let now = Utc::now();
        Self {
            thread_id,
            label,
            metadata,
            created_at: now,
            updated_at: now,
            last_opened_at: now,
            messages: Vec::new(),
            state: Map::new(),
        }
    }

    /// Bump `updated_at`, keeping it strictly increasing even when the
    /// clock has not advanced between two writes.
    fn touch(&mut self) {
        let now = Utc::now();
        self.updated_at = if now > self.updated_at {
            now
        } else {
            self.updated_at + Duration::milliseconds(1)
        };
    }
}

/// Summary of a session, for listings.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub thread_id: String,
    pub label: Option<String>,
    pub message_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The active-session pointer file.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActivePointer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    active_session: Option<ActiveSession>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActiveSession {
    thread_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    label: Option<String>,
    #[serde(default)]
    metadata: HashMap<String, String>,
    last_opened_at: DateTime<Utc>,
}

/// File-backed session store.
///
/// The store owns the records; callers get clones and mutate only through
/// store operations.
pub struct SessionStore {
    root: PathBuf,
}

impl SessionStore {
    /// Create a store rooted at `root`, creating directories as needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, SessionError> {
        let root = root.into();
        std::fs::create_dir_all(root.join("sessions"))?;
        Ok(Self { root })
    }

    fn pointer_path(&self) -> PathBuf {
        self.root.join("session.json")
    }

    fn session_path(&self, thread_id: &str) -> PathBuf {
        self.root.join("sessions").join(format!("{}.json", thread_id))
    }

    /// Open a fresh session, set it active and persist the empty record.
    pub fn open_session(
        &self,
        label: Option<String>,
        metadata: HashMap<String, String>,
    ) -> Result<Session, SessionError> {
        let thread_id = uuid::Uuid::new_v4().to_string();
        let session = Session::new(thread_id, label, metadata);
        self.write_session(&session)?;
        self.write_pointer(&ActivePointer {
            active_session: Some(ActiveSession {
                thread_id: session.thread_id.clone(),
                label: session.label.clone(),
                metadata: session.metadata.clone(),
                last_opened_at: session.last_opened_at,
            }),
        })?;
        Ok(session)
    }

    /// The currently active session, if one is set.
    ///
    /// A pointer whose record has gone missing is healed by recreating an
    /// empty record rather than failing the read.
    pub fn get_active_session(&self) -> Result<Option<Session>, SessionError> {
        let Some(active) = self.read_pointer()?.active_session else {
            return Ok(None);
        };
        match self.load_session(&active.thread_id) {
            Ok(session) => Ok(Some(session)),
            Err(SessionError::NotFound(_)) => {
                let session = self.create_session(&active.thread_id, active.label.clone())?;
                Ok(Some(session))
            }
            Err(err) => Err(err),
        }
    }

    /// Clear the active pointer. Idempotent.
    pub fn close_session(&self) -> Result<(), SessionError> {
        self.write_pointer(&ActivePointer::default())
    }

    /// Point the active pointer at an existing (or new) thread.
    pub fn set_active_session(
        &self,
        thread_id: &str,
        label: Option<String>,
    ) -> Result<Session, SessionError> {
        let mut session = self.create_session(thread_id, label.clone())?;
        session.last_opened_at = Utc::now();
        if label.is_some() {
            session.label = label;
        }
        self.write_session(&session)?;
        self.write_pointer(&ActivePointer {
            active_session: Some(ActiveSession {
                thread_id: session.thread_id.clone(),
                label: session.label.clone(),
                metadata: session.metadata.clone(),
                last_opened_at: session.last_opened_at,
            }),
        })?;
        Ok(session)
    }

    /// Load one session record.
    pub fn load_session(&self, thread_id: &str) -> Result<Session, SessionError> {
        let path = self.session_path(thread_id);
        if !path.exists() {
            return Err(SessionError::NotFound(thread_id.to_string()));
        }
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Create a record if absent; return the existing one otherwise.
    pub fn create_session(
        &self,
        thread_id: &str,
        label: Option<String>,
    ) -> Result<Session, SessionError> {
        match self.load_session(thread_id) {
            Ok(session) => Ok(session),
            Err(SessionError::NotFound(_)) => {
                let session = Session::new(thread_id.to_string(), label, HashMap::new());
                self.write_session(&session)?;
                Ok(session)
            }
            Err(err) => Err(err),
        }
    }

    /// Conversation history for a thread.
    pub fn get_session_history(&self, thread_id: &str) -> Result<Vec<Message>, SessionError> {
        Ok(self.load_session(thread_id)?.messages)
    }

    /// Append one message, deduplicating by message id.
    pub fn add_message(&self, thread_id: &str, message: Message) -> Result<(), SessionError> {
        let mut session = self.load_session(thread_id)?;
        if session.messages.iter().any(|m| m.id == message.id) {
            return Ok(());
        }
        session.messages.push(message);
        session.touch();
        self.write_session(&session)
    }

    /// Append several messages with id-dedup, in one write.
    pub fn add_messages(&self, thread_id: &str, messages: &[Message]) -> Result<(), SessionError> {
        let mut session = self.load_session(thread_id)?;
        let mut appended = false;
        for message in messages {
            if session.messages.iter().any(|m| m.id == message.id) {
                continue;
            }
            session.messages.push(message.clone());
            appended = true;
        }
        if appended {
            session.touch();
            self.write_session(&session)?;
        }
        Ok(())
    }

    /// Set one key of the per-session state map.
    pub fn update_state(
        &self,
        thread_id: &str,
        key: &str,
        value: Value,
    ) -> Result<(), SessionError> {
        let mut session = self.load_session(thread_id)?;
        session.state.insert(key.to_string(), value);
        session.touch();
        self.write_session(&session)
    }

    /// Replace the whole per-session state map.
    pub fn replace_state(
        &self,
        thread_id: &str,
        state: Map<String, Value>,
    ) -> Result<(), SessionError> {
        let mut session = self.load_session(thread_id)?;
        session.state = state;
        session.touch();
        self.write_session(&session)
    }

    /// The per-session state map.
    pub fn get_session_state(&self, thread_id: &str) -> Result<Map<String, Value>, SessionError> {
        Ok(self.load_session(thread_id)?.state)
    }

    /// Write a session record to an external file.
    pub fn export(&self, thread_id: &str, output_path: &Path) -> Result<(), SessionError> {
        let session = self.load_session(thread_id)?;
        if let Some(parent) = output_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_vec_pretty(&session)?;
        std::fs::write(output_path, raw)?;
        Ok(())
    }

    /// Read a session record from an external file and store it.
    pub fn import(&self, input_path: &Path) -> Result<Session, SessionError> {
        let raw = std::fs::read_to_string(input_path)?;
        let session: Session = serde_json::from_str(&raw)?;
        self.write_session(&session)?;
        Ok(session)
    }

    /// All stored sessions, most recently updated first.
    pub fn list_sessions(&self) -> Result<Vec<SessionSummary>, SessionError> {
        let mut summaries = Vec::new();
        for entry in std::fs::read_dir(self.root.join("sessions"))? {
            let path = entry?.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            let raw = std::fs::read_to_string(&path)?;
            let session: Session = match serde_json::from_str(&raw) {
                Ok(session) => session,
                Err(err) => {
                    tracing::warn!(?path, %err, "skipping unreadable session record");
                    continue;
                }
            };
            summaries.push(SessionSummary {
                thread_id: session.thread_id,
                label: session.label,
                message_count: session.messages.len(),
                created_at: session.created_at,
                updated_at: session.updated_at,
            });
        }
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(summaries)
    }

    /// Delete one session record; clears the active pointer if it points
    /// at the deleted thread.
    pub fn delete_session(&self, thread_id: &str) -> Result<(), SessionError> {
        let path = self.session_path(thread_id);
        if !path.exists() {
            return Err(SessionError::NotFound(thread_id.to_string()));
        }
        std::fs::remove_file(path)?;

        if let Some(active) = self.read_pointer()?.active_session {
            if active.thread_id == thread_id {
                self.close_session()?;
            }
        }
        Ok(())
    }

    fn read_pointer(&self) -> Result<ActivePointer, SessionError> {
        let path = self.pointer_path();
        if !path.exists() {
            return Ok(ActivePointer::default());
        }
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    fn write_pointer(&self, pointer: &ActivePointer) -> Result<(), SessionError> {
        let raw = serde_json::to_vec_pretty(pointer)?;
        atomic_write(&self.pointer_path(), &raw)
    }

    fn write_session(&self, session: &Session) -> Result<(), SessionError> {
        let raw = serde_json::to_vec_pretty(session)?;
        atomic_write(&self.session_path(&session.thread_id), &raw)
    }
}

/// Write via a temp file in the same directory, then rename over the
/// target. Rename is atomic on the filesystems we care about.
fn atomic_write(path: &Path, bytes: &[u8]) -> Result<(), SessionError> {
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path).map_err(|e| {
        let _ = std::fs::remove_file(&tmp);
        SessionError::Storage(format!("rename failed for {}: {}", path.display(), e))
    })
}
