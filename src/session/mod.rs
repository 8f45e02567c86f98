//! Advisory Session
//!
//! One submit-to-completion exchange with the advisory service:
//! - `controller`: validation, reset, transport events → state transitions
//! - `observer`: injectable diagnostics hook
//!
//! Lifecycle: `Idle → Connecting → Awaiting → Completed`, with `Failed`
//! reachable from any non-terminal state.

pub mod controller;
pub mod observer;

pub use controller::SessionController;
pub use observer::{NoopObserver, SessionObserver, TracingObserver};

use std::time::Duration;

use serde::Serialize;
use uuid::Uuid;

use crate::config::AdvisorConfig;
use crate::error::SessionError;
use crate::protocol::DEFAULT_MODEL;
use crate::reconciler::{AnswerRecord, SummaryRecord};

/// Default bound on waiting for the connection to open
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Connecting,
    Awaiting,
    Completed,
    Failed,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Connecting => "connecting",
            SessionState::Awaiting => "awaiting",
            SessionState::Completed => "completed",
            SessionState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Completed | SessionState::Failed)
    }

    /// True while results may still arrive
    pub fn is_awaiting(&self) -> bool {
        matches!(self, SessionState::Connecting | SessionState::Awaiting)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The submitted inputs and lifecycle state of the current session
#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub background: String,
    pub questions: Vec<String>,
    pub state: SessionState,
    pub ordering_hint: Option<bool>,
    /// User-visible failure, if the session failed with one
    pub failure: Option<SessionError>,
}

impl Session {
    pub fn new(background: String, questions: Vec<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            background,
            questions,
            state: SessionState::Idle,
            ordering_hint: None,
            failure: None,
        }
    }

    fn idle() -> Self {
        Self::new(String::new(), Vec::new())
    }
}

/// What applying one event did to the session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "update", rename_all = "snake_case")]
pub enum SessionUpdate {
    /// Connection opened and the request went out
    RequestSent,
    AnswerRecorded { question_number: u32 },
    /// Summary received; session completed
    Completed,
    /// Message with an unrecognized `type`
    Unknown { kind: String },
    /// Frame that could not be parsed; session unaffected
    Malformed { error: String },
    Failed { error: SessionError },
    /// Transport closed without a user-visible failure
    Closed,
    /// Event from a superseded transport
    Stale,
    /// Event with no effect in the current state
    Ignored,
}

/// Knobs the controller needs from configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    pub model: String,
    pub connect_timeout: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl From<&AdvisorConfig> for SessionSettings {
    fn from(config: &AdvisorConfig) -> Self {
        Self {
            model: config.model.clone(),
            connect_timeout: config.connect_timeout(),
        }
    }
}

/// Serializable snapshot for presentation
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub session_id: Uuid,
    pub state: SessionState,
    pub awaiting: bool,
    pub background: String,
    pub questions: Vec<String>,
    pub answers: Vec<AnswerRecord>,
    pub pending: Vec<u32>,
    pub summary: Option<SummaryRecord>,
    pub ordering_hint: Option<bool>,
    pub failure: Option<SessionError>,
}
