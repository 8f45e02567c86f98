// src/session/controller.rs
// Session controller: submission, transport lifecycle and message dispatch

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::observer::{SessionObserver, TracingObserver};
use super::{Session, SessionSettings, SessionState, SessionUpdate, SessionView};
use crate::error::{ProtocolError, SessionError, ValidationError};
use crate::protocol::{self, ClientMessage, InboundBody};
use crate::questions::normalize_questions;
use crate::reconciler::{AnswerRecord, ResultReconciler, SummaryRecord};
use crate::transport::{
    Connector, EventSink, NORMAL_CLOSURE, TaggedEvent, TransportEvent, TransportHandle,
};

/// Drives one advisory session at a time.
///
/// Transport tasks never touch session state: they post [`TaggedEvent`]s to
/// the controller's channel, and the controller applies them one by one in
/// [`handle_event`](Self::handle_event). Each transport carries the
/// generation it was opened under, so events from a replaced transport are
/// dropped.
pub struct SessionController<C: Connector> {
    connector: C,
    settings: SessionSettings,
    observer: Arc<dyn SessionObserver>,
    session: Session,
    reconciler: ResultReconciler,
    transport: Option<TransportHandle>,
    generation: u64,
    connect_deadline: Option<Instant>,
    events_tx: mpsc::UnboundedSender<TaggedEvent>,
    events_rx: mpsc::UnboundedReceiver<TaggedEvent>,
}

impl<C: Connector> SessionController<C> {
    pub fn new(connector: C, settings: SessionSettings) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            connector,
            settings,
            observer: Arc::new(TracingObserver),
            session: Session::idle(),
            reconciler: ResultReconciler::new(),
            transport: None,
            generation: 0,
            connect_deadline: None,
            events_tx,
            events_rx,
        }
    }

    /// Replace the default tracing observer
    pub fn with_observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observer = observer;
        self
    }

    // ========================================================================
    // Submission
    // ========================================================================

    /// Validate inputs and start a new session, replacing any current one.
    ///
    /// Returns the generation of the transport opened for the new session.
    pub fn submit<S: AsRef<str>>(
        &mut self,
        background: &str,
        questions: &[S],
    ) -> Result<u64, ValidationError> {
        let background = background.trim();
        if background.is_empty() {
            return Err(ValidationError::EmptyBackground);
        }
        let questions = normalize_questions(questions);
        if questions.is_empty() {
            return Err(ValidationError::NoQuestions);
        }

        // The old transport is closed before the new one opens
        self.release_transport();
        self.generation += 1;
        self.reconciler.reset(questions.len());
        self.session = Session::new(background.to_string(), questions);

        info!(
            "[session {}] submitting {} question(s) (transport {})",
            self.session.id,
            self.session.questions.len(),
            self.generation
        );

        self.set_state(SessionState::Connecting);
        // A timeout too large to represent means no deadline
        self.connect_deadline = Instant::now().checked_add(self.settings.connect_timeout);

        let sink = EventSink::new(self.generation, self.events_tx.clone());
        self.transport = Some(self.connector.open(sink));

        Ok(self.generation)
    }

    // ========================================================================
    // Event loop
    // ========================================================================

    /// Wait for the next transport event (or the connect deadline) and apply it.
    ///
    /// Returns `None` when nothing more can happen: no session was submitted,
    /// or the session is over and its transport is gone.
    pub async fn next_update(&mut self) -> Option<SessionUpdate> {
        if self.session.state == SessionState::Idle {
            return None;
        }
        if self.session.state.is_terminal() && self.transport.is_none() {
            return None;
        }

        let deadline = match self.session.state {
            SessionState::Connecting => self.connect_deadline,
            _ => None,
        };

        let received = match deadline {
            Some(deadline) => {
                match tokio::time::timeout_at(deadline, self.events_rx.recv()).await {
                    Ok(received) => received,
                    Err(_) => return Some(self.handle_connect_timeout()),
                }
            }
            None => self.events_rx.recv().await,
        };

        // The controller holds a sender, so the channel never closes under us
        let tagged = received?;
        Some(self.handle_event(tagged))
    }

    /// Process events until the session completes or fails
    pub async fn run_to_end(&mut self) -> SessionState {
        while !self.session.state.is_terminal() {
            if self.next_update().await.is_none() {
                break;
            }
        }
        self.session.state
    }

    /// Apply one transport event to the session
    pub fn handle_event(&mut self, tagged: TaggedEvent) -> SessionUpdate {
        if tagged.generation != self.generation {
            self.observer
                .on_stale_event(tagged.generation, self.generation, &tagged.event);
            return SessionUpdate::Stale;
        }
        self.observer.on_transport_event(tagged.generation, &tagged.event);

        use SessionState::{Awaiting, Completed, Connecting, Failed};

        match (self.session.state, tagged.event) {
            (Connecting, TransportEvent::Opened) => self.send_request(),

            (Awaiting | Completed, TransportEvent::Message(text)) => self.apply_message(&text),

            (Awaiting | Completed, TransportEvent::InvalidFrame { len }) => {
                let error = ProtocolError::NonUtf8Frame { len };
                self.observer.on_malformed("", &error);
                SessionUpdate::Malformed {
                    error: error.to_string(),
                }
            }

            (Connecting | Awaiting, TransportEvent::Error(reason)) => {
                self.release_transport();
                self.fail(SessionError::Transport(reason))
            }

            (Connecting | Awaiting, TransportEvent::Closed { code, reason }) => {
                self.release_transport();
                if code == Some(NORMAL_CLOSURE) {
                    debug!("Service closed the connection before sending a summary");
                    self.set_state(Failed);
                    SessionUpdate::Closed
                } else {
                    self.fail(SessionError::AbnormalClosure { code, reason })
                }
            }

            (Completed | Failed, TransportEvent::Closed { .. }) => {
                self.release_transport();
                SessionUpdate::Closed
            }

            (Completed, TransportEvent::Error(reason)) => {
                warn!("Transport error after completion: {}", reason);
                self.release_transport();
                SessionUpdate::Ignored
            }

            (state, event) => {
                debug!("Ignoring {} event while {}", event.name(), state);
                SessionUpdate::Ignored
            }
        }
    }

    /// Close the active transport. A session still in flight ends as `Failed`.
    pub fn close(&mut self) {
        self.release_transport();
        if self.session.state.is_awaiting() {
            self.set_state(SessionState::Failed);
        }
    }

    // ========================================================================
    // Transitions
    // ========================================================================

    fn send_request(&mut self) -> SessionUpdate {
        let request = ClientMessage::process_questions(
            self.session.background.clone(),
            self.session.questions.clone(),
            self.settings.model.clone(),
        );

        let sent = request
            .to_json()
            .map_err(|e| SessionError::RequestSend(e.to_string()))
            .and_then(|payload| match &self.transport {
                Some(handle) => handle.send(payload),
                None => Err(SessionError::RequestSend("no active transport".to_string())),
            });

        match sent {
            Ok(()) => {
                self.connect_deadline = None;
                self.set_state(SessionState::Awaiting);
                SessionUpdate::RequestSent
            }
            Err(e) => {
                self.release_transport();
                self.fail(e)
            }
        }
    }

    fn apply_message(&mut self, text: &str) -> SessionUpdate {
        let message = match protocol::parse_message(text) {
            Ok(message) => message,
            Err(e) => {
                self.observer.on_malformed(text, &e);
                return SessionUpdate::Malformed {
                    error: e.to_string(),
                };
            }
        };

        if let Some(hint) = message.sent_in_order {
            self.session.ordering_hint = Some(hint);
        }

        match message.body {
            InboundBody::Answer(answer) => {
                let question_number = answer.question_number;
                self.reconciler.record_answer(
                    question_number,
                    answer.question,
                    answer.answer,
                    answer.timestamp,
                );
                SessionUpdate::AnswerRecorded { question_number }
            }
            InboundBody::Summary(summary) => {
                self.reconciler
                    .record_summary(summary.summary, summary.timestamp);
                info!(
                    "[session {}] summary received with {} answer(s)",
                    self.session.id,
                    self.reconciler.answer_count()
                );
                self.set_state(SessionState::Completed);
                SessionUpdate::Completed
            }
            InboundBody::Unknown(kind) => {
                self.observer.on_unknown_message(&kind);
                SessionUpdate::Unknown { kind }
            }
        }
    }

    fn handle_connect_timeout(&mut self) -> SessionUpdate {
        let timeout = self.settings.connect_timeout;
        warn!(
            "[session {}] connection not opened within {:?}, abandoning",
            self.session.id, timeout
        );
        self.release_transport();
        self.fail(SessionError::ConnectionTimeout(timeout))
    }

    fn fail(&mut self, error: SessionError) -> SessionUpdate {
        self.observer.on_failure(self.session.id, &error);
        self.session.failure = Some(error.clone());
        self.set_state(SessionState::Failed);
        SessionUpdate::Failed { error }
    }

    fn set_state(&mut self, to: SessionState) {
        let from = self.session.state;
        if from != to {
            self.session.state = to;
            self.observer.on_state_change(self.session.id, from, to);
        }
    }

    fn release_transport(&mut self) {
        self.connect_deadline = None;
        if let Some(handle) = self.transport.take() {
            debug!("[session {}] releasing transport {}", self.session.id, handle.generation());
            handle.close();
        }
    }

    // ========================================================================
    // Read-only view
    // ========================================================================

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_id(&self) -> Uuid {
        self.session.id
    }

    pub fn state(&self) -> SessionState {
        self.session.state
    }

    /// Whether results may still arrive (drives the "typing" indicator)
    pub fn is_awaiting(&self) -> bool {
        self.session.state.is_awaiting()
    }

    pub fn background(&self) -> &str {
        &self.session.background
    }

    pub fn questions(&self) -> &[String] {
        &self.session.questions
    }

    pub fn ordered_answers(&self) -> Vec<&AnswerRecord> {
        self.reconciler.ordered_answers()
    }

    pub fn pending_numbers(&self) -> &std::collections::BTreeSet<u32> {
        self.reconciler.pending_numbers()
    }

    pub fn summary(&self) -> Option<&SummaryRecord> {
        self.reconciler.summary()
    }

    pub fn ordering_hint(&self) -> Option<bool> {
        self.session.ordering_hint
    }

    pub fn failure(&self) -> Option<&SessionError> {
        self.session.failure.as_ref()
    }

    /// Generation of the most recently opened transport (0 before any submit)
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn has_transport(&self) -> bool {
        self.transport.is_some()
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            session_id: self.session.id,
            state: self.session.state,
            awaiting: self.is_awaiting(),
            background: self.session.background.clone(),
            questions: self.session.questions.clone(),
            answers: self.ordered_answers().into_iter().cloned().collect(),
            pending: self.pending_numbers().iter().copied().collect(),
            summary: self.summary().cloned(),
            ordering_hint: self.session.ordering_hint,
            failure: self.session.failure.clone(),
        }
    }
}

impl<C: Connector> Drop for SessionController<C> {
    fn drop(&mut self) {
        self.release_transport();
    }
}
