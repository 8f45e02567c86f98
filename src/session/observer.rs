// src/session/observer.rs
// Diagnostics hook for session and socket events

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::SessionState;
use crate::error::{ProtocolError, SessionError};
use crate::transport::TransportEvent;

/// Longest slice of a raw frame included in logs
const MAX_LOGGED_FRAME: usize = 200;

/// Receives every lifecycle and socket event of the controller.
///
/// All methods default to no-ops, so implementors pick what they need.
pub trait SessionObserver: Send + Sync {
    fn on_state_change(&self, _session_id: Uuid, _from: SessionState, _to: SessionState) {}

    fn on_transport_event(&self, _generation: u64, _event: &TransportEvent) {}

    /// Event from a transport generation other than the current one
    fn on_stale_event(&self, _generation: u64, _current: u64, _event: &TransportEvent) {}

    fn on_malformed(&self, _raw: &str, _error: &ProtocolError) {}

    fn on_unknown_message(&self, _kind: &str) {}

    fn on_failure(&self, _session_id: Uuid, _error: &SessionError) {}
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl SessionObserver for NoopObserver {}

/// Logs every event through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl SessionObserver for TracingObserver {
    fn on_state_change(&self, session_id: Uuid, from: SessionState, to: SessionState) {
        info!("[session {}] {} -> {}", session_id, from, to);
    }

    fn on_transport_event(&self, generation: u64, event: &TransportEvent) {
        match event {
            TransportEvent::Message(text) => {
                debug!("[transport {}] message: {}", generation, truncate(text));
            }
            TransportEvent::InvalidFrame { len } => {
                debug!("[transport {}] binary frame of {} byte(s) is not UTF-8", generation, len);
            }
            TransportEvent::Error(reason) => {
                debug!("[transport {}] error: {}", generation, reason);
            }
            TransportEvent::Closed { code, reason } => {
                debug!("[transport {}] closed: code={:?} reason={:?}", generation, code, reason);
            }
            TransportEvent::Opened => debug!("[transport {}] opened", generation),
        }
    }

    fn on_stale_event(&self, generation: u64, current: u64, event: &TransportEvent) {
        debug!(
            "Dropping {} event from transport {} (current is {})",
            event.name(),
            generation,
            current
        );
    }

    fn on_malformed(&self, raw: &str, error: &ProtocolError) {
        if raw.is_empty() {
            warn!("Ignoring malformed message ({})", error);
            return;
        }
        warn!("Ignoring malformed message ({}): {}", error, truncate(raw));
    }

    fn on_unknown_message(&self, kind: &str) {
        debug!("Unknown message type: {}", kind);
    }

    fn on_failure(&self, session_id: Uuid, error: &SessionError) {
        warn!("[session {}] failed: {}", session_id, error);
    }
}

fn truncate(text: &str) -> String {
    if text.chars().count() <= MAX_LOGGED_FRAME {
        text.to_string()
    } else {
        let head: String = text.chars().take(MAX_LOGGED_FRAME).collect();
        format!("{}…", head)
    }
}
