// src/transport/mod.rs
// Session transport: one realtime connection per session, reported as tagged events

pub mod ws;

pub use ws::WsConnector;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::SessionError;

/// Close code of an orderly shutdown (RFC 6455 §7.4.1)
pub const NORMAL_CLOSURE: u16 = 1000;

/// Lifecycle events reported by a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Connection established; the request may now be sent
    Opened,
    /// One inbound text frame
    Message(String),
    /// Inbound binary frame that is not valid UTF-8
    InvalidFrame { len: usize },
    /// Socket-level failure. No further events follow.
    Error(String),
    /// Peer closed the connection, or the stream ended (`code: None`)
    Closed { code: Option<u16>, reason: String },
}

impl TransportEvent {
    pub fn name(&self) -> &'static str {
        match self {
            TransportEvent::Opened => "opened",
            TransportEvent::Message(_) => "message",
            TransportEvent::InvalidFrame { .. } => "invalid_frame",
            TransportEvent::Error(_) => "error",
            TransportEvent::Closed { .. } => "closed",
        }
    }
}

/// A transport event stamped with the generation of the transport that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedEvent {
    pub generation: u64,
    pub event: TransportEvent,
}

impl TaggedEvent {
    pub fn new(generation: u64, event: TransportEvent) -> Self {
        Self { generation, event }
    }
}

/// Write side of the controller's event channel, bound to one transport generation
#[derive(Debug, Clone)]
pub struct EventSink {
    generation: u64,
    tx: mpsc::UnboundedSender<TaggedEvent>,
}

impl EventSink {
    pub fn new(generation: u64, tx: mpsc::UnboundedSender<TaggedEvent>) -> Self {
        Self { generation, tx }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Deliver an event. Returns false once the controller is gone.
    pub fn emit(&self, event: TransportEvent) -> bool {
        self.tx.send(TaggedEvent::new(self.generation, event)).is_ok()
    }
}

/// Opens transports on behalf of the session controller
pub trait Connector: Send + Sync {
    /// Start connecting in the background. Every event goes through `sink`.
    fn open(&self, sink: EventSink) -> TransportHandle;
}

/// Controller-side handle to a running transport.
///
/// Dropping the handle closes the connection.
#[derive(Debug)]
pub struct TransportHandle {
    generation: u64,
    outbound: mpsc::UnboundedSender<String>,
    cancel: CancellationToken,
}

impl TransportHandle {
    pub fn new(
        generation: u64,
        outbound: mpsc::UnboundedSender<String>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            generation,
            outbound,
            cancel,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Queue a text frame for sending
    pub fn send(&self, text: String) -> Result<(), SessionError> {
        if self.cancel.is_cancelled() {
            return Err(SessionError::RequestSend("transport already closed".to_string()));
        }
        self.outbound
            .send(text)
            .map_err(|_| SessionError::RequestSend("transport task has exited".to_string()))
    }

    /// Request closure. Synchronous; the transport task finishes the close handshake.
    pub fn close(&self) {
        self.cancel.cancel();
    }
}

impl Drop for TransportHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_tags_events() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = EventSink::new(7, tx);
        assert!(sink.emit(TransportEvent::Opened));

        let event = rx.try_recv().unwrap();
        assert_eq!(event, TaggedEvent::new(7, TransportEvent::Opened));
    }

    #[test]
    fn test_sink_reports_dropped_receiver() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let sink = EventSink::new(1, tx);
        assert!(!sink.emit(TransportEvent::Opened));
    }

    #[test]
    fn test_handle_send_and_close() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let handle = TransportHandle::new(3, tx, cancel.clone());

        handle.send("hello".to_string()).unwrap();
        assert_eq!(rx.try_recv().unwrap(), "hello");

        handle.close();
        assert!(cancel.is_cancelled());
        assert!(matches!(
            handle.send("late".to_string()),
            Err(SessionError::RequestSend(_))
        ));
    }

    #[test]
    fn test_dropping_handle_cancels() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        drop(TransportHandle::new(1, tx, cancel.clone()));
        assert!(cancel.is_cancelled());
    }
}
