// src/transport/ws.rs
// WebSocket transport backed by tokio-tungstenite

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{Connector, EventSink, TransportEvent, TransportHandle};

/// Connects to the advisory service over `ws://` or `wss://`
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: String,
}

impl WsConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Connector for WsConnector {
    fn open(&self, sink: EventSink) -> TransportHandle {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let generation = sink.generation();

        tokio::spawn(run_socket(self.url.clone(), sink, outbound_rx, cancel.clone()));

        TransportHandle::new(generation, outbound_tx, cancel)
    }
}

/// Owns the socket for one session until it closes, fails or is cancelled
async fn run_socket(
    url: String,
    sink: EventSink,
    mut outbound_rx: mpsc::UnboundedReceiver<String>,
    cancel: CancellationToken,
) {
    let generation = sink.generation();
    debug!("[transport {}] connecting to {}", generation, url);

    let connected = tokio::select! {
        _ = cancel.cancelled() => {
            debug!("[transport {}] cancelled before open", generation);
            return;
        }
        result = connect_async(url.as_str()) => result,
    };

    let ws_stream = match connected {
        Ok((ws_stream, _response)) => ws_stream,
        Err(e) => {
            sink.emit(TransportEvent::Error(format!(
                "Failed to connect to {}: {}",
                url, e
            )));
            return;
        }
    };

    let (mut sender, mut receiver) = ws_stream.split();

    if !sink.emit(TransportEvent::Opened) {
        let _ = sender.send(Message::Close(None)).await;
        return;
    }

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("[transport {}] closing on request", generation);
                let frame = CloseFrame {
                    code: CloseCode::Normal,
                    reason: "client closing".into(),
                };
                let _ = sender.send(Message::Close(Some(frame))).await;
                break;
            }
            outbound = outbound_rx.recv() => match outbound {
                Some(text) => {
                    if let Err(e) = sender.send(Message::Text(text.into())).await {
                        sink.emit(TransportEvent::Error(format!("Failed to send frame: {}", e)));
                        break;
                    }
                }
                None => {
                    // handle dropped without an explicit close
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    if !sink.emit(TransportEvent::Message(text.as_str().to_owned())) {
                        break;
                    }
                }
                Some(Ok(Message::Binary(bytes))) => {
                    let event = match String::from_utf8(bytes.to_vec()) {
                        Ok(text) => TransportEvent::Message(text),
                        Err(_) => TransportEvent::InvalidFrame { len: bytes.len() },
                    };
                    if !sink.emit(event) {
                        break;
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    let (code, reason) = match frame {
                        Some(frame) => (Some(u16::from(frame.code)), frame.reason.as_str().to_owned()),
                        None => (None, String::new()),
                    };
                    // flush the close reply queued by the read half
                    let _ = sender.close().await;
                    sink.emit(TransportEvent::Closed { code, reason });
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    sink.emit(TransportEvent::Error(e.to_string()));
                    break;
                }
                None => {
                    sink.emit(TransportEvent::Closed {
                        code: None,
                        reason: "stream ended".to_string(),
                    });
                    break;
                }
            },
        }
    }

    debug!("[transport {}] finished", generation);
}
