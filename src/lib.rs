// src/lib.rs

pub mod cli;
pub mod config;
pub mod error;
pub mod protocol;
pub mod questions;
pub mod reconciler;
pub mod session;
pub mod transport;

// Re-export commonly used items
pub use error::{ProtocolError, SessionError, ValidationError};
pub use questions::QuestionSet;
pub use reconciler::{AnswerRecord, ResultReconciler, SummaryRecord};
pub use session::{SessionController, SessionSettings, SessionState, SessionUpdate, SessionView};
pub use transport::{Connector, TransportEvent, WsConnector};
