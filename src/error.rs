// src/error.rs
// Error types for submission, session lifecycle and wire parsing

use std::time::Duration;

use serde::Serialize;

/// Input rejected before any transport is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationError {
    #[error("Background must not be empty")]
    EmptyBackground,

    #[error("At least one non-empty question is required")]
    NoQuestions,
}

/// Terminal failures of a running session, surfaced to the user
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum SessionError {
    #[error("Connection was not established within {0:?}")]
    ConnectionTimeout(Duration),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Connection closed abnormally ({}){}", format_code(.code), format_reason(.reason))]
    AbnormalClosure { code: Option<u16>, reason: String },

    #[error("Failed to send request: {0}")]
    RequestSend(String),
}

fn format_code(code: &Option<u16>) -> String {
    match code {
        Some(code) => format!("code {}", code),
        None => "no close frame".to_string(),
    }
}

fn format_reason(reason: &str) -> String {
    if reason.is_empty() {
        String::new()
    } else {
        format!(": {}", reason)
    }
}

/// A frame that could not be read as any known message shape.
///
/// Diagnostic only: a bad frame never ends a session.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Message has no string \"type\" field")]
    MissingType,

    #[error("Invalid \"{kind}\" message: {source}")]
    InvalidField {
        kind: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Question number must be at least 1")]
    InvalidQuestionNumber,

    #[error("Binary frame of {len} byte(s) is not valid UTF-8")]
    NonUtf8Frame { len: usize },
}
