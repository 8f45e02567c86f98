//! Wire protocol spoken with the advisory service
//!
//! One outbound `process_questions` request per session, followed by any
//! number of inbound frames tagged by `type`:
//! - `answer`: one per question, in no guaranteed order
//! - `summary`: terminal markdown summary
//! - anything else: tolerated and ignored
//!
//! Every inbound frame may carry an advisory `sent_in_order` flag.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProtocolError;

/// Model identifier sent when none is configured
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Messages sent from the client to the service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    ProcessQuestions {
        background: String,
        /// Ordered; position i is question number i + 1
        questions: Vec<String>,
        model: String,
    },
}

impl ClientMessage {
    pub fn process_questions(
        background: impl Into<String>,
        questions: Vec<String>,
        model: impl Into<String>,
    ) -> Self {
        ClientMessage::ProcessQuestions {
            background: background.into(),
            questions,
            model: model.into(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// A classified inbound frame
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    /// Server claim that results were sent in question order. Never used for ordering.
    pub sent_in_order: Option<bool>,
    pub body: InboundBody,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InboundBody {
    Answer(AnswerMessage),
    Summary(SummaryMessage),
    /// Unrecognized `type` value, kept for diagnostics
    Unknown(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnswerMessage {
    pub question_number: u32,
    pub question: String,
    pub answer: String,
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryMessage {
    pub summary: String,
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct RawAnswer {
    question_number: u32,
    question: String,
    answer: String,
    #[serde(default)]
    timestamp: Option<Value>,
}

#[derive(Deserialize)]
struct RawSummary {
    summary: String,
    #[serde(default)]
    timestamp: Option<Value>,
}

/// Parse a text frame into an [`InboundMessage`]
pub fn parse_message(text: &str) -> Result<InboundMessage, ProtocolError> {
    let json: Value = serde_json::from_str(text)?;

    let kind = json
        .get("type")
        .and_then(Value::as_str)
        .ok_or(ProtocolError::MissingType)?
        .to_string();

    // Non-boolean values are not a hint at all
    let sent_in_order = json.get("sent_in_order").and_then(Value::as_bool);

    let body = match kind.as_str() {
        "answer" => {
            let raw: RawAnswer = serde_json::from_value(json)
                .map_err(|source| ProtocolError::InvalidField { kind, source })?;
            if raw.question_number == 0 {
                return Err(ProtocolError::InvalidQuestionNumber);
            }
            InboundBody::Answer(AnswerMessage {
                question_number: raw.question_number,
                question: raw.question,
                answer: raw.answer,
                timestamp: raw.timestamp.as_ref().and_then(timestamp_from_value),
            })
        }
        "summary" => {
            let raw: RawSummary = serde_json::from_value(json)
                .map_err(|source| ProtocolError::InvalidField { kind, source })?;
            InboundBody::Summary(SummaryMessage {
                summary: raw.summary,
                timestamp: raw.timestamp.as_ref().and_then(timestamp_from_value),
            })
        }
        _ => InboundBody::Unknown(kind),
    };

    Ok(InboundMessage { sent_in_order, body })
}

fn timestamp_from_value(value: &Value) -> Option<DateTime<Utc>> {
    let raw = value.as_str()?;
    let parsed = parse_timestamp(raw);
    if parsed.is_none() {
        tracing::debug!("Ignoring unparseable timestamp: {}", raw);
    }
    parsed
}

/// Parse an ISO-8601 timestamp. Values without an offset are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_request_wire_shape() {
        let msg = ClientMessage::process_questions(
            "Lease classification for Co A",
            vec!["Is this a finance lease?".to_string()],
            DEFAULT_MODEL,
        );
        let json: Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(json["type"], "process_questions");
        assert_eq!(json["background"], "Lease classification for Co A");
        assert_eq!(json["questions"][0], "Is this a finance lease?");
        assert_eq!(json["model"], "gpt-4o-mini");
    }

    #[test]
    fn test_parse_answer() {
        let json = r#"{"type":"answer","question_number":2,"question":"Rate?","answer":"5%","timestamp":"2024-05-01T12:30:00Z"}"#;
        let msg = parse_message(json).unwrap();
        assert_eq!(msg.sent_in_order, None);
        match msg.body {
            InboundBody::Answer(answer) => {
                assert_eq!(answer.question_number, 2);
                assert_eq!(answer.question, "Rate?");
                assert_eq!(answer.answer, "5%");
                assert_eq!(answer.timestamp.unwrap().hour(), 12);
            }
            other => panic!("Expected answer, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_summary_with_hint() {
        let json = r##"{"type":"summary","summary":"# Done","sent_in_order":false}"##;
        let msg = parse_message(json).unwrap();
        assert_eq!(msg.sent_in_order, Some(false));
        assert!(matches!(msg.body, InboundBody::Summary(ref s) if s.summary == "# Done"));
    }

    #[test]
    fn test_unknown_type_is_tolerated() {
        let msg = parse_message(r#"{"type":"progress","sent_in_order":true}"#).unwrap();
        assert_eq!(msg.sent_in_order, Some(true));
        assert_eq!(msg.body, InboundBody::Unknown("progress".to_string()));
    }

    #[test]
    fn test_non_boolean_hint_is_ignored() {
        let msg = parse_message(r#"{"type":"progress","sent_in_order":"yes"}"#).unwrap();
        assert_eq!(msg.sent_in_order, None);
    }

    #[test]
    fn test_malformed_frames() {
        assert!(matches!(parse_message("not json"), Err(ProtocolError::InvalidJson(_))));
        assert!(matches!(parse_message(r#"{"answer":"x"}"#), Err(ProtocolError::MissingType)));
        assert!(matches!(parse_message("[1,2]"), Err(ProtocolError::MissingType)));
        assert!(matches!(
            parse_message(r#"{"type":"answer","question":"q","answer":"a"}"#),
            Err(ProtocolError::InvalidField { .. })
        ));
        assert!(matches!(
            parse_message(r#"{"type":"answer","question_number":-1,"question":"q","answer":"a"}"#),
            Err(ProtocolError::InvalidField { .. })
        ));
        assert!(matches!(
            parse_message(r#"{"type":"answer","question_number":0,"question":"q","answer":"a"}"#),
            Err(ProtocolError::InvalidQuestionNumber)
        ));
        assert!(matches!(
            parse_message(r#"{"type":"summary"}"#),
            Err(ProtocolError::InvalidField { .. })
        ));
    }

    #[test]
    fn test_bad_timestamp_does_not_reject_answer() {
        let json = r#"{"type":"answer","question_number":1,"question":"q","answer":"a","timestamp":"yesterday"}"#;
        match parse_message(json).unwrap().body {
            InboundBody::Answer(answer) => assert_eq!(answer.timestamp, None),
            other => panic!("Expected answer, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let naive = parse_timestamp("2024-05-01T12:30:00.123456").unwrap();
        assert_eq!(naive.minute(), 30);

        let spaced = parse_timestamp("2024-05-01 08:00:00").unwrap();
        assert_eq!(spaced.hour(), 8);

        let offset = parse_timestamp("2024-05-01T12:30:00+02:00").unwrap();
        assert_eq!(offset.hour(), 10);
        assert_eq!(offset.day(), 1);

        assert!(parse_timestamp("05/01/2024").is_none());
    }
}
