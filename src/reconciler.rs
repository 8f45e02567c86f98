// src/reconciler.rs
// Folds answers that arrive in any order into a view ordered by question number

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// One answered question, keyed by its 1-based number
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerRecord {
    pub question_number: u32,
    /// Question text as echoed by the service
    pub question: String,
    pub answer: String,
    pub received_at: Option<DateTime<Utc>>,
}

/// Terminal markdown summary of a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryRecord {
    pub text: String,
    pub received_at: Option<DateTime<Utc>>,
}

/// Answer map, pending set and summary for the current session.
///
/// Answers live in a `BTreeMap`, so iteration order is question order no
/// matter how the frames were delivered.
#[derive(Debug, Clone, Default)]
pub struct ResultReconciler {
    answers: BTreeMap<u32, AnswerRecord>,
    pending: BTreeSet<u32>,
    summary: Option<SummaryRecord>,
}

impl ResultReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all results and mark questions `1..=question_count` as pending
    pub fn reset(&mut self, question_count: usize) {
        self.answers.clear();
        self.summary = None;
        self.pending = (1..=question_count as u32).collect();
    }

    /// Insert or overwrite the answer for `question_number`
    pub fn record_answer(
        &mut self,
        question_number: u32,
        question: impl Into<String>,
        answer: impl Into<String>,
        received_at: Option<DateTime<Utc>>,
    ) {
        let record = AnswerRecord {
            question_number,
            question: question.into(),
            answer: answer.into(),
            received_at,
        };
        if self.answers.insert(question_number, record).is_some() {
            tracing::debug!("Answer for question {} overwritten", question_number);
        }
        self.pending.remove(&question_number);
    }

    /// Store the summary, replacing any earlier one
    pub fn record_summary(&mut self, text: impl Into<String>, received_at: Option<DateTime<Utc>>) {
        if self.summary.is_some() {
            tracing::debug!("Summary received again, replacing previous one");
        }
        self.summary = Some(SummaryRecord {
            text: text.into(),
            received_at,
        });
    }

    /// All answers, ascending by question number
    pub fn ordered_answers(&self) -> Vec<&AnswerRecord> {
        self.answers.values().collect()
    }

    pub fn answer_count(&self) -> usize {
        self.answers.len()
    }

    /// Question numbers still waiting for an answer
    pub fn pending_numbers(&self) -> &BTreeSet<u32> {
        &self.pending
    }

    pub fn summary(&self) -> Option<&SummaryRecord> {
        self.summary.as_ref()
    }
}
