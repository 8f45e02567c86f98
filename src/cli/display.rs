// src/cli/display.rs
// Renders session updates as they stream in, then the final answers

use std::io::{self, Write};

use super::args::OutputFormat;
use crate::session::{SessionUpdate, SessionView};

/// Streaming display handler
pub struct StreamingDisplay<W: Write> {
    out: W,
    output_format: OutputFormat,
}

impl<W: Write> StreamingDisplay<W> {
    pub fn new(out: W, output_format: OutputFormat) -> Self {
        Self { out, output_format }
    }

    /// Handle one update while the session is running
    pub fn handle_update(&mut self, update: &SessionUpdate, view: &SessionView) -> io::Result<()> {
        match self.output_format {
            OutputFormat::Text => self.handle_text_update(update, view),
            OutputFormat::Json => Ok(()),
            OutputFormat::StreamJson => self.handle_stream_json_update(update),
        }
    }

    /// Print the final state of the session
    pub fn finish(&mut self, view: &SessionView) -> io::Result<()> {
        match self.output_format {
            OutputFormat::Text => self.finish_text(view),
            OutputFormat::Json => {
                let json = serde_json::to_string_pretty(view).map_err(io::Error::other)?;
                writeln!(self.out, "{}", json)
            }
            OutputFormat::StreamJson => {
                let json = serde_json::to_string(view).map_err(io::Error::other)?;
                writeln!(self.out, "{}", json)
            }
        }?;
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn handle_text_update(&mut self, update: &SessionUpdate, view: &SessionView) -> io::Result<()> {
        match update {
            SessionUpdate::RequestSent => {
                writeln!(
                    self.out,
                    "Connected. Waiting for {} answer(s)...",
                    view.questions.len()
                )?;
            }
            SessionUpdate::AnswerRecorded { question_number } => {
                if view.pending.is_empty() {
                    writeln!(self.out, "  Q{} answered", question_number)?;
                } else {
                    writeln!(
                        self.out,
                        "  Q{} answered (still typing: {})",
                        question_number,
                        format_numbers(&view.pending)
                    )?;
                }
            }
            SessionUpdate::Completed => {
                writeln!(self.out, "Summary received.")?;
            }
            SessionUpdate::Failed { error } => {
                writeln!(self.out, "Error: {}", error)?;
            }
            // diagnostics only; the observer logs them
            SessionUpdate::Malformed { .. }
            | SessionUpdate::Unknown { .. }
            | SessionUpdate::Closed
            | SessionUpdate::Stale
            | SessionUpdate::Ignored => {}
        }
        self.out.flush()
    }

    fn handle_stream_json_update(&mut self, update: &SessionUpdate) -> io::Result<()> {
        if matches!(update, SessionUpdate::Stale | SessionUpdate::Ignored) {
            return Ok(());
        }
        let json = serde_json::to_string(update).map_err(io::Error::other)?;
        writeln!(self.out, "{}", json)?;
        self.out.flush()
    }

    fn finish_text(&mut self, view: &SessionView) -> io::Result<()> {
        writeln!(self.out)?;
        for answer in &view.answers {
            writeln!(self.out, "Q{}. {}", answer.question_number, answer.question)?;
            writeln!(self.out, "{}", answer.answer)?;
            writeln!(self.out)?;
        }

        for number in &view.pending {
            let question = view
                .questions
                .get(*number as usize - 1)
                .map(String::as_str)
                .unwrap_or("");
            writeln!(self.out, "Q{}. {}", number, question)?;
            writeln!(self.out, "(no answer received)")?;
            writeln!(self.out)?;
        }

        if let Some(summary) = &view.summary {
            writeln!(self.out, "Summary")?;
            writeln!(self.out, "-------")?;
            writeln!(self.out, "{}", summary.text)?;
        }

        if view.ordering_hint == Some(false) {
            writeln!(self.out)?;
            writeln!(self.out, "(answers arrived out of order and were re-sorted)")?;
        }

        if let Some(failure) = &view.failure {
            writeln!(self.out)?;
            writeln!(self.out, "Session failed: {}", failure)?;
        }

        Ok(())
    }
}

fn format_numbers(numbers: &[u32]) -> String {
    numbers
        .iter()
        .map(|n| n.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
