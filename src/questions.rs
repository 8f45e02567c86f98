// src/questions.rs
// Ordered, editable list of questions for the next submission

use serde::{Deserialize, Serialize};

/// Question set editor. Positions are 0-based; display numbers are position + 1.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestionSet {
    items: Vec<String>,
}

impl QuestionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a question at the end
    pub fn push(&mut self, text: impl Into<String>) {
        self.items.push(text.into());
    }

    /// Remove the question at `index`, returning it if the index was valid
    pub fn remove(&mut self, index: usize) -> Option<String> {
        if index < self.items.len() {
            Some(self.items.remove(index))
        } else {
            None
        }
    }

    /// Replace the question at `index`. Returns false when out of range.
    pub fn update(&mut self, index: usize, text: impl Into<String>) -> bool {
        match self.items.get_mut(index) {
            Some(slot) => {
                *slot = text.into();
                true
            }
            None => false,
        }
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.items.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.items
    }

    /// Trimmed questions with blanks dropped, in editor order
    pub fn non_empty(&self) -> Vec<String> {
        normalize_questions(&self.items)
    }
}

impl<S: Into<String>> FromIterator<S> for QuestionSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().map(Into::into).collect(),
        }
    }
}

impl<S: Into<String>> Extend<S> for QuestionSet {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        self.items.extend(iter.into_iter().map(Into::into));
    }
}

/// Trim every question and drop the ones left empty
pub fn normalize_questions<S: AsRef<str>>(questions: &[S]) -> Vec<String> {
    questions
        .iter()
        .map(|q| q.as_ref().trim())
        .filter(|q| !q.is_empty())
        .map(str::to_string)
        .collect()
}
