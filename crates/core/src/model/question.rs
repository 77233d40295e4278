use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Every question offers exactly this many options.
pub const OPTIONS_PER_QUESTION: usize = 4;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question text cannot be empty")]
    EmptyText,

    #[error("expected {OPTIONS_PER_QUESTION} options, got {0}")]
    WrongOptionCount(usize),

    #[error("option {0} cannot be empty")]
    EmptyOption(usize),

    #[error("correct option index {0} is out of range")]
    CorrectOptionOutOfRange(usize),
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// Unvalidated question as authored in lesson content.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionDraft {
    pub text: String,
    pub options: Vec<String>,
    pub correct_option_index: usize,
}

impl QuestionDraft {
    pub fn new(
        text: impl Into<String>,
        options: Vec<String>,
        correct_option_index: usize,
    ) -> Self {
        Self {
            text: text.into(),
            options,
            correct_option_index,
        }
    }

    /// Validate the draft into an immutable `Question`.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if the text is blank or the options don't form a
    /// four-way choice with an in-range correct answer.
    pub fn validate(self) -> Result<Question, QuestionError> {
        let options: [String; OPTIONS_PER_QUESTION] = self
            .options
            .try_into()
            .map_err(|rest: Vec<String>| QuestionError::WrongOptionCount(rest.len()))?;
        Question::new(self.text, options, self.correct_option_index)
    }
}

/// A multiple-choice question with one correct option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    text: String,
    options: [String; OPTIONS_PER_QUESTION],
    correct_option_index: usize,
}

impl Question {
    /// # Errors
    ///
    /// Returns `QuestionError` if the text or an option is blank, or if
    /// `correct_option_index` doesn't point at an option.
    pub fn new(
        text: impl Into<String>,
        options: [String; OPTIONS_PER_QUESTION],
        correct_option_index: usize,
    ) -> Result<Self, QuestionError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(QuestionError::EmptyText);
        }
        if let Some(pos) = options.iter().position(|o| o.trim().is_empty()) {
            return Err(QuestionError::EmptyOption(pos));
        }
        if correct_option_index >= OPTIONS_PER_QUESTION {
            return Err(QuestionError::CorrectOptionOutOfRange(correct_option_index));
        }

        Ok(Self {
            text,
            options,
            correct_option_index,
        })
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn options(&self) -> &[String; OPTIONS_PER_QUESTION] {
        &self.options
    }

    #[must_use]
    pub fn correct_option_index(&self) -> usize {
        self.correct_option_index
    }

    /// True when `option_index` is the correct choice.
    #[must_use]
    pub fn is_correct(&self, option_index: usize) -> bool {
        option_index == self.correct_option_index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> Vec<String> {
        vec!["a".into(), "b".into(), "c".into(), "d".into()]
    }

    #[test]
    fn draft_validates() {
        let q = QuestionDraft::new("What is 2 + 2?", opts(), 3)
            .validate()
            .unwrap();
        assert_eq!(q.text(), "What is 2 + 2?");
        assert!(q.is_correct(3));
        assert!(!q.is_correct(0));
    }

    #[test]
    fn rejects_three_options() {
        let mut options = opts();
        options.pop();
        let err = QuestionDraft::new("Q", options, 0).validate().unwrap_err();
        assert_eq!(err, QuestionError::WrongOptionCount(3));
    }

    #[test]
    fn rejects_blank_text_and_options() {
        let err = QuestionDraft::new("  ", opts(), 0).validate().unwrap_err();
        assert_eq!(err, QuestionError::EmptyText);

        let mut options = opts();
        options[2] = " ".into();
        let err = QuestionDraft::new("Q", options, 0).validate().unwrap_err();
        assert_eq!(err, QuestionError::EmptyOption(2));
    }

    #[test]
    fn rejects_out_of_range_answer() {
        let err = QuestionDraft::new("Q", opts(), 4).validate().unwrap_err();
        assert_eq!(err, QuestionError::CorrectOptionOutOfRange(4));
    }
}
