use std::collections::BTreeMap;

use crate::error::QuizError;
use crate::model::OPTIONS_PER_QUESTION;

/// Selected option per question for one attempt.
///
/// Keys are 0-based question indices. Selections may be overwritten but are
/// only removed by `clear`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerTracker {
    total_questions: usize,
    selections: BTreeMap<usize, usize>,
}

impl AnswerTracker {
    #[must_use]
    pub fn new(total_questions: usize) -> Self {
        Self {
            total_questions,
            selections: BTreeMap::new(),
        }
    }

    /// Record or overwrite the selection for `index`.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::OutOfRange` if the question or option index is out of bounds.
    pub fn set_answer(&mut self, index: usize, option_index: usize) -> Result<(), QuizError> {
        if index >= self.total_questions {
            return Err(QuizError::OutOfRange {
                what: "question",
                index,
                len: self.total_questions,
            });
        }
        if option_index >= OPTIONS_PER_QUESTION {
            return Err(QuizError::OutOfRange {
                what: "option",
                index: option_index,
                len: OPTIONS_PER_QUESTION,
            });
        }
        self.selections.insert(index, option_index);
        Ok(())
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<usize> {
        self.selections.get(&index).copied()
    }

    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.selections.len()
    }

    #[must_use]
    pub fn is_complete(&self, total_questions: usize) -> bool {
        self.completed_count() == total_questions
    }

    #[must_use]
    pub fn total_questions(&self) -> usize {
        self.total_questions
    }

    #[must_use]
    pub fn selections(&self) -> &BTreeMap<usize, usize> {
        &self.selections
    }

    pub fn clear(&mut self) {
        self.selections.clear();
    }
}
