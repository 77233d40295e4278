use std::sync::Arc;

use crate::error::QuizError;
use crate::model::{Question, QuizDefinition, QuizDefinitionError};

/// Ordered, read-only questions for one quiz.
///
/// Cloning is cheap; all clones share the same questions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionBank {
    questions: Arc<[Question]>,
}

impl QuestionBank {
    /// Load the questions of a quiz definition.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::InvalidDefinition` if the definition has no questions.
    pub fn load(definition: &QuizDefinition) -> Result<Self, QuizError> {
        Self::from_questions(definition.questions().to_vec())
    }

    pub(crate) fn from_questions(questions: Vec<Question>) -> Result<Self, QuizError> {
        if questions.is_empty() {
            return Err(QuizDefinitionError::NoQuestions.into());
        }
        Ok(Self {
            questions: questions.into(),
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    /// Always false for a loaded bank; kept for API symmetry with `len`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn iter(&self) -> impl Iterator<Item = &Question> {
        self.questions.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::test_support::quiz_with_answers;

    #[test]
    fn load_preserves_order() {
        let quiz = quiz_with_answers(&[0, 1, 2]);
        let bank = QuestionBank::load(&quiz).unwrap();
        assert_eq!(bank.len(), 3);
        let correct: Vec<usize> = bank.iter().map(Question::correct_option_index).collect();
        assert_eq!(correct, vec![0, 1, 2]);
        assert!(bank.get(3).is_none());
    }

    #[test]
    fn empty_bank_is_invalid() {
        let err = QuestionBank::from_questions(Vec::new()).unwrap_err();
        assert_eq!(
            err,
            QuizError::InvalidDefinition(QuizDefinitionError::NoQuestions)
        );
    }
}
