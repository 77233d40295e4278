use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{AttemptId, LearnerId, LessonRef};
use crate::quiz::QuizResult;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuizAttemptError {
    #[error("attempt has no questions")]
    NoQuestions,

    #[error("correct count ({correct}) exceeds question count ({total})")]
    CorrectExceedsTotal { correct: u32, total: u32 },

    #[error("score percent out of range: {0}")]
    ScoreOutOfRange(u8),

    #[error("too many questions for a single attempt: {len}")]
    TooManyQuestions { len: usize },
}

/// Persisted record of one submitted quiz attempt.
///
/// Retakes never overwrite: each attempt is its own record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizAttempt {
    attempt_id: AttemptId,
    learner: LearnerId,
    lesson: LessonRef,
    correct_count: u32,
    total_questions: u32,
    score_percent: u8,
    passed: bool,
    time_taken_seconds: u32,
    timed_out: bool,
    answers: BTreeMap<usize, usize>,
    submitted_at: DateTime<Utc>,
}

impl QuizAttempt {
    /// Build the persisted shape for a locally scored result.
    ///
    /// # Errors
    ///
    /// Returns `QuizAttemptError::TooManyQuestions` if counts don't fit in `u32`.
    pub fn from_result(
        learner: LearnerId,
        lesson: LessonRef,
        result: &QuizResult,
        submitted_at: DateTime<Utc>,
    ) -> Result<Self, QuizAttemptError> {
        let total = result.total_questions;
        let total_questions =
            u32::try_from(total).map_err(|_| QuizAttemptError::TooManyQuestions { len: total })?;
        let correct_count = u32::try_from(result.correct_count)
            .map_err(|_| QuizAttemptError::TooManyQuestions { len: total })?;

        Self::from_persisted(
            result.attempt_id,
            learner,
            lesson,
            correct_count,
            total_questions,
            result.score_percent,
            result.passed,
            result.time_taken_seconds,
            result.timed_out,
            result.answers.clone(),
            submitted_at,
        )
    }

    /// Rehydrate an attempt from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `QuizAttemptError` if the counts or score are inconsistent.
    #[allow(clippy::too_many_arguments, clippy::fn_params_excessive_bools)]
    pub fn from_persisted(
        attempt_id: AttemptId,
        learner: LearnerId,
        lesson: LessonRef,
        correct_count: u32,
        total_questions: u32,
        score_percent: u8,
        passed: bool,
        time_taken_seconds: u32,
        timed_out: bool,
        answers: BTreeMap<usize, usize>,
        submitted_at: DateTime<Utc>,
    ) -> Result<Self, QuizAttemptError> {
        if total_questions == 0 {
            return Err(QuizAttemptError::NoQuestions);
        }
        if correct_count > total_questions {
            return Err(QuizAttemptError::CorrectExceedsTotal {
                correct: correct_count,
                total: total_questions,
            });
        }
        if score_percent > 100 {
            return Err(QuizAttemptError::ScoreOutOfRange(score_percent));
        }

        Ok(Self {
            attempt_id,
            learner,
            lesson,
            correct_count,
            total_questions,
            score_percent,
            passed,
            time_taken_seconds,
            timed_out,
            answers,
            submitted_at,
        })
    }

    #[must_use]
    pub fn attempt_id(&self) -> AttemptId {
        self.attempt_id
    }

    #[must_use]
    pub fn learner(&self) -> &LearnerId {
        &self.learner
    }

    #[must_use]
    pub fn lesson(&self) -> LessonRef {
        self.lesson
    }

    #[must_use]
    pub fn correct_count(&self) -> u32 {
        self.correct_count
    }

    #[must_use]
    pub fn total_questions(&self) -> u32 {
        self.total_questions
    }

    #[must_use]
    pub fn score_percent(&self) -> u8 {
        self.score_percent
    }

    #[must_use]
    pub fn passed(&self) -> bool {
        self.passed
    }

    #[must_use]
    pub fn time_taken_seconds(&self) -> u32 {
        self.time_taken_seconds
    }

    #[must_use]
    pub fn timed_out(&self) -> bool {
        self.timed_out
    }

    #[must_use]
    pub fn answers(&self) -> &BTreeMap<usize, usize> {
        &self.answers
    }

    #[must_use]
    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }
}

/// A lesson the learner has completed by passing its quiz.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonCompletion {
    pub learner: LearnerId,
    pub lesson: LessonRef,
    pub completed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ids::{CourseId, LessonId, ModuleId};
    use crate::time::fixed_now;

    fn lesson() -> LessonRef {
        LessonRef::new(CourseId::new(1), ModuleId::new(2), LessonId::new(3))
    }

    #[test]
    fn rejects_correct_above_total() {
        let err = QuizAttempt::from_persisted(
            AttemptId::generate(),
            LearnerId::new("u1"),
            lesson(),
            6,
            5,
            100,
            true,
            10,
            false,
            BTreeMap::new(),
            fixed_now(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            QuizAttemptError::CorrectExceedsTotal {
                correct: 6,
                total: 5
            }
        );
    }

    #[test]
    fn converts_result() {
        let mut answers = BTreeMap::new();
        answers.insert(0, 1);
        answers.insert(1, 2);
        let result = QuizResult {
            attempt_id: AttemptId::generate(),
            correct_count: 1,
            total_questions: 2,
            score_percent: 50,
            passed: false,
            time_taken_seconds: 42,
            per_question_correctness: vec![true, false],
            answers,
            timed_out: false,
        };

        let attempt =
            QuizAttempt::from_result(LearnerId::new("u1"), lesson(), &result, fixed_now())
                .unwrap();
        assert_eq!(attempt.attempt_id(), result.attempt_id);
        assert_eq!(attempt.correct_count(), 1);
        assert_eq!(attempt.total_questions(), 2);
        assert_eq!(attempt.time_taken_seconds(), 42);
        assert_eq!(attempt.answers().len(), 2);
    }
}
