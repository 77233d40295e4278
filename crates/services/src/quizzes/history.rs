use chrono::{DateTime, Utc};
use std::sync::Arc;

use showfarm_core::model::{LearnerId, LessonId};
use storage::repository::{AttemptRow, AttemptRowId, QuizAttemptRepository};

use crate::error::QuizServiceError;

/// Presentation-agnostic list item for a past attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptListItem {
    pub id: AttemptRowId,
    pub submitted_at: DateTime<Utc>,
    pub correct: u32,
    pub total: u32,
    pub score_percent: u8,
    pub passed: bool,
    pub time_taken_seconds: u32,
    pub timed_out: bool,
}

impl AttemptListItem {
    #[must_use]
    pub fn from_row(row: &AttemptRow) -> Self {
        let attempt = &row.attempt;
        Self {
            id: row.id,
            submitted_at: attempt.submitted_at(),
            correct: attempt.correct_count(),
            total: attempt.total_questions(),
            score_percent: attempt.score_percent(),
            passed: attempt.passed(),
            time_taken_seconds: attempt.time_taken_seconds(),
            timed_out: attempt.timed_out(),
        }
    }
}

/// Read-side facade over a learner's quiz attempts.
#[derive(Clone)]
pub struct QuizHistoryService {
    attempts: Arc<dyn QuizAttemptRepository>,
}

impl QuizHistoryService {
    #[must_use]
    pub fn new(attempts: Arc<dyn QuizAttemptRepository>) -> Self {
        Self { attempts }
    }

    /// Most recent attempts for a lesson, newest first.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError::Storage` on repository failures.
    pub async fn list_attempts(
        &self,
        learner: &LearnerId,
        lesson_id: LessonId,
        limit: u32,
    ) -> Result<Vec<AttemptListItem>, QuizServiceError> {
        let rows = self.attempts.list_attempts(learner, lesson_id, limit).await?;
        Ok(rows.iter().map(AttemptListItem::from_row).collect())
    }

    /// Highest-scoring attempt; the earliest one wins a tie.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError::Storage` on repository failures.
    pub async fn best_attempt(
        &self,
        learner: &LearnerId,
        lesson_id: LessonId,
    ) -> Result<Option<AttemptListItem>, QuizServiceError> {
        let best = self.attempts.best_attempt(learner, lesson_id).await?;
        Ok(best.as_ref().map(AttemptListItem::from_row))
    }

    /// Number of recorded attempts for a lesson.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError::Storage` on repository failures.
    pub async fn attempt_count(
        &self,
        learner: &LearnerId,
        lesson_id: LessonId,
    ) -> Result<u64, QuizServiceError> {
        Ok(self.attempts.count_attempts(learner, lesson_id).await?)
    }
}
