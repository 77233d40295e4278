use std::sync::Arc;

use tracing::{info, warn};

use showfarm_core::Clock;
use showfarm_core::model::{AttemptId, LearnerId, LessonRef, QuizAttempt};
use showfarm_core::quiz::QuizResult;
use storage::repository::{AttemptRowId, CourseProgressRepository, QuizAttemptRepository};

/// What happened when a quiz result was handed to the backing stores.
///
/// `passed` and `score_percent` always reflect the local result, whether or
/// not persistence succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportOutcome {
    pub attempt_id: AttemptId,
    pub passed: bool,
    pub score_percent: u8,
    pub persisted: bool,
    pub record_id: Option<AttemptRowId>,
    pub lesson_completed: bool,
    pub warnings: Vec<String>,
}

/// Persists quiz results and signals lesson completion, best-effort.
///
/// Never fails: storage errors are logged and returned as warnings so the
/// learner's local result is never blocked on the backing store.
#[derive(Clone)]
pub struct ResultReporter {
    clock: Clock,
    attempts: Arc<dyn QuizAttemptRepository>,
    progress: Arc<dyn CourseProgressRepository>,
}

impl ResultReporter {
    #[must_use]
    pub fn new(
        clock: Clock,
        attempts: Arc<dyn QuizAttemptRepository>,
        progress: Arc<dyn CourseProgressRepository>,
    ) -> Self {
        Self {
            clock,
            attempts,
            progress,
        }
    }

    /// Record `result` for `learner` and, if it passed, mark `lesson` complete.
    pub async fn report(
        &self,
        learner: &LearnerId,
        lesson: LessonRef,
        result: &QuizResult,
    ) -> ReportOutcome {
        let now = self.clock.now();
        let mut outcome = ReportOutcome {
            attempt_id: result.attempt_id,
            passed: result.passed,
            score_percent: result.score_percent,
            persisted: false,
            record_id: None,
            lesson_completed: false,
            warnings: Vec::new(),
        };

        match QuizAttempt::from_result(learner.clone(), lesson, result, now) {
            Ok(attempt) => match self.attempts.record_quiz_attempt(&attempt).await {
                Ok(id) => {
                    outcome.persisted = true;
                    outcome.record_id = Some(id);
                }
                Err(err) => {
                    warn!(%err, attempt_id = %result.attempt_id, "failed to persist quiz attempt");
                    outcome
                        .warnings
                        .push(format!("quiz attempt not saved: {err}"));
                }
            },
            Err(err) => {
                warn!(%err, attempt_id = %result.attempt_id, "quiz result cannot be recorded");
                outcome
                    .warnings
                    .push(format!("quiz attempt not saved: {err}"));
            }
        }

        if result.passed {
            match self
                .progress
                .mark_lesson_complete(learner, &lesson, now)
                .await
            {
                Ok(()) => outcome.lesson_completed = true,
                Err(err) => {
                    warn!(%err, lesson_id = %lesson.lesson_id, "failed to mark lesson complete");
                    outcome
                        .warnings
                        .push(format!("lesson completion not saved: {err}"));
                }
            }
        }

        info!(
            attempt_id = %outcome.attempt_id,
            persisted = outcome.persisted,
            lesson_completed = outcome.lesson_completed,
            "quiz result reported"
        );
        outcome
    }
}
