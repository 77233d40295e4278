use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::debug;

use showfarm_core::model::{LearnerId, LessonRef, QuizDefinition};
use showfarm_core::quiz::{QuizSession, Scheduler};

use crate::error::QuizServiceError;
use crate::reporter::{ReportOutcome, ResultReporter};

/// Hosting context for quiz sessions.
///
/// Owns the collaborators a session needs (countdown scheduler and result
/// reporter) so the session itself stays free of I/O.
#[derive(Clone)]
pub struct QuizService {
    scheduler: Arc<dyn Scheduler>,
    reporter: Arc<ResultReporter>,
}

impl QuizService {
    #[must_use]
    pub fn new(scheduler: Arc<dyn Scheduler>, reporter: Arc<ResultReporter>) -> Self {
        Self {
            scheduler,
            reporter,
        }
    }

    /// Open a session for `learner` on `lesson`.
    ///
    /// Every submission of the session, including ones forced by the
    /// countdown, is reported in the background; outcomes arrive on the
    /// returned handle. Must be called inside a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError::LessonMismatch` if the quiz belongs to another
    /// lesson, `QuizServiceError::Quiz` if the definition can't be loaded, or
    /// `QuizServiceError::NoRuntime` outside a tokio runtime.
    pub fn open(
        &self,
        learner: LearnerId,
        lesson: LessonRef,
        definition: &QuizDefinition,
    ) -> Result<QuizHandle, QuizServiceError> {
        if definition.lesson_id() != lesson.lesson_id {
            return Err(QuizServiceError::LessonMismatch {
                quiz: definition.lesson_id(),
                requested: lesson.lesson_id,
            });
        }
        let runtime = Handle::try_current().map_err(|_| QuizServiceError::NoRuntime)?;
        let session = QuizSession::new(definition, Arc::clone(&self.scheduler))?;

        let (tx, rx) = mpsc::unbounded_channel();
        let reporter = Arc::clone(&self.reporter);
        let report_learner = learner.clone();
        session.set_on_submitted(move |result| {
            let reporter = Arc::clone(&reporter);
            let learner = report_learner.clone();
            let result = result.clone();
            let tx = tx.clone();
            runtime.spawn(async move {
                let outcome = reporter.report(&learner, lesson, &result).await;
                // The handle may already be gone; the record is saved regardless.
                let _ = tx.send(outcome);
            });
        });

        debug!(learner = %learner, lesson_id = %lesson.lesson_id, "quiz session opened");
        Ok(QuizHandle {
            learner,
            lesson,
            session,
            reports: rx,
        })
    }
}

/// An open quiz session plus the stream of its report outcomes.
///
/// Dropping the handle cancels any running countdown.
pub struct QuizHandle {
    learner: LearnerId,
    lesson: LessonRef,
    session: QuizSession,
    reports: mpsc::UnboundedReceiver<ReportOutcome>,
}

impl QuizHandle {
    #[must_use]
    pub fn session(&self) -> &QuizSession {
        &self.session
    }

    #[must_use]
    pub fn learner(&self) -> &LearnerId {
        &self.learner
    }

    #[must_use]
    pub fn lesson(&self) -> LessonRef {
        self.lesson
    }

    /// Wait for the next background report to finish.
    pub async fn next_report(&mut self) -> Option<ReportOutcome> {
        self.reports.recv().await
    }

    /// Take a finished report without waiting.
    pub fn try_next_report(&mut self) -> Option<ReportOutcome> {
        self.reports.try_recv().ok()
    }
}
