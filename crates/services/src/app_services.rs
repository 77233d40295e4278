use std::sync::Arc;

use showfarm_core::quiz::Scheduler;
use storage::repository::Storage;

use crate::error::AppServicesError;
use crate::quizzes::{CourseProgressService, QuizHistoryService, QuizService};
use crate::reporter::ResultReporter;
use crate::scheduler::TokioScheduler;
use crate::Clock;

/// Assembles app-facing services over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    quiz: Arc<QuizService>,
    history: Arc<QuizHistoryService>,
    progress: Arc<CourseProgressService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage, ticking on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails or no tokio
    /// runtime is running.
    pub async fn new_sqlite(db_url: &str, clock: Clock) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        let scheduler = TokioScheduler::current().map_err(|_| AppServicesError::NoRuntime)?;
        let scheduler: Arc<dyn Scheduler> = Arc::new(scheduler);
        Ok(Self::from_storage(&storage, clock, scheduler))
    }

    /// Build services over in-memory storage with the given scheduler.
    #[must_use]
    pub fn in_memory(clock: Clock, scheduler: Arc<dyn Scheduler>) -> Self {
        Self::from_storage(&Storage::in_memory(), clock, scheduler)
    }

    #[must_use]
    pub fn from_storage(storage: &Storage, clock: Clock, scheduler: Arc<dyn Scheduler>) -> Self {
        let reporter = Arc::new(ResultReporter::new(
            clock,
            Arc::clone(&storage.attempts),
            Arc::clone(&storage.progress),
        ));
        let quiz = Arc::new(QuizService::new(scheduler, reporter));
        let history = Arc::new(QuizHistoryService::new(Arc::clone(&storage.attempts)));
        let progress = Arc::new(CourseProgressService::new(Arc::clone(&storage.progress)));

        Self {
            quiz,
            history,
            progress,
        }
    }

    #[must_use]
    pub fn quiz(&self) -> Arc<QuizService> {
        Arc::clone(&self.quiz)
    }

    #[must_use]
    pub fn history(&self) -> Arc<QuizHistoryService> {
        Arc::clone(&self.history)
    }

    #[must_use]
    pub fn progress(&self) -> Arc<CourseProgressService> {
        Arc::clone(&self.progress)
    }
}
