use async_trait::async_trait;
use chrono::{DateTime, Utc};
use showfarm_core::model::{
    CourseId, LearnerId, LessonCompletion, LessonId, LessonRef, QuizAttempt,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Storage identifier for a persisted quiz attempt.
///
/// NOTE: This is `i64` to match `SQLite` row IDs.
pub type AttemptRowId = i64;

/// A persisted attempt together with its row id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptRow {
    pub id: AttemptRowId,
    pub attempt: QuizAttempt,
}

impl AttemptRow {
    #[must_use]
    pub fn new(id: AttemptRowId, attempt: QuizAttempt) -> Self {
        Self { id, attempt }
    }
}

/// Repository contract for quiz attempts.
#[async_trait]
pub trait QuizAttemptRepository: Send + Sync {
    /// Append an attempt.
    ///
    /// Recording the same `AttemptId` twice returns the existing row id, so a
    /// report can be retried safely.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the attempt cannot be stored.
    async fn record_quiz_attempt(&self, attempt: &QuizAttempt) -> Result<AttemptRowId, StorageError>;

    /// Fetch an attempt by row id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_attempt(&self, id: AttemptRowId) -> Result<QuizAttempt, StorageError>;

    /// List a learner's attempts for a lesson, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read failures.
    async fn list_attempts(
        &self,
        learner: &LearnerId,
        lesson_id: LessonId,
        limit: u32,
    ) -> Result<Vec<AttemptRow>, StorageError>;

    /// Number of attempts a learner has recorded for a lesson.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read failures.
    async fn count_attempts(
        &self,
        learner: &LearnerId,
        lesson_id: LessonId,
    ) -> Result<u64, StorageError>;

    /// Highest-scoring attempt for a lesson; the earliest one wins a tie.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read failures.
    async fn best_attempt(
        &self,
        learner: &LearnerId,
        lesson_id: LessonId,
    ) -> Result<Option<AttemptRow>, StorageError>;
}

/// Repository contract for lesson completion records.
#[async_trait]
pub trait CourseProgressRepository: Send + Sync {
    /// Mark a lesson as completed. Marking an already completed lesson keeps
    /// the first completion time.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be stored.
    async fn mark_lesson_complete(
        &self,
        learner: &LearnerId,
        lesson: &LessonRef,
        completed_at: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    /// All completed lessons of a course for a learner, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read failures.
    async fn get_progress(
        &self,
        learner: &LearnerId,
        course_id: CourseId,
    ) -> Result<Vec<LessonCompletion>, StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    attempts: Arc<Mutex<Vec<AttemptRow>>>,
    completions: Arc<Mutex<HashMap<(LearnerId, LessonRef), LessonCompletion>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QuizAttemptRepository for InMemoryRepository {
    async fn record_quiz_attempt(&self, attempt: &QuizAttempt) -> Result<AttemptRowId, StorageError> {
        let mut guard = self
            .attempts
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        if let Some(existing) = guard
            .iter()
            .find(|row| row.attempt.attempt_id() == attempt.attempt_id())
        {
            return Ok(existing.id);
        }
        let id = guard.last().map_or(1, |row| row.id + 1);
        guard.push(AttemptRow::new(id, attempt.clone()));
        Ok(id)
    }

    async fn get_attempt(&self, id: AttemptRowId) -> Result<QuizAttempt, StorageError> {
        let guard = self
            .attempts
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard
            .iter()
            .find(|row| row.id == id)
            .map(|row| row.attempt.clone())
            .ok_or(StorageError::NotFound)
    }

    async fn list_attempts(
        &self,
        learner: &LearnerId,
        lesson_id: LessonId,
        limit: u32,
    ) -> Result<Vec<AttemptRow>, StorageError> {
        let guard = self
            .attempts
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut rows: Vec<AttemptRow> = guard
            .iter()
            .filter(|row| {
                row.attempt.learner() == learner && row.attempt.lesson().lesson_id == lesson_id
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            b.attempt
                .submitted_at()
                .cmp(&a.attempt.submitted_at())
                .then(b.id.cmp(&a.id))
        });
        rows.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(rows)
    }

    async fn count_attempts(
        &self,
        learner: &LearnerId,
        lesson_id: LessonId,
    ) -> Result<u64, StorageError> {
        let guard = self
            .attempts
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let count = guard
            .iter()
            .filter(|row| {
                row.attempt.learner() == learner && row.attempt.lesson().lesson_id == lesson_id
            })
            .count();
        Ok(u64::try_from(count).unwrap_or(u64::MAX))
    }

    async fn best_attempt(
        &self,
        learner: &LearnerId,
        lesson_id: LessonId,
    ) -> Result<Option<AttemptRow>, StorageError> {
        let guard = self
            .attempts
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let best = guard
            .iter()
            .filter(|row| {
                row.attempt.learner() == learner && row.attempt.lesson().lesson_id == lesson_id
            })
            .min_by(|a, b| {
                b.attempt
                    .score_percent()
                    .cmp(&a.attempt.score_percent())
                    .then(a.attempt.submitted_at().cmp(&b.attempt.submitted_at()))
                    .then(a.id.cmp(&b.id))
            })
            .cloned();
        Ok(best)
    }
}

#[async_trait]
impl CourseProgressRepository for InMemoryRepository {
    async fn mark_lesson_complete(
        &self,
        learner: &LearnerId,
        lesson: &LessonRef,
        completed_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut guard = self
            .completions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard
            .entry((learner.clone(), *lesson))
            .or_insert_with(|| LessonCompletion {
                learner: learner.clone(),
                lesson: *lesson,
                completed_at,
            });
        Ok(())
    }

    async fn get_progress(
        &self,
        learner: &LearnerId,
        course_id: CourseId,
    ) -> Result<Vec<LessonCompletion>, StorageError> {
        let guard = self
            .completions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut out: Vec<LessonCompletion> = guard
            .values()
            .filter(|c| &c.learner == learner && c.lesson.course_id == course_id)
            .cloned()
            .collect();
        out.sort_by_key(|c| (c.completed_at, c.lesson.module_id, c.lesson.lesson_id));
        Ok(out)
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub attempts: Arc<dyn QuizAttemptRepository>,
    pub progress: Arc<dyn CourseProgressRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let attempts: Arc<dyn QuizAttemptRepository> = Arc::new(repo.clone());
        let progress: Arc<dyn CourseProgressRepository> = Arc::new(repo);
        Self { attempts, progress }
    }
}
