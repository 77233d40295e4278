//! Shared error types for the services crate.

use thiserror::Error;

use showfarm_core::QuizError;
use showfarm_core::model::{LessonId, QuizDefinitionError};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by quiz services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuizServiceError {
    #[error(transparent)]
    Quiz(#[from] QuizError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("quiz belongs to lesson {quiz}, not lesson {requested}")]
    LessonMismatch { quiz: LessonId, requested: LessonId },
    #[error("quiz sessions must be opened inside a tokio runtime")]
    NoRuntime,
}

/// Errors emitted while loading authored quiz content.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ContentError {
    #[error("failed to read quiz content: {0}")]
    Io(#[from] std::io::Error),
    #[error("quiz content is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Definition(#[from] QuizDefinitionError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error("app services must be built inside a tokio runtime")]
    NoRuntime,
}
