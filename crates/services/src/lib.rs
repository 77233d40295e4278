#![forbid(unsafe_code)]

pub mod app_services;
pub mod content;
pub mod error;
pub mod quizzes;
pub mod reporter;
pub mod scheduler;

pub use showfarm_core::Clock;

pub use app_services::AppServices;
pub use error::{AppServicesError, ContentError, QuizServiceError};
pub use quizzes::{
    AttemptListItem, CourseProgress, CourseProgressService, QuizHandle, QuizHistoryService,
    QuizService,
};
pub use reporter::{ReportOutcome, ResultReporter};
pub use scheduler::TokioScheduler;
