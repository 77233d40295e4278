mod history;
mod progress;
mod service;

// Public API of the quiz subsystem.
pub use crate::error::QuizServiceError;
pub use history::{AttemptListItem, QuizHistoryService};
pub use progress::{CourseProgress, CourseProgressService};
pub use service::{QuizHandle, QuizService};
