mod attempt;
mod ids;
mod question;
mod quiz;

pub use attempt::{LessonCompletion, QuizAttempt, QuizAttemptError};
pub use ids::{AttemptId, CourseId, LearnerId, LessonId, LessonRef, ModuleId, ParseIdError};
pub use question::{OPTIONS_PER_QUESTION, Question, QuestionDraft, QuestionError};
pub use quiz::{
    DEFAULT_PASS_THRESHOLD_PERCENT, DEFAULT_TIME_LIMIT_SECONDS, QuizDefinition,
    QuizDefinitionError, QuizDraft,
};
