use serde::Deserialize;
use thiserror::Error;

use crate::model::ids::LessonId;
use crate::model::question::{Question, QuestionDraft, QuestionError};

/// Time allowed for a quiz when the content doesn't say otherwise.
pub const DEFAULT_TIME_LIMIT_SECONDS: u32 = 300;

/// Minimum score needed to pass when the content doesn't say otherwise.
pub const DEFAULT_PASS_THRESHOLD_PERCENT: u8 = 70;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuizDefinitionError {
    #[error("quiz title cannot be empty")]
    EmptyTitle,

    #[error("quiz must contain at least one question")]
    NoQuestions,

    #[error("pass threshold must be between 0 and 100, got {0}")]
    InvalidPassThreshold(u8),

    #[error("time limit must be > 0 seconds")]
    InvalidTimeLimit,

    #[error("question {index}: {source}")]
    Question {
        index: usize,
        #[source]
        source: QuestionError,
    },
}

//
// ─── DRAFT ─────────────────────────────────────────────────────────────────────
//

fn default_time_limit() -> u32 {
    DEFAULT_TIME_LIMIT_SECONDS
}

fn default_pass_threshold() -> u8 {
    DEFAULT_PASS_THRESHOLD_PERCENT
}

/// Quiz content as authored, before validation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizDraft {
    pub lesson_id: LessonId,
    pub title: String,
    pub questions: Vec<QuestionDraft>,
    #[serde(default = "default_time_limit")]
    pub time_limit_seconds: u32,
    #[serde(default = "default_pass_threshold")]
    pub pass_threshold_percent: u8,
}

impl QuizDraft {
    /// Draft with the default time limit and pass threshold.
    pub fn new(lesson_id: LessonId, title: impl Into<String>, questions: Vec<QuestionDraft>) -> Self {
        Self {
            lesson_id,
            title: title.into(),
            questions,
            time_limit_seconds: DEFAULT_TIME_LIMIT_SECONDS,
            pass_threshold_percent: DEFAULT_PASS_THRESHOLD_PERCENT,
        }
    }

    #[must_use]
    pub fn with_time_limit(mut self, seconds: u32) -> Self {
        self.time_limit_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_pass_threshold(mut self, percent: u8) -> Self {
        self.pass_threshold_percent = percent;
        self
    }

    /// Validate every question and the quiz-level settings.
    ///
    /// # Errors
    ///
    /// Returns the first `QuizDefinitionError` found.
    pub fn validate(self) -> Result<QuizDefinition, QuizDefinitionError> {
        let questions = self
            .questions
            .into_iter()
            .enumerate()
            .map(|(index, draft)| {
                draft
                    .validate()
                    .map_err(|source| QuizDefinitionError::Question { index, source })
            })
            .collect::<Result<Vec<_>, _>>()?;

        QuizDefinition::new(
            self.lesson_id,
            self.title,
            questions,
            self.time_limit_seconds,
            self.pass_threshold_percent,
        )
    }
}

//
// ─── DEFINITION ────────────────────────────────────────────────────────────────
//

/// A validated, immutable quiz attached to one lesson.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizDefinition {
    lesson_id: LessonId,
    title: String,
    questions: Vec<Question>,
    time_limit_seconds: u32,
    pass_threshold_percent: u8,
}

impl QuizDefinition {
    /// # Errors
    ///
    /// Returns `QuizDefinitionError` if the title is blank, there are no
    /// questions, the threshold exceeds 100, or the time limit is zero.
    pub fn new(
        lesson_id: LessonId,
        title: impl Into<String>,
        questions: Vec<Question>,
        time_limit_seconds: u32,
        pass_threshold_percent: u8,
    ) -> Result<Self, QuizDefinitionError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(QuizDefinitionError::EmptyTitle);
        }
        if questions.is_empty() {
            return Err(QuizDefinitionError::NoQuestions);
        }
        if pass_threshold_percent > 100 {
            return Err(QuizDefinitionError::InvalidPassThreshold(
                pass_threshold_percent,
            ));
        }
        if time_limit_seconds == 0 {
            return Err(QuizDefinitionError::InvalidTimeLimit);
        }

        Ok(Self {
            lesson_id,
            title,
            questions,
            time_limit_seconds,
            pass_threshold_percent,
        })
    }

    #[must_use]
    pub fn lesson_id(&self) -> LessonId {
        self.lesson_id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn time_limit_seconds(&self) -> u32 {
        self.time_limit_seconds
    }

    #[must_use]
    pub fn pass_threshold_percent(&self) -> u8 {
        self.pass_threshold_percent
    }
}
