use std::fmt;

use thiserror::Error;

use crate::model::QuizDefinitionError;

/// Coarse lifecycle phase of a quiz session, used in error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionPhase {
    NotStarted,
    InProgress,
    Submitted,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SessionPhase::NotStarted => "not started",
            SessionPhase::InProgress => "in progress",
            SessionPhase::Submitted => "submitted",
        };
        f.write_str(label)
    }
}

/// Errors raised by the quiz session subsystem.
///
/// - `InvalidDefinition` blocks the quiz from starting.
/// - `OutOfRange` and `InvalidStateTransition` indicate a caller defect; the
///   operation is ignored and state is unchanged.
/// - `IncompleteSubmission` is recoverable: answer the remaining questions or
///   wait for the timer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuizError {
    #[error(transparent)]
    InvalidDefinition(#[from] QuizDefinitionError),

    #[error("{what} index {index} is out of range (len {len})")]
    OutOfRange {
        what: &'static str,
        index: usize,
        len: usize,
    },

    #[error("answer all questions before submitting ({answered} of {total} answered)")]
    IncompleteSubmission { answered: usize, total: usize },

    #[error("cannot {operation} while session is {phase}")]
    InvalidStateTransition {
        phase: SessionPhase,
        operation: &'static str,
    },
}

impl QuizError {
    /// True for conditions a learner should be told about.
    #[must_use]
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            QuizError::InvalidDefinition(_) | QuizError::IncompleteSubmission { .. }
        )
    }
}
