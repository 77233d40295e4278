//! Loading authored quiz content.
//!
//! Lessons ship their quiz as JSON:
//!
//! ```json
//! {
//!   "lessonId": 12,
//!   "title": "Soil health",
//!   "timeLimitSeconds": 300,
//!   "passThresholdPercent": 70,
//!   "questions": [
//!     { "text": "...", "options": ["a", "b", "c", "d"], "correctOptionIndex": 1 }
//!   ]
//! }
//! ```
//!
//! `timeLimitSeconds` and `passThresholdPercent` are optional.

use std::path::Path;

use showfarm_core::model::{QuizDefinition, QuizDraft};

use crate::error::ContentError;

/// Parse and validate a quiz from JSON text.
///
/// # Errors
///
/// Returns `ContentError::Json` for malformed JSON and
/// `ContentError::Definition` for content that fails validation.
pub fn parse_quiz(raw: &str) -> Result<QuizDefinition, ContentError> {
    let draft: QuizDraft = serde_json::from_str(raw)?;
    Ok(draft.validate()?)
}

/// Read and validate a quiz JSON file.
///
/// # Errors
///
/// Returns `ContentError` if the file can't be read or parsed.
pub fn load_quiz_file(path: impl AsRef<Path>) -> Result<QuizDefinition, ContentError> {
    let raw = std::fs::read_to_string(path)?;
    parse_quiz(&raw)
}
