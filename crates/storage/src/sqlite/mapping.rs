use std::collections::BTreeMap;

use showfarm_core::model::{
    AttemptId, CourseId, LearnerId, LessonId, LessonRef, ModuleId, QuizAttempt,
};
use sqlx::Row;

use crate::repository::{AttemptRow, StorageError};

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

pub(crate) fn id_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

fn u64_from_i64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn lesson_ref_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<LessonRef, StorageError> {
    let course_id = u64_from_i64("course_id", row.try_get("course_id").map_err(ser)?)?;
    let module_id = u64_from_i64("module_id", row.try_get("module_id").map_err(ser)?)?;
    let lesson_id = u64_from_i64("lesson_id", row.try_get("lesson_id").map_err(ser)?)?;
    Ok(LessonRef::new(
        CourseId::new(course_id),
        ModuleId::new(module_id),
        LessonId::new(lesson_id),
    ))
}

pub(crate) fn answers_to_json(answers: &BTreeMap<usize, usize>) -> Result<String, StorageError> {
    serde_json::to_string(answers).map_err(ser)
}

fn answers_from_json(raw: &str) -> Result<BTreeMap<usize, usize>, StorageError> {
    serde_json::from_str(raw).map_err(ser)
}

pub(crate) fn map_attempt_row(row: &sqlx::sqlite::SqliteRow) -> Result<QuizAttempt, StorageError> {
    let attempt_id: AttemptId = row
        .try_get::<String, _>("attempt_id")
        .map_err(ser)?
        .parse()
        .map_err(ser)?;
    let learner = LearnerId::new(row.try_get::<String, _>("learner_id").map_err(ser)?);
    let lesson = lesson_ref_from_row(row)?;
    let correct_count = u32_from_i64("correct_count", row.try_get("correct_count").map_err(ser)?)?;
    let total_questions =
        u32_from_i64("total_questions", row.try_get("total_questions").map_err(ser)?)?;
    let score_raw: i64 = row.try_get("score_percent").map_err(ser)?;
    let score_percent = u8::try_from(score_raw)
        .map_err(|_| StorageError::Serialization(format!("invalid score_percent: {score_raw}")))?;
    let passed: bool = row.try_get("passed").map_err(ser)?;
    let time_taken_seconds = u32_from_i64(
        "time_taken_seconds",
        row.try_get("time_taken_seconds").map_err(ser)?,
    )?;
    let timed_out: bool = row.try_get("timed_out").map_err(ser)?;
    let answers = answers_from_json(&row.try_get::<String, _>("answers").map_err(ser)?)?;
    let submitted_at = row.try_get("submitted_at").map_err(ser)?;

    QuizAttempt::from_persisted(
        attempt_id,
        learner,
        lesson,
        correct_count,
        total_questions,
        score_percent,
        passed,
        time_taken_seconds,
        timed_out,
        answers,
        submitted_at,
    )
    .map_err(ser)
}

pub(crate) fn map_attempt_row_with_id(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<AttemptRow, StorageError> {
    let id: i64 = row.try_get("id").map_err(ser)?;
    Ok(AttemptRow::new(id, map_attempt_row(row)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answers_json_roundtrip_keeps_integer_keys() {
        let mut answers = BTreeMap::new();
        answers.insert(0, 3);
        answers.insert(4, 1);
        let raw = answers_to_json(&answers).unwrap();
        assert_eq!(raw, r#"{"0":3,"4":1}"#);
        assert_eq!(answers_from_json(&raw).unwrap(), answers);
    }

    #[test]
    fn negative_ids_are_rejected() {
        assert!(matches!(
            u64_from_i64("lesson_id", -1),
            Err(StorageError::Serialization(_))
        ));
    }
}
