use chrono::{DateTime, Utc};
use showfarm_core::model::{CourseId, LearnerId, LessonCompletion, LessonRef};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{conn, id_i64, lesson_ref_from_row, ser};
use crate::repository::{CourseProgressRepository, StorageError};

#[async_trait::async_trait]
impl CourseProgressRepository for SqliteRepository {
    async fn mark_lesson_complete(
        &self,
        learner: &LearnerId,
        lesson: &LessonRef,
        completed_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO lesson_completions (
                    learner_id, course_id, module_id, lesson_id, completed_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(learner_id, course_id, module_id, lesson_id) DO NOTHING
            ",
        )
        .bind(learner.as_str())
        .bind(id_i64("course_id", lesson.course_id.value())?)
        .bind(id_i64("module_id", lesson.module_id.value())?)
        .bind(id_i64("lesson_id", lesson.lesson_id.value())?)
        .bind(completed_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;
        Ok(())
    }

    async fn get_progress(
        &self,
        learner: &LearnerId,
        course_id: CourseId,
    ) -> Result<Vec<LessonCompletion>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT learner_id, course_id, module_id, lesson_id, completed_at
                FROM lesson_completions
                WHERE learner_id = ?1 AND course_id = ?2
                ORDER BY completed_at ASC, module_id ASC, lesson_id ASC
            ",
        )
        .bind(learner.as_str())
        .bind(id_i64("course_id", course_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(LessonCompletion {
                learner: LearnerId::new(row.try_get::<String, _>("learner_id").map_err(ser)?),
                lesson: lesson_ref_from_row(&row)?,
                completed_at: row.try_get("completed_at").map_err(ser)?,
            });
        }
        Ok(out)
    }
}
