use showfarm_core::model::{LearnerId, LessonId, QuizAttempt};

use super::SqliteRepository;
use super::mapping::{
    answers_to_json, conn, id_i64, map_attempt_row, map_attempt_row_with_id, ser,
};
use crate::repository::{AttemptRow, AttemptRowId, QuizAttemptRepository, StorageError};

#[async_trait::async_trait]
impl QuizAttemptRepository for SqliteRepository {
    async fn record_quiz_attempt(&self, attempt: &QuizAttempt) -> Result<AttemptRowId, StorageError> {
        let lesson = attempt.lesson();
        let attempt_id = attempt.attempt_id().to_string();

        let mut tx = self.pool.begin().await.map_err(conn)?;
        sqlx::query(
            r"
                INSERT INTO quiz_attempts (
                    attempt_id, learner_id, course_id, module_id, lesson_id,
                    correct_count, total_questions, score_percent, passed,
                    time_taken_seconds, timed_out, answers, submitted_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                ON CONFLICT(attempt_id) DO NOTHING
            ",
        )
        .bind(&attempt_id)
        .bind(attempt.learner().as_str())
        .bind(id_i64("course_id", lesson.course_id.value())?)
        .bind(id_i64("module_id", lesson.module_id.value())?)
        .bind(id_i64("lesson_id", lesson.lesson_id.value())?)
        .bind(i64::from(attempt.correct_count()))
        .bind(i64::from(attempt.total_questions()))
        .bind(i64::from(attempt.score_percent()))
        .bind(attempt.passed())
        .bind(i64::from(attempt.time_taken_seconds()))
        .bind(attempt.timed_out())
        .bind(answers_to_json(attempt.answers())?)
        .bind(attempt.submitted_at())
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        let id: i64 = sqlx::query_scalar("SELECT id FROM quiz_attempts WHERE attempt_id = ?1")
            .bind(&attempt_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(conn)?;
        tx.commit().await.map_err(conn)?;

        Ok(id)
    }

    async fn get_attempt(&self, id: AttemptRowId) -> Result<QuizAttempt, StorageError> {
        let row = sqlx::query(
            r"
                SELECT
                    attempt_id, learner_id, course_id, module_id, lesson_id,
                    correct_count, total_questions, score_percent, passed,
                    time_taken_seconds, timed_out, answers, submitted_at
                FROM quiz_attempts
                WHERE id = ?1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?
        .ok_or(StorageError::NotFound)?;

        map_attempt_row(&row)
    }

    async fn list_attempts(
        &self,
        learner: &LearnerId,
        lesson_id: LessonId,
        limit: u32,
    ) -> Result<Vec<AttemptRow>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT
                    id, attempt_id, learner_id, course_id, module_id, lesson_id,
                    correct_count, total_questions, score_percent, passed,
                    time_taken_seconds, timed_out, answers, submitted_at
                FROM quiz_attempts
                WHERE learner_id = ?1 AND lesson_id = ?2
                ORDER BY submitted_at DESC, id DESC
                LIMIT ?3
            ",
        )
        .bind(learner.as_str())
        .bind(id_i64("lesson_id", lesson_id.value())?)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_attempt_row_with_id(&row)?);
        }
        Ok(out)
    }

    async fn count_attempts(
        &self,
        learner: &LearnerId,
        lesson_id: LessonId,
    ) -> Result<u64, StorageError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM quiz_attempts WHERE learner_id = ?1 AND lesson_id = ?2",
        )
        .bind(learner.as_str())
        .bind(id_i64("lesson_id", lesson_id.value())?)
        .fetch_one(&self.pool)
        .await
        .map_err(conn)?;
        u64::try_from(count).map_err(ser)
    }

    async fn best_attempt(
        &self,
        learner: &LearnerId,
        lesson_id: LessonId,
    ) -> Result<Option<AttemptRow>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT
                    id, attempt_id, learner_id, course_id, module_id, lesson_id,
                    correct_count, total_questions, score_percent, passed,
                    time_taken_seconds, timed_out, answers, submitted_at
                FROM quiz_attempts
                WHERE learner_id = ?1 AND lesson_id = ?2
                ORDER BY score_percent DESC, submitted_at ASC, id ASC
                LIMIT 1
            ",
        )
        .bind(learner.as_str())
        .bind(id_i64("lesson_id", lesson_id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_attempt_row_with_id).transpose()
    }
}
