use std::sync::Arc;

use showfarm_core::model::{CourseId, LearnerId, LessonRef};
use storage::repository::CourseProgressRepository;

use crate::error::QuizServiceError;

/// Completion state of one course for a learner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseProgress {
    pub course_id: CourseId,
    pub completed_lessons: Vec<LessonRef>,
    pub total_lessons: usize,
    pub percent_complete: u8,
}

impl CourseProgress {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.total_lessons > 0 && self.completed_lessons.len() >= self.total_lessons
    }
}

/// Read-side facade over lesson completion records.
#[derive(Clone)]
pub struct CourseProgressService {
    progress: Arc<dyn CourseProgressRepository>,
}

impl CourseProgressService {
    #[must_use]
    pub fn new(progress: Arc<dyn CourseProgressRepository>) -> Self {
        Self { progress }
    }

    /// Summarise a learner's progress through a course of `total_lessons`.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError::Storage` on repository failures.
    pub async fn summary(
        &self,
        learner: &LearnerId,
        course_id: CourseId,
        total_lessons: usize,
    ) -> Result<CourseProgress, QuizServiceError> {
        let completions = self.progress.get_progress(learner, course_id).await?;
        let completed_lessons: Vec<LessonRef> = completions.into_iter().map(|c| c.lesson).collect();
        let done = completed_lessons.len().min(total_lessons);
        let percent_complete = if total_lessons == 0 {
            0
        } else {
            u8::try_from((200 * done + total_lessons) / (2 * total_lessons)).unwrap_or(100)
        };

        Ok(CourseProgress {
            course_id,
            completed_lessons,
            total_lessons,
            percent_complete,
        })
    }

    /// True once the learner has passed the lesson's quiz.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError::Storage` on repository failures.
    pub async fn is_lesson_complete(
        &self,
        learner: &LearnerId,
        lesson: &LessonRef,
    ) -> Result<bool, QuizServiceError> {
        let completions = self.progress.get_progress(learner, lesson.course_id).await?;
        Ok(completions.iter().any(|c| c.lesson == *lesson))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use showfarm_core::model::{LessonId, ModuleId};
    use showfarm_core::time::fixed_now;
    use storage::repository::InMemoryRepository;

    fn lesson(id: u64) -> LessonRef {
        LessonRef::new(CourseId::new(2), ModuleId::new(1), LessonId::new(id))
    }

    #[tokio::test]
    async fn summary_counts_completed_lessons() {
        let repo = InMemoryRepository::new();
        let learner = LearnerId::new("ada");
        repo.mark_lesson_complete(&learner, &lesson(1), fixed_now()).await.unwrap();
        repo.mark_lesson_complete(&learner, &lesson(2), fixed_now()).await.unwrap();

        let service = CourseProgressService::new(Arc::new(repo));
        let progress = service.summary(&learner, CourseId::new(2), 3).await.unwrap();
        assert_eq!(progress.completed_lessons.len(), 2);
        assert_eq!(progress.percent_complete, 67);
        assert!(!progress.is_complete());

        assert!(service.is_lesson_complete(&learner, &lesson(2)).await.unwrap());
        assert!(!service.is_lesson_complete(&learner, &lesson(3)).await.unwrap());
    }

    #[tokio::test]
    async fn empty_course_is_zero_percent() {
        let service = CourseProgressService::new(Arc::new(InMemoryRepository::new()));
        let progress = service
            .summary(&LearnerId::new("ada"), CourseId::new(2), 0)
            .await
            .unwrap();
        assert_eq!(progress.percent_complete, 0);
        assert!(!progress.is_complete());
    }
}
