use std::collections::BTreeMap;

use chrono::Duration;
use showfarm_core::model::{
    AttemptId, CourseId, LearnerId, LessonId, LessonRef, ModuleId, QuizAttempt,
};
use showfarm_core::time::fixed_now;
use storage::repository::{CourseProgressRepository, QuizAttemptRepository, StorageError};
use storage::sqlite::SqliteRepository;

async fn repo(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

fn lesson(lesson_id: u64) -> LessonRef {
    LessonRef::new(CourseId::new(3), ModuleId::new(1), LessonId::new(lesson_id))
}

fn attempt(learner: &str, lesson_id: u64, correct: u32, minutes: i64) -> QuizAttempt {
    let mut answers = BTreeMap::new();
    answers.insert(0, 1);
    answers.insert(2, 3);
    let score = u8::try_from(correct * 20).unwrap();
    QuizAttempt::from_persisted(
        AttemptId::generate(),
        LearnerId::new(learner),
        lesson(lesson_id),
        correct,
        5,
        score,
        score >= 70,
        95,
        correct == 0,
        answers,
        fixed_now() + Duration::minutes(minutes),
    )
    .unwrap()
}

#[tokio::test]
async fn sqlite_roundtrips_attempts() {
    let repo = repo("memdb_attempt_roundtrip").await;

    let original = attempt("ada", 7, 4, 0);
    let id = repo.record_quiz_attempt(&original).await.unwrap();
    let fetched = repo.get_attempt(id).await.unwrap();
    assert_eq!(fetched, original);
    assert_eq!(fetched.answers().get(&2), Some(&3));

    assert!(matches!(
        repo.get_attempt(id + 100).await,
        Err(StorageError::NotFound)
    ));
}

#[tokio::test]
async fn sqlite_record_is_idempotent_per_attempt_id() {
    let repo = repo("memdb_attempt_idempotent").await;
    let a = attempt("ada", 7, 2, 0);
    let first = repo.record_quiz_attempt(&a).await.unwrap();
    let again = repo.record_quiz_attempt(&a).await.unwrap();
    assert_eq!(first, again);

    let rows = repo
        .list_attempts(&LearnerId::new("ada"), LessonId::new(7), 10)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
}

#[tokio::test]
async fn sqlite_lists_retakes_newest_first() {
    let repo = repo("memdb_attempt_listing").await;
    let first = repo.record_quiz_attempt(&attempt("ada", 7, 2, 0)).await.unwrap();
    let second = repo.record_quiz_attempt(&attempt("ada", 7, 4, 10)).await.unwrap();
    repo.record_quiz_attempt(&attempt("ada", 8, 5, 20)).await.unwrap();
    repo.record_quiz_attempt(&attempt("bob", 7, 5, 30)).await.unwrap();

    let rows = repo
        .list_attempts(&LearnerId::new("ada"), LessonId::new(7), 10)
        .await
        .unwrap();
    assert_eq!(rows.iter().map(|r| r.id).collect::<Vec<_>>(), vec![second, first]);
    assert!(rows[0].attempt.passed());
    assert!(!rows[1].attempt.passed());

    let limited = repo
        .list_attempts(&LearnerId::new("ada"), LessonId::new(7), 1)
        .await
        .unwrap();
    assert_eq!(limited.len(), 1);
    assert_eq!(limited[0].id, second);
}

#[tokio::test]
async fn sqlite_progress_marks_are_idempotent() {
    let repo = repo("memdb_progress").await;
    let learner = LearnerId::new("ada");
    let now = fixed_now();

    repo.mark_lesson_complete(&learner, &lesson(1), now).await.unwrap();
    repo.mark_lesson_complete(&learner, &lesson(1), now + Duration::days(2))
        .await
        .unwrap();
    repo.mark_lesson_complete(&learner, &lesson(2), now + Duration::hours(1))
        .await
        .unwrap();
    repo.mark_lesson_complete(&LearnerId::new("bob"), &lesson(3), now)
        .await
        .unwrap();

    let progress = repo.get_progress(&learner, CourseId::new(3)).await.unwrap();
    assert_eq!(progress.len(), 2);
    assert_eq!(progress[0].lesson, lesson(1));
    assert_eq!(progress[0].completed_at, now);
    assert_eq!(progress[1].lesson, lesson(2));

    let other_course = repo.get_progress(&learner, CourseId::new(4)).await.unwrap();
    assert!(other_course.is_empty());
}

#[tokio::test]
async fn sqlite_aggregates_see_past_long_histories() {
    let repo = repo("memdb_attempt_aggregates").await;
    let oldest = repo.record_quiz_attempt(&attempt("ada", 7, 5, 0)).await.unwrap();
    for minutes in 1..=500 {
        repo.record_quiz_attempt(&attempt("ada", 7, 1, minutes))
            .await
            .unwrap();
    }
    repo.record_quiz_attempt(&attempt("ada", 7, 5, 1000)).await.unwrap();
    repo.record_quiz_attempt(&attempt("bob", 7, 5, 0)).await.unwrap();

    let learner = LearnerId::new("ada");
    assert_eq!(repo.count_attempts(&learner, LessonId::new(7)).await.unwrap(), 502);

    let best = repo
        .best_attempt(&learner, LessonId::new(7))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(best.id, oldest);
    assert_eq!(best.attempt.score_percent(), 100);

    assert!(repo
        .best_attempt(&learner, LessonId::new(8))
        .await
        .unwrap()
        .is_none());
}
