//! Timed quiz attempts: question bank, answer tracking, scoring, countdown and
//! the session state machine that ties them together.

mod answers;
mod bank;
mod scheduler;
mod scorer;
mod session;
mod timer;

pub use answers::AnswerTracker;
pub use bank::QuestionBank;
pub use scheduler::{CancelToken, ManualScheduler, Scheduler, Tick};
pub use scorer::{Score, score};
pub use session::{QuizResult, QuizSession, SessionProgress, SessionState};
pub use timer::{CountdownTimer, TimerState};

#[cfg(test)]
pub(crate) mod test_support {
    use crate::model::{LessonId, QuestionDraft, QuizDefinition, QuizDraft};

    /// Quiz whose question `i` has `keys[i]` as its correct option.
    pub(crate) fn quiz_with_answers(keys: &[usize]) -> QuizDefinition {
        let questions = keys
            .iter()
            .enumerate()
            .map(|(i, key)| {
                QuestionDraft::new(
                    format!("Question {i}"),
                    vec!["A".into(), "B".into(), "C".into(), "D".into()],
                    *key,
                )
            })
            .collect();
        QuizDraft::new(LessonId::new(1), "Test quiz", questions)
            .validate()
            .unwrap()
    }
}
