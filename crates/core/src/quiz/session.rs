use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::{debug, info, warn};

use crate::error::{QuizError, SessionPhase};
use crate::model::{AttemptId, LessonId, QuizDefinition};
use crate::quiz::answers::AnswerTracker;
use crate::quiz::bank::QuestionBank;
use crate::quiz::scheduler::Scheduler;
use crate::quiz::scorer;
use crate::quiz::timer::CountdownTimer;

//
// ─── STATE ─────────────────────────────────────────────────────────────────────
//

/// Locally authoritative outcome of a submitted attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizResult {
    pub attempt_id: AttemptId,
    pub correct_count: usize,
    pub total_questions: usize,
    pub score_percent: u8,
    pub passed: bool,
    pub time_taken_seconds: u32,
    pub per_question_correctness: Vec<bool>,
    pub answers: BTreeMap<usize, usize>,
    /// True when the countdown forced the submission.
    pub timed_out: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    NotStarted,
    InProgress {
        elapsed_seconds: u32,
        answers: AnswerTracker,
        current_question_index: usize,
    },
    Submitted(QuizResult),
}

impl SessionState {
    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        match self {
            SessionState::NotStarted => SessionPhase::NotStarted,
            SessionState::InProgress { .. } => SessionPhase::InProgress,
            SessionState::Submitted(_) => SessionPhase::Submitted,
        }
    }
}

/// Snapshot of an attempt for progress displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionProgress {
    pub total: usize,
    pub answered: usize,
    pub current_question_index: usize,
    pub elapsed_seconds: u32,
    pub remaining_seconds: u32,
}

type SubmittedListener = Arc<dyn Fn(&QuizResult) + Send + Sync>;
type TickListener = Arc<dyn Fn(u32) + Send + Sync>;

struct Shared {
    lesson_id: LessonId,
    title: String,
    bank: QuestionBank,
    time_limit_seconds: u32,
    pass_threshold_percent: u8,
    scheduler: Arc<dyn Scheduler>,
    state: Mutex<SessionState>,
    timer: Mutex<Option<CountdownTimer>>,
    on_submitted: Mutex<Option<SubmittedListener>>,
    on_tick: Mutex<Option<TickListener>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn invalid(phase: SessionPhase, operation: &'static str) -> QuizError {
    warn!(%phase, operation, "ignored quiz operation in wrong state");
    QuizError::InvalidStateTransition { phase, operation }
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// Timed quiz attempt: `NotStarted -> InProgress -> Submitted`, with `retake`
/// returning to `NotStarted`.
///
/// The countdown runs on the injected `Scheduler`. When it expires the
/// session submits itself with whatever answers exist. Dropping the session
/// cancels the countdown.
pub struct QuizSession {
    shared: Arc<Shared>,
}

impl QuizSession {
    /// Create a session for `definition` in the `NotStarted` state.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::InvalidDefinition` if the question bank can't be loaded.
    pub fn new(
        definition: &QuizDefinition,
        scheduler: Arc<dyn Scheduler>,
    ) -> Result<Self, QuizError> {
        let bank = QuestionBank::load(definition)?;
        Ok(Self {
            shared: Arc::new(Shared {
                lesson_id: definition.lesson_id(),
                title: definition.title().to_owned(),
                bank,
                time_limit_seconds: definition.time_limit_seconds(),
                pass_threshold_percent: definition.pass_threshold_percent(),
                scheduler,
                state: Mutex::new(SessionState::NotStarted),
                timer: Mutex::new(None),
                on_submitted: Mutex::new(None),
                on_tick: Mutex::new(None),
            }),
        })
    }

    /// Called after every submission, manual or forced by expiry.
    pub fn set_on_submitted<F>(&self, listener: F)
    where
        F: Fn(&QuizResult) + Send + Sync + 'static,
    {
        *lock(&self.shared.on_submitted) = Some(Arc::new(listener));
    }

    /// Called with the remaining seconds after every countdown tick.
    pub fn set_on_tick<F>(&self, listener: F)
    where
        F: Fn(u32) + Send + Sync + 'static,
    {
        *lock(&self.shared.on_tick) = Some(Arc::new(listener));
    }

    #[must_use]
    pub fn lesson_id(&self) -> LessonId {
        self.shared.lesson_id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.shared.title
    }

    #[must_use]
    pub fn bank(&self) -> &QuestionBank {
        &self.shared.bank
    }

    #[must_use]
    pub fn time_limit_seconds(&self) -> u32 {
        self.shared.time_limit_seconds
    }

    #[must_use]
    pub fn pass_threshold_percent(&self) -> u8 {
        self.shared.pass_threshold_percent
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        lock(&self.shared.state).clone()
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        lock(&self.shared.state).phase()
    }

    #[must_use]
    pub fn result(&self) -> Option<QuizResult> {
        match &*lock(&self.shared.state) {
            SessionState::Submitted(result) => Some(result.clone()),
            _ => None,
        }
    }

    /// Seconds left on the countdown, if an attempt is running.
    #[must_use]
    pub fn remaining_seconds(&self) -> Option<u32> {
        if self.phase() != SessionPhase::InProgress {
            return None;
        }
        lock(&self.shared.timer)
            .as_ref()
            .map(CountdownTimer::remaining_seconds)
    }

    #[must_use]
    pub fn progress(&self) -> Option<SessionProgress> {
        let remaining_seconds = self.remaining_seconds().unwrap_or(0);
        match &*lock(&self.shared.state) {
            SessionState::InProgress {
                elapsed_seconds,
                answers,
                current_question_index,
            } => Some(SessionProgress {
                total: self.shared.bank.len(),
                answered: answers.completed_count(),
                current_question_index: *current_question_index,
                elapsed_seconds: *elapsed_seconds,
                remaining_seconds,
            }),
            _ => None,
        }
    }

    /// Begin an attempt with empty answers and a fresh countdown.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::InvalidStateTransition` unless the session is `NotStarted`.
    pub fn start(&self) -> Result<(), QuizError> {
        {
            let mut state = lock(&self.shared.state);
            if !matches!(*state, SessionState::NotStarted) {
                return Err(invalid(state.phase(), "start"));
            }
            *state = SessionState::InProgress {
                elapsed_seconds: 0,
                answers: AnswerTracker::new(self.shared.bank.len()),
                current_question_index: 0,
            };
        }

        let timer = CountdownTimer::new(Arc::clone(&self.shared.scheduler));
        let on_tick = Arc::downgrade(&self.shared);
        let on_expire = Arc::downgrade(&self.shared);
        timer.start(
            self.shared.time_limit_seconds,
            move |remaining| {
                if let Some(shared) = on_tick.upgrade() {
                    shared.handle_tick(remaining);
                }
            },
            move || {
                if let Some(shared) = on_expire.upgrade() {
                    shared.handle_expiry();
                }
            },
        );
        // Replacing the slot drops any previous timer, which cancels it.
        *lock(&self.shared.timer) = Some(timer);

        debug!(
            lesson_id = %self.shared.lesson_id,
            questions = self.shared.bank.len(),
            time_limit = self.shared.time_limit_seconds,
            "quiz started"
        );
        Ok(())
    }

    /// Record the learner's choice for a question.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::OutOfRange` for a bad question/option index, or
    /// `QuizError::InvalidStateTransition` when no attempt is running.
    pub fn select_answer(&self, question_index: usize, option_index: usize) -> Result<(), QuizError> {
        let mut state = lock(&self.shared.state);
        match &mut *state {
            SessionState::InProgress { answers, .. } => answers
                .set_answer(question_index, option_index)
                .inspect_err(|err| warn!(%err, "ignored answer selection")),
            other => Err(invalid(other.phase(), "select an answer")),
        }
    }

    /// Move to `question_index`, clamped to the valid range.
    ///
    /// Returns the index actually selected.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::InvalidStateTransition` when no attempt is running.
    pub fn navigate(&self, question_index: usize) -> Result<usize, QuizError> {
        let last = self.shared.bank.len().saturating_sub(1);
        let mut state = lock(&self.shared.state);
        match &mut *state {
            SessionState::InProgress {
                current_question_index,
                ..
            } => {
                if question_index > last {
                    debug!(requested = question_index, last, "navigation clamped");
                }
                *current_question_index = question_index.min(last);
                Ok(*current_question_index)
            }
            other => Err(invalid(other.phase(), "navigate")),
        }
    }

    /// # Errors
    ///
    /// Returns `QuizError::InvalidStateTransition` when no attempt is running.
    pub fn next(&self) -> Result<usize, QuizError> {
        let current = self.current_question_index("navigate")?;
        self.navigate(current.saturating_add(1))
    }

    /// # Errors
    ///
    /// Returns `QuizError::InvalidStateTransition` when no attempt is running.
    pub fn previous(&self) -> Result<usize, QuizError> {
        let current = self.current_question_index("navigate")?;
        self.navigate(current.saturating_sub(1))
    }

    /// Finish the attempt and score it.
    ///
    /// Allowed once every question is answered, or after the countdown has
    /// expired. The countdown is stopped before scoring begins.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::IncompleteSubmission` if answers are missing and time
    /// remains, or `QuizError::InvalidStateTransition` when no attempt is running.
    pub fn submit(&self) -> Result<QuizResult, QuizError> {
        self.shared.submit(false)
    }

    /// Discard a submitted attempt so the quiz can be taken again.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::InvalidStateTransition` unless the session is `Submitted`.
    pub fn retake(&self) -> Result<(), QuizError> {
        {
            let mut state = lock(&self.shared.state);
            if !matches!(*state, SessionState::Submitted(_)) {
                return Err(invalid(state.phase(), "retake"));
            }
            *state = SessionState::NotStarted;
        }
        lock(&self.shared.timer).take();
        debug!(lesson_id = %self.shared.lesson_id, "quiz reset for retake");
        Ok(())
    }

    /// Cancel a running attempt, e.g. when the learner leaves the quiz.
    ///
    /// Stops the countdown in every state; a running attempt returns to
    /// `NotStarted` and its answers are discarded.
    pub fn abandon(&self) {
        lock(&self.shared.timer).take();
        let mut state = lock(&self.shared.state);
        if matches!(*state, SessionState::InProgress { .. }) {
            *state = SessionState::NotStarted;
            debug!(lesson_id = %self.shared.lesson_id, "quiz abandoned");
        }
    }

    fn current_question_index(&self, operation: &'static str) -> Result<usize, QuizError> {
        match &*lock(&self.shared.state) {
            SessionState::InProgress {
                current_question_index,
                ..
            } => Ok(*current_question_index),
            other => Err(invalid(other.phase(), operation)),
        }
    }
}

impl Shared {
    fn handle_tick(&self, remaining: u32) {
        {
            let mut state = lock(&self.state);
            let SessionState::InProgress {
                elapsed_seconds, ..
            } = &mut *state
            else {
                return;
            };
            *elapsed_seconds = self.time_limit_seconds.saturating_sub(remaining);
        }
        let listener = lock(&self.on_tick).clone();
        if let Some(listener) = listener {
            listener(remaining);
        }
    }

    fn handle_expiry(&self) {
        info!(lesson_id = %self.lesson_id, "quiz time expired, submitting");
        if let Err(err) = self.submit(true) {
            debug!(%err, "expiry submission skipped");
        }
    }

    fn timer_expired(&self) -> bool {
        lock(&self.timer)
            .as_ref()
            .is_some_and(CountdownTimer::is_expired)
    }

    fn stop_timer(&self) {
        if let Some(timer) = lock(&self.timer).as_ref() {
            timer.stop();
        }
    }

    // Validation, timer stop and scoring share one critical section so a
    // concurrent expiry either wins outright or finds the attempt submitted.
    // Lock order is state, then timer slot, then timer internals.
    fn submit(&self, forced: bool) -> Result<QuizResult, QuizError> {
        let result = {
            let mut state = lock(&self.state);
            let SessionState::InProgress {
                elapsed_seconds,
                answers,
                ..
            } = &*state
            else {
                let phase = state.phase();
                if forced {
                    return Err(QuizError::InvalidStateTransition {
                        phase,
                        operation: "submit",
                    });
                }
                return Err(invalid(phase, "submit"));
            };

            let timed_out = forced || self.timer_expired();
            let total = self.bank.len();
            if !timed_out && !answers.is_complete(total) {
                debug!(
                    answered = answers.completed_count(),
                    total, "submission rejected, answers missing"
                );
                return Err(QuizError::IncompleteSubmission {
                    answered: answers.completed_count(),
                    total,
                });
            }

            // No tick may touch the attempt once scoring has begun.
            self.stop_timer();

            let score = scorer::score(self.bank.questions(), answers);
            let result = QuizResult {
                attempt_id: AttemptId::generate(),
                correct_count: score.correct_count,
                total_questions: total,
                score_percent: score.score_percent,
                passed: score.score_percent >= self.pass_threshold_percent,
                time_taken_seconds: *elapsed_seconds,
                per_question_correctness: score.per_question_correctness,
                answers: answers.selections().clone(),
                timed_out,
            };
            *state = SessionState::Submitted(result.clone());
            result
        };

        info!(
            lesson_id = %self.lesson_id,
            attempt_id = %result.attempt_id,
            score = result.score_percent,
            passed = result.passed,
            timed_out = result.timed_out,
            "quiz submitted"
        );

        let listener = lock(&self.on_submitted).clone();
        if let Some(listener) = listener {
            listener(&result);
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::ManualScheduler;
    use crate::quiz::test_support::quiz_with_answers;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const KEYS: [usize; 5] = [0, 1, 2, 3, 0];

    fn session() -> (ManualScheduler, QuizSession) {
        let clock = ManualScheduler::new();
        let quiz = quiz_with_answers(&KEYS);
        let session = QuizSession::new(&quiz, Arc::new(clock.clone())).unwrap();
        (clock, session)
    }

    fn answer(session: &QuizSession, picks: &[usize]) {
        for (i, pick) in picks.iter().enumerate() {
            session.select_answer(i, *pick).unwrap();
        }
    }

    #[test]
    fn four_correct_passes_at_eighty() {
        let (_clock, session) = session();
        session.start().unwrap();
        answer(&session, &[0, 1, 2, 3, 3]);
        let result = session.submit().unwrap();
        assert_eq!(result.correct_count, 4);
        assert_eq!(result.score_percent, 80);
        assert!(result.passed);
        assert!(!result.timed_out);
        assert_eq!(session.phase(), SessionPhase::Submitted);
    }

    #[test]
    fn three_correct_fails_at_sixty() {
        let (_clock, session) = session();
        session.start().unwrap();
        answer(&session, &[0, 1, 2, 0, 1]);
        let result = session.submit().unwrap();
        assert_eq!(result.score_percent, 60);
        assert!(!result.passed);
    }

    #[test]
    fn expiry_auto_submits_empty_answers() {
        let (clock, session) = session();
        let submitted = Arc::new(AtomicUsize::new(0));
        let s = Arc::clone(&submitted);
        session.set_on_submitted(move |_| {
            s.fetch_add(1, Ordering::SeqCst);
        });
        session.start().unwrap();

        clock.advance_secs(299);
        assert_eq!(session.phase(), SessionPhase::InProgress);
        assert_eq!(session.remaining_seconds(), Some(1));

        clock.advance_secs(1);
        let result = session.result().expect("auto-submitted");
        assert_eq!(result.correct_count, 0);
        assert_eq!(result.score_percent, 0);
        assert!(!result.passed);
        assert!(result.timed_out);
        assert_eq!(result.time_taken_seconds, 300);
        assert_eq!(submitted.load(Ordering::SeqCst), 1);
        assert_eq!(clock.pending(), 0);
    }

    #[test]
    fn incomplete_submission_is_rejected_while_time_remains() {
        let (clock, session) = session();
        session.start().unwrap();
        answer(&session, &[0, 1, 2]);
        clock.advance_secs(180);
        assert_eq!(session.remaining_seconds(), Some(120));

        let err = session.submit().unwrap_err();
        assert_eq!(
            err,
            QuizError::IncompleteSubmission {
                answered: 3,
                total: 5
            }
        );
        assert!(err.is_user_facing());
        assert_eq!(session.phase(), SessionPhase::InProgress);

        // Recoverable: finishing the answers allows submission.
        session.select_answer(3, 3).unwrap();
        session.select_answer(4, 0).unwrap();
        let result = session.submit().unwrap();
        assert_eq!(result.score_percent, 100);
        assert_eq!(result.time_taken_seconds, 180);
    }

    #[test]
    fn retake_resets_attempt() {
        let (clock, session) = session();
        session.start().unwrap();
        answer(&session, &KEYS);
        clock.advance_secs(42);
        session.submit().unwrap();

        session.retake().unwrap();
        assert_eq!(session.state(), SessionState::NotStarted);
        session.start().unwrap();
        match session.state() {
            SessionState::InProgress {
                elapsed_seconds,
                answers,
                current_question_index,
            } => {
                assert_eq!(elapsed_seconds, 0);
                assert_eq!(answers.completed_count(), 0);
                assert_eq!(current_question_index, 0);
            }
            other => panic!("unexpected state: {other:?}"),
        }
        assert_eq!(session.remaining_seconds(), Some(300));
    }

    #[test]
    fn submitted_session_rejects_mutations() {
        let (_clock, session) = session();
        session.start().unwrap();
        answer(&session, &KEYS);
        session.submit().unwrap();

        let expect_invalid = |err: QuizError| {
            assert!(matches!(
                err,
                QuizError::InvalidStateTransition {
                    phase: SessionPhase::Submitted,
                    ..
                }
            ));
        };
        expect_invalid(session.select_answer(0, 1).unwrap_err());
        expect_invalid(session.navigate(1).unwrap_err());
        expect_invalid(session.submit().unwrap_err());
        expect_invalid(session.start().unwrap_err());
        assert!(session.retake().is_ok());
    }

    #[test]
    fn operations_before_start_are_invalid() {
        let (_clock, session) = session();
        assert!(matches!(
            session.select_answer(0, 0),
            Err(QuizError::InvalidStateTransition {
                phase: SessionPhase::NotStarted,
                ..
            })
        ));
        assert!(session.submit().is_err());
        assert!(session.retake().is_err());
        assert!(session.progress().is_none());
    }

    #[test]
    fn navigation_is_clamped() {
        let (_clock, session) = session();
        session.start().unwrap();
        assert_eq!(session.navigate(3).unwrap(), 3);
        assert_eq!(session.navigate(99).unwrap(), 4);
        assert_eq!(session.next().unwrap(), 4);
        assert_eq!(session.navigate(0).unwrap(), 0);
        assert_eq!(session.previous().unwrap(), 0);
        assert_eq!(session.next().unwrap(), 1);
    }

    #[test]
    fn out_of_range_answer_leaves_state_untouched() {
        let (_clock, session) = session();
        session.start().unwrap();
        assert!(matches!(
            session.select_answer(5, 0),
            Err(QuizError::OutOfRange { what: "question", .. })
        ));
        assert!(matches!(
            session.select_answer(0, 7),
            Err(QuizError::OutOfRange { what: "option", .. })
        ));
        assert_eq!(session.progress().unwrap().answered, 0);
    }

    #[test]
    fn ticks_update_elapsed_and_notify() {
        let (clock, session) = session();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        session.set_on_tick(move |r| s.lock().unwrap().push(r));
        session.start().unwrap();

        clock.advance_secs(3);
        let progress = session.progress().unwrap();
        assert_eq!(progress.elapsed_seconds, 3);
        assert_eq!(progress.remaining_seconds, 297);
        assert_eq!(*seen.lock().unwrap(), vec![299, 298, 297]);
    }

    #[test]
    fn submit_stops_countdown() {
        let (clock, session) = session();
        session.start().unwrap();
        answer(&session, &KEYS);
        clock.advance_secs(10);
        let result = session.submit().unwrap();
        assert_eq!(clock.pending(), 0);

        clock.advance_secs(500);
        assert_eq!(session.result().unwrap(), result);
    }

    #[test]
    fn abandon_and_drop_cancel_countdown() {
        let (clock, session) = session();
        session.start().unwrap();
        session.abandon();
        assert_eq!(session.phase(), SessionPhase::NotStarted);
        assert_eq!(clock.pending(), 0);

        session.start().unwrap();
        assert_eq!(clock.pending(), 1);
        drop(session);
        assert_eq!(clock.pending(), 0);
        clock.advance_secs(400);
    }

    #[test]
    fn retake_from_listener_after_expiry() {
        let (clock, session) = session();
        let session = Arc::new(session);
        let weak = Arc::downgrade(&session);
        session.set_on_submitted(move |_| {
            if let Some(s) = weak.upgrade() {
                s.retake().unwrap();
            }
        });
        session.start().unwrap();
        clock.advance_secs(300);
        assert_eq!(session.phase(), SessionPhase::NotStarted);
    }

    #[test]
    fn manual_submit_inside_expiry_firing_wins_once() {
        let (clock, session) = session();
        let session = Arc::new(session);
        let submissions = Arc::new(AtomicUsize::new(0));
        let manual = Arc::new(Mutex::new(None));

        let weak = Arc::downgrade(&session);
        let seen = Arc::clone(&manual);
        session.set_on_tick(move |remaining| {
            if remaining == 0 {
                if let Some(s) = weak.upgrade() {
                    *seen.lock().unwrap() = Some(s.submit());
                }
            }
        });
        let count = Arc::clone(&submissions);
        session.set_on_submitted(move |_| {
            count.fetch_add(1, Ordering::SeqCst);
        });

        session.start().unwrap();
        session.select_answer(0, 0).unwrap();
        clock.advance_secs(300);

        let manual = manual.lock().unwrap().take().unwrap().unwrap();
        assert!(manual.timed_out);
        assert_eq!(session.result(), Some(manual));
        assert_eq!(submissions.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn concurrent_submit_and_expiry_submit_exactly_once() {
        for _ in 0..100 {
            let (clock, session) = session();
            let submissions = Arc::new(AtomicUsize::new(0));
            let count = Arc::clone(&submissions);
            session.set_on_submitted(move |_| {
                count.fetch_add(1, Ordering::SeqCst);
            });
            session.start().unwrap();
            answer(&session, &KEYS);
            clock.advance_secs(299);

            let barrier = std::sync::Barrier::new(2);
            let manual = std::thread::scope(|scope| {
                scope.spawn(|| {
                    barrier.wait();
                    clock.advance_secs(1);
                });
                barrier.wait();
                session.submit()
            });

            let stored = session.result().unwrap();
            match manual {
                Ok(result) => assert_eq!(result, stored),
                Err(err) => {
                    assert_eq!(
                        err,
                        QuizError::InvalidStateTransition {
                            phase: SessionPhase::Submitted,
                            operation: "submit",
                        }
                    );
                    assert!(stored.timed_out);
                }
            }
            assert_eq!(submissions.load(Ordering::SeqCst), 1);
        }
    }
}
