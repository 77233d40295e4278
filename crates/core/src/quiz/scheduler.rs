use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Callback invoked on every scheduler firing.
pub type Tick = Box<dyn FnMut() + Send + 'static>;

/// Handle for cancelling a repeating schedule.
///
/// Cancelling is idempotent and visible to every clone.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Source of repeating callbacks.
///
/// Implementations invoke `callback` once per `period` until the returned
/// token is cancelled. Firings of one schedule never overlap.
pub trait Scheduler: Send + Sync {
    fn schedule(&self, period: Duration, callback: Tick) -> CancelToken;
}

//
// ─── MANUAL SCHEDULER ──────────────────────────────────────────────────────────
//

struct Task {
    period: Duration,
    next_due: Duration,
    token: CancelToken,
    callback: Tick,
}

#[derive(Default)]
struct ManualState {
    now: Duration,
    tasks: Vec<Task>,
}

/// Simulated clock: schedules only fire when the owner calls `advance`.
///
/// Clones share the same timeline.
#[derive(Clone, Default)]
pub struct ManualScheduler {
    state: Arc<Mutex<ManualState>>,
}

impl fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualScheduler")
            .field("now", &self.now())
            .field("pending", &self.pending())
            .finish()
    }
}

impl ManualScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Time elapsed on the simulated timeline.
    #[must_use]
    pub fn now(&self) -> Duration {
        self.lock().now
    }

    /// Number of live (not cancelled) schedules.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.lock()
            .tasks
            .iter()
            .filter(|t| !t.token.is_cancelled())
            .count()
    }

    /// Advance by whole seconds.
    pub fn advance_secs(&self, seconds: u64) {
        self.advance(Duration::from_secs(seconds));
    }

    /// Move the timeline forward, firing every due callback in time order.
    ///
    /// Callbacks run without the scheduler lock held, so they may schedule or
    /// cancel other work.
    pub fn advance(&self, by: Duration) {
        let target = self.lock().now + by;

        loop {
            let mut task = {
                let mut state = self.lock();
                state.tasks.retain(|t| !t.token.is_cancelled());
                let due = state
                    .tasks
                    .iter()
                    .enumerate()
                    .filter(|(_, t)| t.next_due <= target)
                    .min_by_key(|(_, t)| t.next_due)
                    .map(|(idx, _)| idx);
                let Some(idx) = due else {
                    state.now = target;
                    return;
                };
                let task = state.tasks.remove(idx);
                state.now = task.next_due;
                task
            };

            (task.callback)();

            if !task.token.is_cancelled() {
                task.next_due += task.period;
                self.lock().tasks.push(task);
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ManualState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, period: Duration, callback: Tick) -> CancelToken {
        let period = period.max(Duration::from_millis(1));
        let token = CancelToken::new();
        let mut state = self.lock();
        let next_due = state.now + period;
        state.tasks.push(Task {
            period,
            next_due,
            token: token.clone(),
            callback,
        });
        token
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> (Arc<AtomicUsize>, Tick) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        (
            count,
            Box::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            }),
        )
    }

    #[test]
    fn fires_once_per_period() {
        let scheduler = ManualScheduler::new();
        let (count, tick) = counter();
        scheduler.schedule(Duration::from_secs(1), tick);

        scheduler.advance(Duration::from_millis(999));
        assert_eq!(count.load(Ordering::SeqCst), 0);
        scheduler.advance(Duration::from_millis(1));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        scheduler.advance_secs(4);
        assert_eq!(count.load(Ordering::SeqCst), 5);
        assert_eq!(scheduler.now(), Duration::from_secs(5));
    }

    #[test]
    fn cancel_stops_firing() {
        let scheduler = ManualScheduler::new();
        let (count, tick) = counter();
        let token = scheduler.schedule(Duration::from_secs(1), tick);
        scheduler.advance_secs(2);
        token.cancel();
        token.cancel();
        scheduler.advance_secs(5);
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn callback_can_cancel_itself() {
        let scheduler = ManualScheduler::new();
        let token_slot: Arc<Mutex<Option<CancelToken>>> = Arc::new(Mutex::new(None));
        let fired = Arc::new(AtomicUsize::new(0));

        let slot = Arc::clone(&token_slot);
        let f = Arc::clone(&fired);
        let token = scheduler.schedule(
            Duration::from_secs(1),
            Box::new(move || {
                if f.fetch_add(1, Ordering::SeqCst) == 2 {
                    if let Some(t) = slot.lock().unwrap().as_ref() {
                        t.cancel();
                    }
                }
            }),
        );
        *token_slot.lock().unwrap() = Some(token);

        scheduler.advance_secs(10);
        assert_eq!(fired.load(Ordering::SeqCst), 3);
    }
}
