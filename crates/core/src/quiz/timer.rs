use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tracing::debug;

use crate::quiz::scheduler::{CancelToken, Scheduler};

const TICK_PERIOD: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Idle,
    Running,
    Expired,
    Stopped,
}

#[derive(Debug)]
struct TimerInner {
    state: TimerState,
    remaining: u32,
    // Bumped on every start so firings from a replaced schedule are ignored.
    generation: u64,
    token: Option<CancelToken>,
}

/// One-second countdown with an expiry callback.
///
/// Only one tick stream is ever live: starting a running timer cancels the
/// previous schedule first. Callbacks run without the timer lock held, so they
/// may call `stop` or `start`.
pub struct CountdownTimer {
    scheduler: Arc<dyn Scheduler>,
    inner: Arc<Mutex<TimerInner>>,
}

impl CountdownTimer {
    #[must_use]
    pub fn new(scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            scheduler,
            inner: Arc::new(Mutex::new(TimerInner {
                state: TimerState::Idle,
                remaining: 0,
                generation: 0,
                token: None,
            })),
        }
    }

    /// Start counting down from `duration_seconds`.
    ///
    /// `on_tick` receives the remaining seconds after each one-second step;
    /// `on_expire` runs once when the remaining time reaches zero. After
    /// `start(t, ..)` exactly `t` ticks precede expiry.
    pub fn start<T, E>(&self, duration_seconds: u32, mut on_tick: T, on_expire: E)
    where
        T: FnMut(u32) + Send + 'static,
        E: FnOnce() + Send + 'static,
    {
        let generation = {
            let mut inner = lock(&self.inner);
            if let Some(token) = inner.token.take() {
                token.cancel();
            }
            if inner.state == TimerState::Running {
                debug!(remaining = inner.remaining, "countdown restarted while running");
            }
            inner.generation = inner.generation.wrapping_add(1);
            inner.state = TimerState::Running;
            inner.remaining = duration_seconds;
            inner.generation
        };

        let weak: Weak<Mutex<TimerInner>> = Arc::downgrade(&self.inner);
        let mut on_expire = Some(on_expire);
        let callback = move || {
            let Some(shared) = weak.upgrade() else {
                return;
            };
            let (ticked, expired) = {
                let mut inner = lock(&shared);
                if inner.generation != generation || inner.state != TimerState::Running {
                    return;
                }
                let mut ticked = None;
                if inner.remaining > 0 {
                    inner.remaining -= 1;
                    ticked = Some(inner.remaining);
                }
                let expired = inner.remaining == 0;
                if expired {
                    inner.state = TimerState::Expired;
                    if let Some(token) = inner.token.take() {
                        token.cancel();
                    }
                }
                (ticked, expired)
            };

            if let Some(remaining) = ticked {
                on_tick(remaining);
            }
            if expired {
                debug!("countdown expired");
                if let Some(f) = on_expire.take() {
                    f();
                }
            }
        };

        let token = self.scheduler.schedule(TICK_PERIOD, Box::new(callback));

        let mut inner = lock(&self.inner);
        if inner.generation == generation && inner.state == TimerState::Running {
            inner.token = Some(token);
        } else {
            token.cancel();
        }
    }

    /// Stop a running countdown. No effect in any other state.
    pub fn stop(&self) {
        let mut inner = lock(&self.inner);
        if inner.state == TimerState::Running {
            inner.state = TimerState::Stopped;
            debug!(remaining = inner.remaining, "countdown stopped");
        }
        if let Some(token) = inner.token.take() {
            token.cancel();
        }
    }

    #[must_use]
    pub fn state(&self) -> TimerState {
        lock(&self.inner).state
    }

    #[must_use]
    pub fn remaining_seconds(&self) -> u32 {
        lock(&self.inner).remaining
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.state() == TimerState::Expired
    }
}

impl Drop for CountdownTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn lock(inner: &Mutex<TimerInner>) -> MutexGuard<'_, TimerInner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}
