use std::time::Duration;

use showfarm_core::quiz::{CancelToken, Scheduler, Tick};
use tokio::runtime::{Handle, TryCurrentError};
use tokio::time::{Instant, MissedTickBehavior};

/// Wall-clock `Scheduler` backed by a tokio interval task per schedule.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    handle: Handle,
}

impl TokioScheduler {
    #[must_use]
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Scheduler bound to the runtime of the calling task.
    ///
    /// # Errors
    ///
    /// Returns `TryCurrentError` when called outside a tokio runtime.
    pub fn current() -> Result<Self, TryCurrentError> {
        Handle::try_current().map(Self::new)
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, period: Duration, mut callback: Tick) -> CancelToken {
        let token = CancelToken::new();
        let cancelled = token.clone();

        self.handle.spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);
            loop {
                ticker.tick().await;
                if cancelled.is_cancelled() {
                    break;
                }
                callback();
                if cancelled.is_cancelled() {
                    break;
                }
            }
        });

        token
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn fires_every_period_until_cancelled() {
        let scheduler = TokioScheduler::current().unwrap();
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let token = scheduler.schedule(
            Duration::from_secs(1),
            Box::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            }),
        );

        tokio::time::sleep(Duration::from_millis(3_500)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);

        token.cancel();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }
}
