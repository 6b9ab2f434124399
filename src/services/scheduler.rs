// src/services/scheduler.rs
//! Recurring background tasks with explicit cancellation.
//!
//! Every polling loop in the dashboard (auth-state refresh, session-expiry
//! watch, per-table sync) is spawned through [`spawn_periodic`] and owned by
//! the [`TaskHandle`] it returns.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::debug;

/// When the first run of a periodic task happens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirstRun {
    /// Run right away, then every period
    Immediately,
    /// Wait one full period before the first run
    AfterPeriod,
}

/// Cancellation handle for a periodic task.
///
/// `cancel` is idempotent. Dropping the handle cancels the task, so a task
/// never outlives the context that started it.
#[derive(Debug)]
pub struct TaskHandle {
    name: String,
    cancel_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl TaskHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Suppress every future run. A run already in progress completes.
    pub fn cancel(&self) {
        if !self.cancel_tx.send_replace(true) {
            debug!(task = %self.name, "Periodic task cancelled");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel_tx.borrow()
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Spawn `task` every `period` on the tokio runtime until cancelled.
///
/// Runs never overlap: a slow run delays the next tick rather than stacking.
pub fn spawn_periodic<F, Fut>(
    name: impl Into<String>,
    period: Duration,
    first_run: FirstRun,
    mut task: F,
) -> TaskHandle
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let name = name.into();
    let period = period.max(Duration::from_millis(1));
    let (cancel_tx, mut cancel_rx) = watch::channel(false);

    let task_name = name.clone();
    let join = tokio::spawn(async move {
        let start = match first_run {
            FirstRun::Immediately => Instant::now(),
            FirstRun::AfterPeriod => Instant::now() + period,
        };
        let mut interval = time::interval_at(start, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        debug!(task = %task_name, period_ms = period.as_millis() as u64, "Periodic task started");

        loop {
            if *cancel_rx.borrow() {
                break;
            }
            tokio::select! {
                biased;
                changed = cancel_rx.changed() => {
                    // Err means the handle is gone, which also cancels
                    if changed.is_err() || *cancel_rx.borrow() {
                        break;
                    }
                }
                _ = interval.tick() => {
                    if *cancel_rx.borrow() {
                        break;
                    }
                    task().await;
                }
            }
        }

        debug!(task = %task_name, "Periodic task stopped");
    });

    TaskHandle {
        name,
        cancel_tx,
        join,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting_task(
        first_run: FirstRun,
        period: Duration,
    ) -> (TaskHandle, Arc<AtomicUsize>) {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();
        let handle = spawn_periodic("test", period, first_run, move || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
            }
        });
        (handle, counter)
    }

    /// Let spawned tasks observe the current (paused) time
    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_after_period_waits_for_first_tick() {
        let (_handle, counter) = counting_task(FirstRun::AfterPeriod, Duration::from_secs(60));
        settle().await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        time::advance(Duration::from_secs(60)).await;
        settle().await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        time::advance(Duration::from_secs(120)).await;
        settle().await;
        assert!(counter.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_first_run() {
        let (_handle, counter) = counting_task(FirstRun::Immediately, Duration::from_secs(5));
        settle().await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_first_run_suppresses_all_runs() {
        let (handle, counter) = counting_task(FirstRun::AfterPeriod, Duration::from_secs(1));
        handle.cancel();

        time::advance(Duration::from_secs(10)).await;
        settle().await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert!(handle.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_is_idempotent_and_stops_future_runs() {
        let (handle, counter) = counting_task(FirstRun::Immediately, Duration::from_secs(1));
        settle().await;
        let fired = counter.load(Ordering::SeqCst);
        assert_eq!(fired, 1);

        handle.cancel();
        handle.cancel();

        time::advance(Duration::from_secs(10)).await;
        settle().await;
        assert_eq!(counter.load(Ordering::SeqCst), fired);
        assert!(handle.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_after_task_died_still_marks_cancelled() {
        let handle = spawn_periodic("panics", Duration::from_secs(1), FirstRun::Immediately, || {
            async { panic!("tick failed") }
        });
        settle().await;
        assert!(handle.is_finished());
        assert!(!handle.is_cancelled());

        handle.cancel();
        assert!(handle.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels() {
        let (handle, counter) = counting_task(FirstRun::AfterPeriod, Duration::from_secs(1));
        drop(handle);

        time::advance(Duration::from_secs(5)).await;
        settle().await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
