//! Update Scheduler
//!
//! Drives the price updater from a periodic timer.
//!
//! Every tick hands a cycle to the blocking pool and goes straight back to
//! waiting for the next tick, so a slow cycle does not delay the timer. A tick
//! that arrives while a cycle is still running reaches the updater, finds the
//! cycle lock taken, and is dropped there.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::updater::{CycleOutcome, PriceUpdater};

/// Periodic driver for a [`PriceUpdater`].
pub struct UpdateScheduler {
    updater: Arc<PriceUpdater>,
    interval: Duration,
    cancel: CancellationToken,
}

impl UpdateScheduler {
    /// Create a scheduler that ticks every `interval` until `cancel` fires.
    #[must_use]
    pub const fn new(
        updater: Arc<PriceUpdater>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            updater,
            interval,
            cancel,
        }
    }

    /// Spawn the timer loop onto the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    #[must_use]
    pub fn spawn(self) -> SchedulerHandle {
        let cancel = self.cancel.clone();
        let task = tokio::spawn(self.run());
        SchedulerHandle { cancel, task }
    }

    /// Run the timer loop until cancelled.
    ///
    /// Cycles already running when the token fires are awaited before this
    /// returns; no cycle starts after that.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut cycles = JoinSet::new();

        tracing::info!(
            interval_ms = u64::try_from(self.interval.as_millis()).unwrap_or(u64::MAX),
            "Update scheduler started"
        );

        loop {
            tokio::select! {
                biased;

                () = self.cancel.cancelled() => break,

                Some(joined) = cycles.join_next() => log_cycle_result(joined),

                _ = ticker.tick() => {
                    let updater = Arc::clone(&self.updater);
                    let cancel = self.cancel.clone();
                    cycles.spawn_blocking(move || {
                        if cancel.is_cancelled() {
                            return None;
                        }
                        Some(updater.run_cycle())
                    });
                }
            }
        }

        while let Some(joined) = cycles.join_next().await {
            log_cycle_result(joined);
        }

        tracing::info!("Update scheduler stopped");
    }
}

fn log_cycle_result(joined: Result<Option<CycleOutcome>, JoinError>) {
    match joined {
        Ok(_) => {}
        Err(e) if e.is_panic() => {
            tracing::error!(error = %e, "Update cycle panicked");
        }
        Err(e) => {
            tracing::warn!(error = %e, "Update cycle task failed");
        }
    }
}

/// Handle to a running scheduler.
#[derive(Debug)]
pub struct SchedulerHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stop ticking and wait for any in-flight cycle to finish.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Update scheduler task failed");
        }
    }

    /// Whether the timer loop has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::str::FromStr;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use rust_decimal::Decimal;

    use super::*;
    use crate::application::ports::{BroadcastError, PriceBroadcaster};
    use crate::application::services::updater::UpdaterOptions;
    use crate::domain::pricing::WalkParams;
    use crate::domain::stock::{PriceUpdate, Stock, StockStore};

    #[derive(Default)]
    struct CountingBroadcaster {
        calls: AtomicUsize,
    }

    impl PriceBroadcaster for CountingBroadcaster {
        fn broadcast(&self, _update: &PriceUpdate) -> Result<usize, BroadcastError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(1)
        }
    }

    fn updater(broadcaster: Arc<CountingBroadcaster>) -> Arc<PriceUpdater> {
        let store = StockStore::new([Stock::new("MSFT", Decimal::from_str("30.31").unwrap())])
            .unwrap();
        let options = UpdaterOptions {
            interval: Duration::from_millis(10),
            walk: WalkParams {
                pick_probability: 1.0,
                ..WalkParams::default()
            },
            rng_seed: Some(9),
        };
        Arc::new(PriceUpdater::new(Arc::new(store), broadcaster, &options))
    }

    #[tokio::test]
    async fn scheduler_runs_cycles_until_stopped() {
        let broadcaster = Arc::new(CountingBroadcaster::default());
        let updater = updater(Arc::clone(&broadcaster));

        let handle = UpdateScheduler::new(
            Arc::clone(&updater),
            Duration::from_millis(10),
            CancellationToken::new(),
        )
        .spawn();

        tokio::time::sleep(Duration::from_millis(120)).await;
        handle.stop().await;

        let completed = updater.stats().completed;
        assert!(completed >= 3, "only {completed} cycles ran");

        let calls_at_stop = broadcaster.calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(broadcaster.calls.load(Ordering::SeqCst), calls_at_stop);
    }

    #[tokio::test]
    async fn first_tick_waits_one_interval() {
        let broadcaster = Arc::new(CountingBroadcaster::default());
        let updater = updater(Arc::clone(&broadcaster));

        let handle = UpdateScheduler::new(
            Arc::clone(&updater),
            Duration::from_secs(60),
            CancellationToken::new(),
        )
        .spawn();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(updater.stats().completed, 0);

        handle.stop().await;
    }

    #[tokio::test]
    async fn parent_cancellation_stops_scheduler() {
        let broadcaster = Arc::new(CountingBroadcaster::default());
        let cancel = CancellationToken::new();

        let handle = UpdateScheduler::new(
            updater(broadcaster),
            Duration::from_millis(10),
            cancel.child_token(),
        )
        .spawn();

        cancel.cancel();
        let result = tokio::time::timeout(Duration::from_millis(500), async {
            while !handle.is_finished() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        assert!(result.is_ok(), "scheduler should exit on cancellation");
    }
}
