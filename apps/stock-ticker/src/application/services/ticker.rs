//! Ticker Service
//!
//! The externally visible handle of the ticker core. It owns the stock store
//! and the updater, and controls the scheduler's lifetime. The binary builds
//! exactly one of these and shares it with the transport via `Arc`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use super::scheduler::{SchedulerHandle, UpdateScheduler};
use super::updater::{CycleStatsSnapshot, PriceUpdater, UpdaterOptions};
use crate::application::ports::PriceBroadcaster;
use crate::domain::stock::{Stock, StockStore};

/// Ticker service errors.
#[derive(Debug, thiserror::Error)]
pub enum TickerError {
    /// `start` was called from a thread with no tokio runtime.
    #[error("no tokio runtime available to run the scheduler")]
    NoRuntime,
}

/// Shared ticker service reference.
pub type SharedTickerService = Arc<TickerService>;

/// Facade over the stock store and its update scheduler.
pub struct TickerService {
    updater: Arc<PriceUpdater>,
    interval: Duration,
    shutdown: CancellationToken,
    launched: AtomicBool,
    scheduler: Mutex<Option<SchedulerHandle>>,
}

impl TickerService {
    /// Create the service. The scheduler is not started until [`start`].
    ///
    /// `shutdown` is the process-wide token; the scheduler runs on a child of
    /// it, so cancelling it stops ticking too.
    ///
    /// [`start`]: TickerService::start
    #[must_use]
    pub fn new(
        store: Arc<StockStore>,
        broadcaster: Arc<dyn PriceBroadcaster>,
        options: &UpdaterOptions,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            updater: Arc::new(PriceUpdater::new(store, broadcaster, options)),
            interval: options.interval,
            shutdown,
            launched: AtomicBool::new(false),
            scheduler: Mutex::new(None),
        }
    }

    /// Snapshot all stocks, for subscribers that need initial state.
    #[must_use]
    pub fn all_stocks(&self) -> Vec<Stock> {
        self.updater.store().all()
    }

    /// Number of tracked stocks.
    #[must_use]
    pub fn stock_count(&self) -> usize {
        self.updater.store().len()
    }

    /// Start the scheduler.
    ///
    /// Only the first call starts anything, even under concurrent calls from
    /// many threads; every later call returns `Ok(false)`. There is no
    /// restart after [`stop`](TickerService::stop).
    ///
    /// # Errors
    ///
    /// Returns `TickerError::NoRuntime` if called outside a tokio runtime.
    pub fn start(&self) -> Result<bool, TickerError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| TickerError::NoRuntime)?;

        if self
            .launched
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(false);
        }

        let _guard = runtime.enter();
        let handle = UpdateScheduler::new(
            Arc::clone(&self.updater),
            self.interval,
            self.shutdown.child_token(),
        )
        .spawn();
        *self.scheduler.lock() = Some(handle);

        Ok(true)
    }

    /// Stop the scheduler and wait for any in-flight cycle to finish.
    ///
    /// Returns `false` if the scheduler was not running.
    pub async fn stop(&self) -> bool {
        let handle = self.scheduler.lock().take();
        match handle {
            Some(handle) => {
                handle.stop().await;
                true
            }
            None => false,
        }
    }

    /// Whether the scheduler is currently ticking.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.scheduler
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Cumulative cycle counters.
    #[must_use]
    pub fn stats(&self) -> CycleStatsSnapshot {
        self.updater.stats()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::application::ports::MockPriceBroadcaster;

    fn service() -> TickerService {
        let store = StockStore::new([
            Stock::new("MSFT", Decimal::new(3031, 2)),
            Stock::new("GOOG", Decimal::new(57030, 2)),
        ])
        .unwrap();
        let mut broadcaster = MockPriceBroadcaster::new();
        broadcaster.expect_broadcast().returning(|_| Ok(0));

        let options = UpdaterOptions {
            interval: Duration::from_millis(10),
            rng_seed: Some(1),
            ..UpdaterOptions::default()
        };
        TickerService::new(
            Arc::new(store),
            Arc::new(broadcaster),
            &options,
            CancellationToken::new(),
        )
    }

    #[test]
    fn all_stocks_before_start() {
        let service = service();
        let stocks = service.all_stocks();
        assert_eq!(stocks.len(), 2);
        assert_eq!(stocks[0].symbol, "MSFT");
        assert_eq!(service.stock_count(), 2);
        assert!(!service.is_running());
    }

    #[test]
    fn start_without_runtime_fails() {
        let service = service();
        assert!(matches!(service.start(), Err(TickerError::NoRuntime)));
        assert!(!service.is_running());
    }

    #[tokio::test]
    async fn start_once_then_stop() {
        let service = service();

        assert!(service.start().unwrap());
        assert!(!service.start().unwrap());
        assert!(service.is_running());

        assert!(service.stop().await);
        assert!(!service.is_running());
        assert!(!service.stop().await);

        // No restart
        assert!(!service.start().unwrap());
        assert!(!service.is_running());
    }

    #[tokio::test]
    async fn shutdown_token_stops_scheduler() {
        let shutdown = CancellationToken::new();
        let store = StockStore::new([Stock::new("MSFT", Decimal::new(3031, 2))]).unwrap();
        let mut broadcaster = MockPriceBroadcaster::new();
        broadcaster.expect_broadcast().returning(|_| Ok(0));
        let options = UpdaterOptions {
            interval: Duration::from_millis(10),
            ..UpdaterOptions::default()
        };
        let service = TickerService::new(
            Arc::new(store),
            Arc::new(broadcaster),
            &options,
            shutdown.clone(),
        );

        service.start().unwrap();
        shutdown.cancel();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!service.is_running());
    }
}
