//! Price Update Cycle
//!
//! One cycle walks every stock, applies the price walk, writes accepted
//! changes to the store and broadcasts each one right after it is written.
//!
//! Cycles are mutually exclusive. The cycle lock is taken with `try_lock`, so
//! a cycle requested while another is running is dropped rather than queued.
//! The lock also owns the random generator, which is therefore only ever
//! touched by the single running cycle.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use chrono::Utc;
use parking_lot::Mutex;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::application::ports::{BroadcastError, PriceBroadcaster};
use crate::domain::pricing::{PriceWalk, WalkParams};
use crate::domain::stock::{PriceUpdate, Stock, StockStore, StoreError, Symbol};
use crate::infrastructure::metrics;

// =============================================================================
// Options
// =============================================================================

/// Options for the update cycle and its scheduler.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpdaterOptions {
    /// Time between scheduler ticks.
    pub interval: Duration,
    /// Price walk parameters.
    pub walk: WalkParams,
    /// Fixed seed for the random generator; `None` seeds from the OS.
    pub rng_seed: Option<u64>,
}

impl Default for UpdaterOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(250),
            walk: WalkParams::default(),
            rng_seed: None,
        }
    }
}

// =============================================================================
// Cycle Results
// =============================================================================

/// Summary of one completed cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Stocks visited.
    pub examined: usize,
    /// Stocks whose price was changed.
    pub changed: usize,
    /// Per-stock failures that were logged and skipped.
    pub failures: usize,
    /// Wall time spent in the cycle.
    pub duration: Duration,
}

/// Result of asking for a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Another cycle was running; nothing was done.
    Skipped,
    /// The cycle ran to completion.
    Completed(CycleReport),
}

/// Per-stock failure inside a cycle.
#[derive(Debug, thiserror::Error)]
pub enum UpdateError {
    /// The store rejected the new price.
    #[error("failed to store new price for {symbol}: {source}")]
    Mutation {
        /// Stock symbol.
        symbol: Symbol,
        /// Store error.
        #[source]
        source: StoreError,
    },

    /// Applying the change overflowed the price.
    #[error("price overflow for {symbol}: {price} + {change}")]
    PriceOverflow {
        /// Stock symbol.
        symbol: Symbol,
        /// Price before the change.
        price: Decimal,
        /// Change that overflowed.
        change: Decimal,
    },

    /// The change was stored but could not be broadcast.
    #[error("failed to broadcast price for {symbol}: {source}")]
    Broadcast {
        /// Stock symbol.
        symbol: Symbol,
        /// Broadcaster error.
        #[source]
        source: BroadcastError,
    },
}

// =============================================================================
// Statistics
// =============================================================================

/// Cumulative cycle counters.
#[derive(Debug, Default)]
struct CycleStats {
    completed: AtomicU64,
    skipped: AtomicU64,
    changes: AtomicU64,
    failures: AtomicU64,
}

/// Point-in-time copy of the cycle counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CycleStatsSnapshot {
    /// Cycles that ran to completion.
    pub completed: u64,
    /// Cycles dropped because another was running.
    pub skipped: u64,
    /// Price changes applied.
    pub changes: u64,
    /// Per-stock failures.
    pub failures: u64,
}

impl CycleStats {
    fn snapshot(&self) -> CycleStatsSnapshot {
        CycleStatsSnapshot {
            completed: self.completed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            changes: self.changes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

// =============================================================================
// Price Updater
// =============================================================================

/// State that only the running cycle may touch.
struct CycleState {
    rng: StdRng,
    sequence: u64,
}

/// Runs mutually exclusive price update cycles over a stock store.
pub struct PriceUpdater {
    store: Arc<StockStore>,
    walk: PriceWalk,
    broadcaster: Arc<dyn PriceBroadcaster>,
    cycle: Mutex<CycleState>,
    stats: CycleStats,
}

impl PriceUpdater {
    /// Create an updater over `store` that reports changes to `broadcaster`.
    #[must_use]
    pub fn new(
        store: Arc<StockStore>,
        broadcaster: Arc<dyn PriceBroadcaster>,
        options: &UpdaterOptions,
    ) -> Self {
        let rng = options
            .rng_seed
            .map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64);

        Self {
            store,
            walk: PriceWalk::new(options.walk),
            broadcaster,
            cycle: Mutex::new(CycleState { rng, sequence: 0 }),
            stats: CycleStats::default(),
        }
    }

    /// The store this updater mutates.
    #[must_use]
    pub const fn store(&self) -> &Arc<StockStore> {
        &self.store
    }

    /// Cumulative cycle counters.
    #[must_use]
    pub fn stats(&self) -> CycleStatsSnapshot {
        self.stats.snapshot()
    }

    /// Run one update cycle, or skip it if a cycle is already running.
    ///
    /// A failure on one stock is logged and does not stop the rest of the
    /// cycle. The cycle lock is released on every exit path, including
    /// unwinding.
    pub fn run_cycle(&self) -> CycleOutcome {
        let Some(mut state) = self.cycle.try_lock() else {
            self.stats.skipped.fetch_add(1, Ordering::Relaxed);
            metrics::record_cycle_skipped();
            tracing::trace!("Update cycle still running, tick skipped");
            return CycleOutcome::Skipped;
        };

        let started = Instant::now();
        let mut report = CycleReport::default();

        for stock in self.store.iter() {
            report.examined += 1;

            let update = match self.apply_change(&mut state, &stock) {
                Ok(Some(update)) => update,
                Ok(None) => continue,
                Err(e) => {
                    report.failures += 1;
                    tracing::warn!(symbol = %stock.symbol, error = %e, "Price update failed");
                    continue;
                }
            };
            report.changed += 1;

            if let Err(source) = self.broadcaster.broadcast(&update) {
                report.failures += 1;
                let e = UpdateError::Broadcast {
                    symbol: update.symbol,
                    source,
                };
                tracing::warn!(error = %e, "Price broadcast failed");
            }
        }

        drop(state);
        report.duration = started.elapsed();
        self.record(&report);

        CycleOutcome::Completed(report)
    }

    /// Decide and store the change for one stock.
    fn apply_change(
        &self,
        state: &mut CycleState,
        stock: &Stock,
    ) -> Result<Option<PriceUpdate>, UpdateError> {
        let Some(change) = self.walk.decide(&mut state.rng, stock.price) else {
            return Ok(None);
        };

        let price = stock
            .price
            .checked_add(change)
            .ok_or_else(|| UpdateError::PriceOverflow {
                symbol: stock.symbol.clone(),
                price: stock.price,
                change,
            })?;

        self.store
            .set_price(&stock.symbol, price)
            .map_err(|source| UpdateError::Mutation {
                symbol: stock.symbol.clone(),
                source,
            })?;

        state.sequence += 1;
        metrics::record_price_change(&stock.symbol);

        Ok(Some(PriceUpdate {
            symbol: stock.symbol.clone(),
            price,
            change,
            sequence: state.sequence,
            timestamp: Utc::now(),
        }))
    }

    fn record(&self, report: &CycleReport) {
        self.stats.completed.fetch_add(1, Ordering::Relaxed);
        self.stats
            .changes
            .fetch_add(report.changed as u64, Ordering::Relaxed);
        self.stats
            .failures
            .fetch_add(report.failures as u64, Ordering::Relaxed);

        metrics::record_cycle_completed(report.duration);
        if report.failures > 0 {
            metrics::record_mutation_failures(report.failures as u64);
        }

        tracing::debug!(
            examined = report.examined,
            changed = report.changed,
            failures = report.failures,
            duration_us = u64::try_from(report.duration.as_micros()).unwrap_or(u64::MAX),
            "Update cycle completed"
        );
    }
}

// =============================================================================
// Tests
// =============================================================================
