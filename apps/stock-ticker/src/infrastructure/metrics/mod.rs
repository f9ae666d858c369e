//! Prometheus Metrics Module
//!
//! Exposes ticker metrics in Prometheus format.
//!
//! # Metrics Categories
//!
//! - **Cycles**: Completed and skipped update cycles, cycle duration
//! - **Prices**: Price changes per symbol, mutation failures
//! - **Delivery**: Notifications sent and dropped, connected subscribers
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on the health server port. Recording
//! before [`init_metrics`] is a no-op.

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// Calling this again returns the handle installed by the first call.
///
/// # Errors
///
/// Returns an error if another global recorder is already installed.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    register_metrics();
    Ok(PROMETHEUS_HANDLE.get_or_init(|| handle).clone())
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    // Cycles
    describe_counter!(
        "stock_ticker_cycles_total",
        "Update cycles by outcome (completed or skipped)"
    );
    describe_histogram!(
        "stock_ticker_cycle_duration_seconds",
        "Time to run one completed update cycle"
    );

    // Prices
    describe_counter!(
        "stock_ticker_price_changes_total",
        "Price changes applied, by symbol"
    );
    describe_counter!(
        "stock_ticker_mutation_failures_total",
        "Per-stock failures skipped during update cycles"
    );

    // Delivery
    describe_counter!(
        "stock_ticker_notifications_sent_total",
        "Price updates delivered to subscribers"
    );
    describe_counter!(
        "stock_ticker_notifications_dropped_total",
        "Price updates not delivered, by reason"
    );
    describe_gauge!(
        "stock_ticker_subscribers",
        "Number of connected subscribers"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Why a notification was not delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Subscriber queue was full.
    Lagging,
    /// Subscriber went away.
    Disconnected,
}

impl DropReason {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Lagging => "lagging",
            Self::Disconnected => "disconnected",
        }
    }
}

/// Record a tick that found a cycle already running.
pub fn record_cycle_skipped() {
    counter!("stock_ticker_cycles_total", "outcome" => "skipped").increment(1);
}

/// Record a completed cycle and its duration.
pub fn record_cycle_completed(duration: Duration) {
    counter!("stock_ticker_cycles_total", "outcome" => "completed").increment(1);
    histogram!("stock_ticker_cycle_duration_seconds").record(duration.as_secs_f64());
}

/// Record an applied price change.
pub fn record_price_change(symbol: &str) {
    counter!(
        "stock_ticker_price_changes_total",
        "symbol" => symbol.to_string()
    )
    .increment(1);
}

/// Record per-stock failures from one cycle.
pub fn record_mutation_failures(count: u64) {
    counter!("stock_ticker_mutation_failures_total").increment(count);
}

/// Record notifications delivered by one broadcast.
pub fn record_notifications_sent(count: u64) {
    counter!("stock_ticker_notifications_sent_total").increment(count);
}

/// Record one undelivered notification.
pub fn record_notification_dropped(reason: DropReason) {
    counter!(
        "stock_ticker_notifications_dropped_total",
        "reason" => reason.as_str()
    )
    .increment(1);
}

/// Update the connected subscriber count.
#[allow(clippy::cast_precision_loss)]
pub fn set_subscribers(count: usize) {
    gauge!("stock_ticker_subscribers").set(count as f64);
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drop_reason_as_str() {
        assert_eq!(DropReason::Lagging.as_str(), "lagging");
        assert_eq!(DropReason::Disconnected.as_str(), "disconnected");
    }

    #[test]
    fn recording_without_recorder_is_noop() {
        record_cycle_skipped();
        record_cycle_completed(Duration::from_millis(3));
        record_price_change("MSFT");
        record_mutation_failures(2);
        record_notifications_sent(5);
        record_notification_dropped(DropReason::Lagging);
        set_subscribers(1);
    }
}
