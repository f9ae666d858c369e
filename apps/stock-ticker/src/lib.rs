#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::cast_precision_loss,
        clippy::items_after_statements
    )
)]

//! Stock Ticker - Live Price Broadcaster
//!
//! Owns a fixed set of stock prices, nudges them on a timer with a bounded
//! random walk, and pushes every accepted change to connected clients.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Stock types, the stock store, and the price walk
//!   - `stock`: `Stock`, `PriceUpdate`, `StockStore`
//!   - `pricing`: `PriceWalk` change policy
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: `Subscriber` and `PriceBroadcaster`
//!   - `services`: `PriceUpdater`, `UpdateScheduler`, `TickerService`
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `broadcast`: Subscriber registry and fan-out
//!   - `transport`: HTTP snapshot and WebSocket stream
//!   - `config`: Environment configuration
//!   - `health`: Health check HTTP endpoint
//!
//! # Data Flow
//!
//! ```text
//!  timer ──► PriceUpdater ──► StockStore
//!                 │
//!                 ▼
//!           BroadcastHub ──► Client 1
//!                        ──► Client 2
//!                        ──► Client N
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Stock types and pricing policy.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::pricing::{PriceWalk, WalkParams};
pub use domain::stock::{PriceUpdate, Stock, StockStore, StoreError, Symbol};

// Ports
pub use application::ports::{BroadcastError, DeliveryError, PriceBroadcaster, Subscriber};

// Services
pub use application::services::{
    CycleOutcome, CycleReport, CycleStatsSnapshot, PriceUpdater, SharedTickerService,
    TickerError, TickerService, UpdaterOptions,
};

// Infrastructure config
pub use infrastructure::config::{
    BroadcastSettings, ConfigError, ServerSettings, TickerConfig, TickerSettings,
};

// Health server
pub use infrastructure::health::{HealthServer, HealthServerError, HealthServerState};

// Broadcast hub
pub use infrastructure::broadcast::{
    BroadcastConfig, BroadcastHub, BroadcastStats, ChannelSubscriber, SharedBroadcastHub,
    SubscriberId,
};

// Transport
pub use infrastructure::transport::{
    ServerMessage, TransportError, TransportServer, TransportState,
};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
