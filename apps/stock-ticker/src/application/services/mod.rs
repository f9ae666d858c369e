//! Application Services
//!
//! Services that orchestrate domain logic and coordinate between ports.
//!
//! - `PriceUpdater`: One mutually exclusive update cycle over the store
//! - `UpdateScheduler`: Periodic timer driving the updater
//! - `TickerService`: Facade owning the store, updater and scheduler lifetime

pub mod scheduler;
pub mod ticker;
pub mod updater;

pub use scheduler::{SchedulerHandle, UpdateScheduler};
pub use ticker::{SharedTickerService, TickerError, TickerService};
pub use updater::{
    CycleOutcome, CycleReport, CycleStatsSnapshot, PriceUpdater, UpdateError, UpdaterOptions,
};
