//! Port Interfaces
//!
//! Defines the interfaces (ports) between the ticker core and the outside
//! world, following the Hexagonal Architecture pattern. These are the
//! contracts that infrastructure adapters must implement.
//!
//! ## Driven Ports (Outbound)
//!
//! - `PriceBroadcaster`: Fan-out of accepted price changes
//! - `Subscriber`: A single connected observer of price changes

use crate::domain::stock::PriceUpdate;

/// A connected observer of price changes.
///
/// Implementations must not block: the update cycle calls `notify` while it
/// holds the cycle lock.
#[cfg_attr(test, mockall::automock)]
pub trait Subscriber: Send + Sync {
    /// Deliver one price change to this subscriber.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError` if the update could not be handed over.
    fn notify(&self, update: &PriceUpdate) -> Result<(), DeliveryError>;
}

/// Fan-out of accepted price changes to every current subscriber.
#[cfg_attr(test, mockall::automock)]
pub trait PriceBroadcaster: Send + Sync {
    /// Deliver `update` to all subscribers, returning how many received it.
    ///
    /// Failures of individual subscribers are absorbed by the broadcaster.
    ///
    /// # Errors
    ///
    /// Returns `BroadcastError` if the broadcaster itself can no longer
    /// deliver anything.
    fn broadcast(&self, update: &PriceUpdate) -> Result<usize, BroadcastError>;
}

/// Failure to deliver an update to one subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    /// The subscriber is not keeping up; this update was dropped for it.
    #[error("subscriber queue is full")]
    Lagging,

    /// The subscriber has gone away.
    #[error("subscriber disconnected")]
    Disconnected,
}

/// Failure of the broadcaster as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BroadcastError {
    /// The broadcaster has been closed for shutdown.
    #[error("broadcaster is closed")]
    Closed,
}
