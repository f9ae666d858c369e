//! Broadcast Hub
//!
//! Fans accepted price changes out to every registered subscriber.
//!
//! # Architecture
//!
//! Each subscriber owns its delivery path. The stock transport registers a
//! `ChannelSubscriber` per client, backed by a bounded tokio mpsc queue that
//! is filled with `try_send`, so a slow client loses updates instead of
//! stalling the update cycle. A closed queue means the client went away and
//! its subscriber is removed on the next broadcast.
//!
//! Updates for one subscriber arrive in the order they were broadcast: each
//! queue is FIFO and update cycles never overlap.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::RwLock;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::BroadcastSettings;
use crate::application::ports::{BroadcastError, DeliveryError, PriceBroadcaster, Subscriber};
use crate::domain::stock::PriceUpdate;
use crate::infrastructure::metrics::{self, DropReason};

// =============================================================================
// Subscribers
// =============================================================================

/// Unique identifier for a registered subscriber.
pub type SubscriberId = Uuid;

/// Subscriber backed by a bounded tokio mpsc queue.
#[derive(Debug, Clone)]
pub struct ChannelSubscriber {
    tx: mpsc::Sender<PriceUpdate>,
}

impl ChannelSubscriber {
    /// Create a subscriber and the receiving end of its queue.
    #[must_use]
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<PriceUpdate>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl Subscriber for ChannelSubscriber {
    fn notify(&self, update: &PriceUpdate) -> Result<(), DeliveryError> {
        self.tx.try_send(update.clone()).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryError::Lagging,
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Disconnected,
        })
    }
}

// =============================================================================
// Broadcast Hub
// =============================================================================

/// Configuration for the broadcast hub.
#[derive(Debug, Clone, Copy)]
pub struct BroadcastConfig {
    /// Queue capacity of each channel subscriber.
    pub subscriber_capacity: usize,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            subscriber_capacity: 256,
        }
    }
}

impl From<BroadcastSettings> for BroadcastConfig {
    fn from(settings: BroadcastSettings) -> Self {
        Self {
            subscriber_capacity: settings.subscriber_buffer,
        }
    }
}

/// Central registry of subscribers and fan-out point for price updates.
///
/// # Example
///
/// ```rust
/// use stock_ticker::infrastructure::broadcast::{BroadcastConfig, BroadcastHub};
///
/// let hub = BroadcastHub::new(BroadcastConfig::default());
///
/// // Register a queue-backed subscriber
/// let (id, _rx) = hub.subscribe();
/// assert_eq!(hub.subscriber_count(), 1);
///
/// // In the update cycle, hub.broadcast(&update) reaches `_rx`
///
/// hub.unregister(id);
/// assert_eq!(hub.subscriber_count(), 0);
/// ```
pub struct BroadcastHub {
    config: BroadcastConfig,
    subscribers: RwLock<HashMap<SubscriberId, Arc<dyn Subscriber>>>,
    closed: AtomicBool,
    delivered: AtomicU64,
    dropped: AtomicU64,
}

impl BroadcastHub {
    /// Create a new broadcast hub with the given configuration.
    #[must_use]
    pub fn new(config: BroadcastConfig) -> Self {
        Self {
            config,
            subscribers: RwLock::new(HashMap::new()),
            closed: AtomicBool::new(false),
            delivered: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Create a new broadcast hub with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(BroadcastConfig::default())
    }

    /// Register any subscriber implementation.
    pub fn register(&self, subscriber: Arc<dyn Subscriber>) -> SubscriberId {
        let id = Uuid::new_v4();
        let count = {
            let mut subscribers = self.subscribers.write();
            subscribers.insert(id, subscriber);
            subscribers.len()
        };
        metrics::set_subscribers(count);
        tracing::debug!(subscriber_id = %id, subscribers = count, "Subscriber registered");
        id
    }

    /// Register a queue-backed subscriber and return its receiving end.
    #[must_use]
    pub fn subscribe(&self) -> (SubscriberId, mpsc::Receiver<PriceUpdate>) {
        let (subscriber, rx) = ChannelSubscriber::new(self.config.subscriber_capacity);
        (self.register(Arc::new(subscriber)), rx)
    }

    /// Remove a subscriber. Returns `false` if it was not registered.
    pub fn unregister(&self, id: SubscriberId) -> bool {
        let (removed, count) = {
            let mut subscribers = self.subscribers.write();
            let removed = subscribers.remove(&id).is_some();
            (removed, subscribers.len())
        };
        if removed {
            metrics::set_subscribers(count);
            tracing::debug!(subscriber_id = %id, subscribers = count, "Subscriber unregistered");
        }
        removed
    }

    /// Number of registered subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Refuse all further broadcasts and drop every subscriber.
    ///
    /// Dropping a channel subscriber closes its queue, so receivers see the
    /// end of the stream.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.subscribers.write().clear();
        metrics::set_subscribers(0);
    }

    /// Whether the hub has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Get delivery statistics.
    #[must_use]
    pub fn stats(&self) -> BroadcastStats {
        BroadcastStats {
            subscribers: self.subscriber_count(),
            delivered: self.delivered.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }

    fn remove_disconnected(&self, ids: &[SubscriberId]) {
        let count = {
            let mut subscribers = self.subscribers.write();
            for id in ids {
                subscribers.remove(id);
            }
            subscribers.len()
        };
        metrics::set_subscribers(count);
        tracing::debug!(
            removed = ids.len(),
            subscribers = count,
            "Disconnected subscribers removed"
        );
    }
}

impl PriceBroadcaster for BroadcastHub {
    fn broadcast(&self, update: &PriceUpdate) -> Result<usize, BroadcastError> {
        if self.is_closed() {
            return Err(BroadcastError::Closed);
        }

        // Notify outside the lock so registration never waits on delivery
        let targets: Vec<(SubscriberId, Arc<dyn Subscriber>)> = self
            .subscribers
            .read()
            .iter()
            .map(|(id, subscriber)| (*id, Arc::clone(subscriber)))
            .collect();

        let mut delivered = 0_usize;
        let mut disconnected = Vec::new();

        for (id, subscriber) in &targets {
            match subscriber.notify(update) {
                Ok(()) => delivered += 1,
                Err(DeliveryError::Lagging) => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    metrics::record_notification_dropped(DropReason::Lagging);
                    tracing::warn!(
                        subscriber_id = %id,
                        symbol = %update.symbol,
                        "Subscriber lagging, update dropped"
                    );
                }
                Err(DeliveryError::Disconnected) => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    metrics::record_notification_dropped(DropReason::Disconnected);
                    disconnected.push(*id);
                }
            }
        }

        if !disconnected.is_empty() {
            self.remove_disconnected(&disconnected);
        }

        self.delivered
            .fetch_add(delivered as u64, Ordering::Relaxed);
        metrics::record_notifications_sent(delivered as u64);

        Ok(delivered)
    }
}

/// Shared broadcast hub reference.
pub type SharedBroadcastHub = Arc<BroadcastHub>;

/// Statistics about the broadcast hub.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct BroadcastStats {
    /// Number of registered subscribers.
    pub subscribers: usize,
    /// Updates handed to subscribers.
    pub delivered: u64,
    /// Updates lost to lagging or disconnected subscribers.
    pub dropped: u64,
}

// =============================================================================
// Tests
// =============================================================================
