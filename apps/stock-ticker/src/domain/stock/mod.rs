//! Stock Types and Store
//!
//! Domain types for the tracked stocks and the store that owns their prices.
//!
//! # Design
//!
//! The store is built once from the seed list and never grows or shrinks.
//! Each entry carries its own lock, so reading one price never waits on a
//! write to another. The symbol index is immutable after construction and
//! needs no lock at all.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// =============================================================================
// Types
// =============================================================================

/// A stock ticker symbol.
pub type Symbol = String;

/// A snapshot of one tracked stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stock {
    /// Ticker symbol, unique within a store.
    pub symbol: Symbol,
    /// Current price.
    pub price: Decimal,
}

impl Stock {
    /// Create a new stock snapshot.
    #[must_use]
    pub fn new(symbol: impl Into<Symbol>, price: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            price,
        }
    }
}

/// A single accepted price change, as delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceUpdate {
    /// Ticker symbol.
    pub symbol: Symbol,
    /// Price after the change was applied.
    pub price: Decimal,
    /// Signed change that was applied.
    pub change: Decimal,
    /// Position of this change in the global sequence of applied changes.
    pub sequence: u64,
    /// When the change was applied.
    pub timestamp: DateTime<Utc>,
}

impl PriceUpdate {
    /// The stock snapshot carried by this update.
    #[must_use]
    pub fn stock(&self) -> Stock {
        Stock::new(self.symbol.clone(), self.price)
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Stock store errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Two seed entries share a symbol.
    #[error("duplicate stock symbol: {0}")]
    DuplicateSymbol(Symbol),

    /// The symbol is not tracked by this store.
    #[error("unknown stock symbol: {0}")]
    UnknownSymbol(Symbol),
}

// =============================================================================
// Stock Store
// =============================================================================

#[derive(Debug)]
struct StockEntry {
    symbol: Symbol,
    price: RwLock<Decimal>,
}

impl StockEntry {
    fn snapshot(&self) -> Stock {
        Stock::new(self.symbol.clone(), *self.price.read())
    }
}

/// Thread-safe store of all tracked stocks.
///
/// # Example
///
/// ```rust
/// use rust_decimal::Decimal;
/// use stock_ticker::domain::stock::{Stock, StockStore};
///
/// let store = StockStore::new([
///     Stock::new("MSFT", Decimal::new(3031, 2)),
///     Stock::new("GOOG", Decimal::new(57030, 2)),
/// ])
/// .unwrap();
///
/// store.set_price("MSFT", Decimal::new(3040, 2)).unwrap();
/// assert_eq!(store.get("MSFT").unwrap().price, Decimal::new(3040, 2));
/// assert_eq!(store.all().len(), 2);
/// ```
#[derive(Debug)]
pub struct StockStore {
    entries: Vec<StockEntry>,
    index: HashMap<Symbol, usize>,
}

impl StockStore {
    /// Build the store from its seed stocks.
    ///
    /// Seed order is preserved by [`StockStore::all`].
    ///
    /// # Errors
    ///
    /// Returns `StoreError::DuplicateSymbol` if two seeds share a symbol.
    pub fn new(stocks: impl IntoIterator<Item = Stock>) -> Result<Self, StoreError> {
        let mut entries = Vec::new();
        let mut index = HashMap::new();

        for stock in stocks {
            if index.contains_key(&stock.symbol) {
                return Err(StoreError::DuplicateSymbol(stock.symbol));
            }
            index.insert(stock.symbol.clone(), entries.len());
            entries.push(StockEntry {
                symbol: stock.symbol,
                price: RwLock::new(stock.price),
            });
        }

        Ok(Self { entries, index })
    }

    /// Snapshot every stock, in seed order.
    ///
    /// Each stock is read atomically. Prices of different stocks may come
    /// from different update cycles if a cycle is running concurrently.
    #[must_use]
    pub fn all(&self) -> Vec<Stock> {
        self.iter().collect()
    }

    /// Iterate over stock snapshots lazily, in seed order.
    pub fn iter(&self) -> impl Iterator<Item = Stock> + '_ {
        self.entries.iter().map(StockEntry::snapshot)
    }

    /// Snapshot a single stock.
    #[must_use]
    pub fn get(&self, symbol: &str) -> Option<Stock> {
        self.index.get(symbol).map(|&i| self.entries[i].snapshot())
    }

    /// Replace the price of one stock, returning the previous price.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::UnknownSymbol` if the symbol is not tracked.
    pub fn set_price(&self, symbol: &str, price: Decimal) -> Result<Decimal, StoreError> {
        let &i = self
            .index
            .get(symbol)
            .ok_or_else(|| StoreError::UnknownSymbol(symbol.to_string()))?;

        let mut current = self.entries[i].price.write();
        Ok(std::mem::replace(&mut *current, price))
    }

    /// Number of tracked stocks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store tracks no stocks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// =============================================================================
// Tests
// =============================================================================
