//! Ticker Configuration Settings
//!
//! Configuration types for the ticker service, loaded from environment
//! variables.

use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;

use crate::application::services::UpdaterOptions;
use crate::domain::pricing::WalkParams;
use crate::domain::stock::Stock;

/// Seed stocks used when `TICKER_STOCKS` is not set.
pub const DEFAULT_STOCKS: &str = "MSFT=30.31,APPL=578.18,GOOG=570.30";

/// Price update settings.
#[derive(Debug, Clone, PartialEq)]
pub struct TickerSettings {
    /// Time between update ticks.
    pub update_interval: Duration,
    /// Maximum change per update as a fraction of price.
    pub range_percent: f64,
    /// Probability that a stock changes in a given cycle.
    pub pick_probability: f64,
    /// Fixed random seed for reproducible runs.
    pub rng_seed: Option<u64>,
}

impl Default for TickerSettings {
    fn default() -> Self {
        let walk = WalkParams::default();
        Self {
            update_interval: Duration::from_millis(250),
            range_percent: walk.range_percent,
            pick_probability: walk.pick_probability,
            rng_seed: None,
        }
    }
}

impl From<&TickerSettings> for UpdaterOptions {
    fn from(settings: &TickerSettings) -> Self {
        Self {
            interval: settings.update_interval,
            walk: WalkParams {
                pick_probability: settings.pick_probability,
                range_percent: settings.range_percent,
                ..WalkParams::default()
            },
            rng_seed: settings.rng_seed,
        }
    }
}

/// Broadcast settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastSettings {
    /// Queue capacity of each connected subscriber.
    pub subscriber_buffer: usize,
}

impl Default for BroadcastSettings {
    fn default() -> Self {
        Self {
            subscriber_buffer: 256,
        }
    }
}

/// Server port settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    /// Stock transport (snapshot + WebSocket) port.
    pub http_port: u16,
    /// Health check HTTP port.
    pub health_port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            http_port: 8080,
            health_port: 8082,
        }
    }
}

/// Complete ticker configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct TickerConfig {
    /// Price update settings.
    pub ticker: TickerSettings,
    /// Broadcast settings.
    pub broadcast: BroadcastSettings,
    /// Server port settings.
    pub server: ServerSettings,
    /// Seed stocks, in display order.
    pub stocks: Vec<Stock>,
}

impl TickerConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if a value is present but invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = TickerSettings::default();

        let update_interval = parse_or(&lookup, "TICKER_UPDATE_INTERVAL_MS", None)?
            .map_or(defaults.update_interval, Duration::from_millis);
        if update_interval.is_zero() {
            return Err(invalid("TICKER_UPDATE_INTERVAL_MS", "0"));
        }

        let range_percent: f64 =
            parse_or(&lookup, "TICKER_RANGE_PERCENT", Some(defaults.range_percent))?
                .unwrap_or(defaults.range_percent);
        if !(range_percent > 0.0 && range_percent < 1.0) {
            return Err(invalid("TICKER_RANGE_PERCENT", range_percent));
        }

        let pick_probability: f64 = parse_or(
            &lookup,
            "TICKER_PICK_PROBABILITY",
            Some(defaults.pick_probability),
        )?
        .unwrap_or(defaults.pick_probability);
        if !(0.0..=1.0).contains(&pick_probability) {
            return Err(invalid("TICKER_PICK_PROBABILITY", pick_probability));
        }

        let rng_seed = parse_or(&lookup, "TICKER_RNG_SEED", None)?;

        let ticker = TickerSettings {
            update_interval,
            range_percent,
            pick_probability,
            rng_seed,
        };

        let broadcast = BroadcastSettings {
            subscriber_buffer: parse_or(
                &lookup,
                "TICKER_SUBSCRIBER_BUFFER",
                Some(BroadcastSettings::default().subscriber_buffer),
            )?
            .unwrap_or_default(),
        };
        if broadcast.subscriber_buffer == 0 {
            return Err(invalid("TICKER_SUBSCRIBER_BUFFER", 0));
        }

        let server = ServerSettings {
            http_port: parse_or(
                &lookup,
                "TICKER_HTTP_PORT",
                Some(ServerSettings::default().http_port),
            )?
            .unwrap_or_default(),
            health_port: parse_or(
                &lookup,
                "TICKER_HEALTH_PORT",
                Some(ServerSettings::default().health_port),
            )?
            .unwrap_or_default(),
        };

        let stocks = parse_stock_list(
            "TICKER_STOCKS",
            lookup("TICKER_STOCKS").as_deref().unwrap_or(DEFAULT_STOCKS),
        )?;

        Ok(Self {
            ticker,
            broadcast,
            server,
            stocks,
        })
    }
}

impl Default for TickerConfig {
    fn default() -> Self {
        Self {
            ticker: TickerSettings::default(),
            broadcast: BroadcastSettings::default(),
            server: ServerSettings::default(),
            stocks: parse_stock_list("TICKER_STOCKS", DEFAULT_STOCKS).unwrap_or_default(),
        }
    }
}

/// Configuration error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),

    /// Environment variable could not be parsed or is out of range.
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// Offending value.
        value: String,
    },
}

fn invalid(key: &str, value: impl ToString) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

/// Parse `key` if present. Absent keys yield `default`.
fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: Option<T>,
) -> Result<Option<T>, ConfigError> {
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| invalid(key, raw)),
    }
}

/// Parse a `SYMBOL=PRICE,SYMBOL=PRICE` seed list.
///
/// Duplicate symbols are left for the stock store to reject.
///
/// # Errors
///
/// Returns an error if the list is empty or an entry is malformed.
pub fn parse_stock_list(key: &str, raw: &str) -> Result<Vec<Stock>, ConfigError> {
    let stocks = raw
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (symbol, price) = entry.split_once('=').ok_or_else(|| invalid(key, entry))?;
            let symbol = symbol.trim();
            let price = Decimal::from_str(price.trim()).map_err(|_| invalid(key, entry))?;
            if symbol.is_empty() || price.is_sign_negative() {
                return Err(invalid(key, entry));
            }
            Ok(Stock::new(symbol.to_uppercase(), price))
        })
        .collect::<Result<Vec<_>, _>>()?;

    if stocks.is_empty() {
        return Err(ConfigError::EmptyValue(key.to_string()));
    }
    Ok(stocks)
}
