//! Configuration Module
//!
//! Environment-driven configuration for the ticker service.

mod settings;

pub use settings::{
    BroadcastSettings, ConfigError, DEFAULT_STOCKS, ServerSettings, TickerConfig, TickerSettings,
    parse_stock_list,
};
