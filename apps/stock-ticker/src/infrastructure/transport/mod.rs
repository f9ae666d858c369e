//! Stock Transport
//!
//! Thin session layer between the ticker and its clients: a JSON snapshot
//! endpoint and a WebSocket stream of price updates.
//!
//! # Wire Format
//!
//! Every WebSocket frame is a JSON text frame tagged by `type`:
//!
//! ```json
//! {"type":"snapshot","stocks":[{"symbol":"MSFT","price":"30.31"}]}
//! {"type":"updateStockPrice","stock":{"symbol":"MSFT","price":"30.37","change":"0.06","sequence":1,"timestamp":"..."}}
//! ```

pub mod server;

use serde::{Deserialize, Serialize};

use crate::domain::stock::{PriceUpdate, Stock};

pub use server::{TransportServer, TransportState, router, serve};

/// Messages pushed to WebSocket clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    /// Every stock at the time the session opened.
    Snapshot {
        /// Stocks in display order.
        stocks: Vec<Stock>,
    },
    /// One accepted price change.
    UpdateStockPrice {
        /// The change.
        stock: PriceUpdate,
    },
}

/// Transport server errors.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to bind to port.
    #[error("failed to bind to port {0}: {1}")]
    BindFailed(u16, String),

    /// Server error.
    #[error("server error: {0}")]
    ServerFailed(String),
}
