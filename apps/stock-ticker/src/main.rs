//! Stock Ticker Binary
//!
//! Starts the ticker, the WebSocket transport and the health server.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin stock-ticker
//! ```
//!
//! # Environment Variables
//!
//! - `TICKER_UPDATE_INTERVAL_MS`: Tick period (default: 250)
//! - `TICKER_RANGE_PERCENT`: Maximum fractional change (default: 0.002)
//! - `TICKER_PICK_PROBABILITY`: Per-stock change probability (default: 0.10)
//! - `TICKER_RNG_SEED`: Fixed seed for reproducible runs (default: unset)
//! - `TICKER_STOCKS`: Seed list (default: MSFT=30.31,APPL=578.18,GOOG=570.30)
//! - `TICKER_HTTP_PORT`: Snapshot and WebSocket port (default: 8080)
//! - `TICKER_HEALTH_PORT`: Health check HTTP port (default: 8082)
//! - `TICKER_SUBSCRIBER_BUFFER`: Per-subscriber queue capacity (default: 256)
//! - `OTEL_ENABLED`: Enable OpenTelemetry (default: true)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: <http://localhost:4318>)
//! - `OTEL_SERVICE_NAME`: Service name (default: stock-ticker)
//! - `RUST_LOG`: Log level (default: info)

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use stock_ticker::infrastructure::broadcast::{BroadcastConfig, BroadcastHub};
use stock_ticker::infrastructure::health::{HealthServer, HealthServerState};
use stock_ticker::infrastructure::telemetry;
use stock_ticker::infrastructure::transport::{TransportServer, TransportState};
use stock_ticker::{
    PriceBroadcaster, StockStore, TickerConfig, TickerService, UpdaterOptions, init_metrics,
};
use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Upper bound on waiting for the scheduler to drain.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    // Initialize telemetry (OpenTelemetry + tracing)
    let _telemetry_guard = telemetry::init().context("failed to initialize telemetry")?;

    tracing::info!("Starting stock ticker");

    // Initialize Prometheus metrics
    let _metrics_handle = init_metrics().context("failed to install metrics recorder")?;

    let config = TickerConfig::from_env()?;
    log_config(&config);

    let store = StockStore::new(config.stocks.clone()).context("invalid seed stock list")?;

    let shutdown_token = CancellationToken::new();

    let hub = Arc::new(BroadcastHub::new(BroadcastConfig::from(
        config.broadcast.clone(),
    )));

    let ticker = Arc::new(TickerService::new(
        Arc::new(store),
        Arc::clone(&hub) as Arc<dyn PriceBroadcaster>,
        &UpdaterOptions::from(&config.ticker),
        shutdown_token.clone(),
    ));

    // Health server
    let health_state = Arc::new(HealthServerState::new(
        env!("CARGO_PKG_VERSION").to_string(),
        Arc::clone(&ticker),
        Arc::clone(&hub),
    ));
    let health_server = HealthServer::new(
        config.server.health_port,
        health_state,
        shutdown_token.clone(),
    );
    let health_shutdown = shutdown_token.clone();
    tokio::spawn(async move {
        if let Err(e) = health_server.run().await {
            tracing::error!(error = %e, "Health server error");
            health_shutdown.cancel();
        }
    });

    // Transport server
    let transport_server = TransportServer::new(
        config.server.http_port,
        TransportState::new(
            Arc::clone(&ticker),
            Arc::clone(&hub),
            shutdown_token.clone(),
        ),
    );
    let transport_shutdown = shutdown_token.clone();
    tokio::spawn(async move {
        if let Err(e) = transport_server.run().await {
            tracing::error!(error = %e, "Transport server error");
            transport_shutdown.cancel();
        }
    });

    ticker.start()?;
    tracing::info!(stocks = ticker.stock_count(), "Stock ticker ready");

    await_shutdown(shutdown_token).await;

    if tokio::time::timeout(SHUTDOWN_TIMEOUT, ticker.stop())
        .await
        .is_err()
    {
        tracing::warn!(
            timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
            "Scheduler did not stop in time"
        );
    }
    hub.close();

    tracing::info!(stats = ?ticker.stats(), "Stock ticker stopped");
    Ok(())
}

/// Log the parsed configuration.
fn log_config(config: &TickerConfig) {
    tracing::info!(
        interval_ms = u64::try_from(config.ticker.update_interval.as_millis()).unwrap_or(u64::MAX),
        range_percent = config.ticker.range_percent,
        pick_probability = config.ticker.pick_probability,
        seeded = config.ticker.rng_seed.is_some(),
        http_port = config.server.http_port,
        health_port = config.server.health_port,
        "Configuration loaded"
    );
    for stock in &config.stocks {
        tracing::debug!(symbol = %stock.symbol, price = %stock.price, "Seed stock");
    }
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        for dir in cwd.ancestors().skip(1) {
            let env_path = dir.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
        }
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT) or a server failure, then
/// cancel the token.
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
        () = shutdown_token.cancelled() => {
            tracing::warn!("Server failed, initiating shutdown");
        }
    }

    shutdown_token.cancel();
    tracing::info!("Graceful shutdown started");
}
