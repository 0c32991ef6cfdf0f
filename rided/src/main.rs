//! Ride Daemon
//!
//! Keeps an authenticated session alive, optionally simulates a driver and
//! watches a subject's live positions.
//!
//! # Usage
//!
//! ```bash
//! # Start with default configuration
//! cargo run -p rided
//!
//! # Simulate a driver against a local backend
//! RIDE_ACCESS_TOKEN=... RIDE_REFRESH_TOKEN=... RIDE_SIM_SUBJECT=driver-7 cargo run -p rided
//! ```
//!
//! # Environment Variables
//!
//! - `RIDE_ENV`: Environment (test, development, production)
//! - `RIDE_API_URL`: REST base URL (default: http://127.0.0.1:8080)
//! - `RIDE_WS_URL`: Live channel URL (default: ws://127.0.0.1:8080/ws/positions)
//! - `RIDE_ACCESS_TOKEN` / `RIDE_REFRESH_TOKEN`: Initial credential pair
//! - `RIDE_CREDENTIALS_PATH`: Persist credentials to this file
//! - `RIDE_LOOKAHEAD_SECS`: Expiry lookahead (default: 300)
//! - `RIDE_RENEWAL_INTERVAL_SECS`: Background renewal period (default: 240)
//! - `RIDE_SIM_SUBJECT`: Simulate this subject
//! - `RIDE_SIM_INTERVAL_MS`: Simulator tick (default: 2000)
//! - `RIDE_SIM_ROUTE_PATH`: JSON route file (default: built-in demo route)
//! - `RIDE_WATCH_SUBJECT`: Log live positions for this subject

use rided::{Config, Daemon};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("rided=info".parse()?))
        .init();

    // Load configuration
    let config = Config::from_env()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = %config.environment,
        api_url = %config.api.base_url,
        ws_url = %config.api.ws_url,
        "Ride Daemon"
    );

    // Create and run daemon
    let daemon = Daemon::from_config(config).await?;
    daemon.run().await?;

    Ok(())
}
