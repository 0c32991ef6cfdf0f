//! Ride Daemon Library
//!
//! Runtime host for the ride session core.
//!
//! # Architecture
//!
//! ```text
//! PositionSimulator → Gateway → RestClient → backend
//!                        ↑
//!               RefreshCoordinator ← RenewalScheduler
//!                        ↓
//!                  Session Events → Daemon (terminates on AuthenticationFailed)
//!
//! backend → WsPositionFeed → LivePositionChannel → watcher (logs fixes)
//! ```
//!
//! # Components
//!
//! - **Daemon**: Main runtime orchestrator
//! - **Config**: Environment-based configuration
//!
//! # Example
//!
//! ```rust,ignore
//! use rided::{Config, Daemon};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let daemon = Daemon::from_config(config).await?;
//!     daemon.run().await?;
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]

pub mod config;
pub mod daemon;
pub mod error;

// Re-exports for convenience
pub use config::{ApiConfig, Config, Environment, SessionSettings, SimulatorConfig};
pub use daemon::Daemon;
pub use error::{DaemonError, DaemonResult};
