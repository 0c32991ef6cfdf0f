//! Daemon error types.

use ride_client::{AuthFailure, ChannelError, SessionError};
use ride_domain::DomainError;
use ride_sim::SimError;
use ride_store::StoreError;
use thiserror::Error;

/// Daemon-level errors.
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Domain error
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// Store error
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Session error
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Live channel error
    #[error("Live channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Simulator error
    #[error("Simulator error: {0}")]
    Sim(#[from] SimError),

    /// Credential renewal failed; the session is over and needs a new login
    #[error("Session terminated: {0}")]
    SessionTerminated(AuthFailure),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for daemon operations.
pub type DaemonResult<T> = Result<T, DaemonError>;
