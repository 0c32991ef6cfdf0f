//! Simulator error types.

use ride_client::SessionError;
use ride_domain::DomainError;
use thiserror::Error;

/// Errors from the position simulator.
#[derive(Debug, Error)]
pub enum SimError {
    /// The position write failed
    #[error("Position write failed: {0}")]
    Session(#[from] SessionError),

    /// Route file is unreadable or describes no valid route
    #[error("Invalid route: {0}")]
    Route(String),

    /// Route file could not be read
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<DomainError> for SimError {
    fn from(e: DomainError) -> Self {
        SimError::Route(e.to_string())
    }
}

impl From<serde_json::Error> for SimError {
    fn from(e: serde_json::Error) -> Self {
        SimError::Route(e.to_string())
    }
}

/// Result type for simulator operations.
pub type SimResult<T> = Result<T, SimError>;
