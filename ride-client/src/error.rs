//! Session core error types.

use ride_store::StoreError;
use thiserror::Error;

/// Why a session could not be authenticated.
///
/// Cloneable: one renewal outcome is shared by every waiter of a refresh
/// episode, so all of them observe the identical failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthFailure {
    /// Nothing to exchange; the session was never logged in or was cleared
    #[error("No refresh token available")]
    NoRefreshToken,

    /// Renewal endpoint refused the refresh token
    #[error("Refresh rejected (HTTP {status}): {message}")]
    RefreshRejected {
        /// HTTP status returned by the renewal endpoint
        status: u16,
        /// Server-provided reason, if any
        message: String,
    },

    /// Renewal exchange failed in transport
    #[error("Renewal network failure: {0}")]
    RenewalNetwork(String),

    /// Renewal endpoint answered with an unusable body
    #[error("Malformed renewal response: {0}")]
    MalformedResponse(String),

    /// A token could not be decoded or is already expired
    #[error("Malformed credential: {0}")]
    MalformedCredential(String),

    /// The request was still unauthorized after one forced refresh
    #[error("Unauthorized after retry")]
    UnauthorizedAfterRetry,

    /// Credential store failed while settling the renewal
    #[error("Credential store failure: {0}")]
    Store(String),

    /// Renewal task ended without an outcome
    #[error("Renewal aborted: {0}")]
    Aborted(String),
}

/// Errors returned by the request gateway and session facade.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The session is not (or no longer) authenticated; the host should
    /// send the user back to login.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(#[from] AuthFailure),

    /// Transient transport failure, returned to the caller as-is
    #[error("Network failure: {0}")]
    Network(String),

    /// A call whose caller needs success got another status
    #[error("Unexpected HTTP status: {0}")]
    UnexpectedStatus(u16),

    /// Credential store error
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl SessionError {
    /// Check if this error should end the session in the host application.
    pub fn is_authentication_failure(&self) -> bool {
        matches!(self, SessionError::AuthenticationFailed(_))
    }
}

/// Live position channel errors.
#[derive(Debug, Clone, Error)]
pub enum ChannelError {
    /// Could not open the transport connection
    #[error("Failed to connect live channel: {0}")]
    ConnectionFailed(String),

    /// Transport delivered a message that is not a position event
    #[error("Invalid message: {0}")]
    InvalidMessage(String),
}

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;
