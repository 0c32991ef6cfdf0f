//! Session event bus.
//!
//! The hosting application subscribes here instead of the session core
//! navigating anywhere itself: an `AuthenticationFailed` event is the cue to
//! clear UI state and return to login.
//!
//! Uses tokio broadcast channels for fan-out to multiple receivers.

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

use crate::error::AuthFailure;

// =============================================================================
// Event Types
// =============================================================================

/// Events published by the session core.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Credentials were installed by an explicit login
    LoggedIn {
        /// When the login happened
        at: DateTime<Utc>,
    },

    /// A renewal episode completed and a new pair was stored
    Refreshed {
        /// Renewal episode number
        episode: u64,
        /// When the new pair was stored
        at: DateTime<Utc>,
    },

    /// Renewal failed; credentials were cleared and the session is over
    AuthenticationFailed {
        /// Why the renewal failed
        reason: AuthFailure,
        /// When the session ended
        at: DateTime<Utc>,
    },

    /// Credentials were removed by an explicit logout
    LoggedOut {
        /// When the logout happened
        at: DateTime<Utc>,
    },
}

// =============================================================================
// Event Bus
// =============================================================================

/// Fan-out bus for session events.
pub struct SessionEvents {
    sender: broadcast::Sender<SessionEvent>,
}

impl SessionEvents {
    /// Create a new event bus with specified capacity.
    ///
    /// Capacity determines how many events can be buffered before
    /// slow receivers start missing events (lagging). Clamped to at least 1.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event to all subscribers.
    ///
    /// Returns the number of receivers that received the event.
    pub fn publish(&self, event: SessionEvent) -> usize {
        // send() only fails when nobody is listening
        self.sender.send(event).unwrap_or(0)
    }

    /// Subscribe to events sent after this call.
    pub fn subscribe(&self) -> SessionEventReceiver {
        SessionEventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    /// Get the number of active receivers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for SessionEvents {
    fn default() -> Self {
        Self::new(64)
    }
}

/// Receiver for session events.
pub struct SessionEventReceiver {
    receiver: broadcast::Receiver<SessionEvent>,
}

impl SessionEventReceiver {
    /// Receive the next event.
    ///
    /// Returns `None` if the bus has been dropped.
    /// Returns error description if the receiver lagged (missed events).
    pub async fn recv(&mut self) -> Option<Result<SessionEvent, String>> {
        match self.receiver.recv().await {
            Ok(event) => Some(Ok(event)),
            Err(broadcast::error::RecvError::Closed) => None,
            Err(broadcast::error::RecvError::Lagged(count)) => {
                Some(Err(format!("Receiver lagged, missed {} events", count)))
            },
        }
    }

    /// Try to receive an event without blocking.
    ///
    /// Returns `None` if no event is immediately available.
    pub fn try_recv(&mut self) -> Option<Result<SessionEvent, String>> {
        match self.receiver.try_recv() {
            Ok(event) => Some(Ok(event)),
            Err(broadcast::error::TryRecvError::Empty) => None,
            Err(broadcast::error::TryRecvError::Closed) => None,
            Err(broadcast::error::TryRecvError::Lagged(count)) => {
                Some(Err(format!("Receiver lagged, missed {} events", count)))
            },
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
