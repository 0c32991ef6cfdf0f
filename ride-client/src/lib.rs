//! Ride Client Session Layer
//!
//! Authenticated access to the ride-hailing backend with single-flight
//! credential renewal and a live position channel.
//!
//! # Architecture
//!
//! ```text
//! caller → Gateway ──(expired / 401)──► RefreshCoordinator → RenewalPort
//!             │                               ▲
//!             ▼                               │
//!          HttpPort                    RenewalScheduler (periodic)
//!
//! PositionFeedPort → LivePositionChannel → PositionSubscription
//! ```
//!
//! # Components
//!
//! - **Ports**: Traits for the REST transport, the renewal endpoint and the live feed
//! - **Coordinator**: At most one renewal exchange in flight, shared by all callers
//! - **Gateway**: Attaches the bearer, renews on expiry, retries a 401 once
//! - **Scheduler**: Proactive renewal on a fixed period
//! - **Channel**: Single-subject live position subscription
//! - **Session**: Wires the above over one credential store
//! - **Stub**: Test implementations for development
//!
//! # Example
//!
//! ```rust,ignore
//! use ride_client::{ApiRequest, Session, SessionConfig, StubHttp, StubRenewal};
//! use ride_store::MemoryCredentialStore;
//! use std::sync::Arc;
//!
//! let session = Session::new(
//!     Arc::new(MemoryCredentialStore::new()),
//!     Arc::new(StubRenewal::issuing(pair)),
//!     Arc::new(StubHttp::new()),
//!     SessionConfig::default(),
//! );
//!
//! session.login(initial_pair).await?;
//! session.start_renewal();
//! let response = session.execute(ApiRequest::get("/rides")).await?;
//! ```

#![warn(clippy::all)]

pub mod channel;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod gateway;
pub mod ports;
pub mod scheduler;
pub mod session;
pub mod stub;
pub mod token;

// Re-exports for convenience
pub use channel::{LivePositionChannel, PositionSubscription};
pub use coordinator::{RefreshCoordinator, RefreshOutcome};
pub use error::{AuthFailure, ChannelError, SessionError, SessionResult};
pub use events::{SessionEvent, SessionEventReceiver, SessionEvents};
pub use gateway::Gateway;
pub use ports::{
    ApiRequest, ApiResponse, FeedConnection, HttpPort, Method, PositionFeedPort, PositionSink,
    RenewalPort, POSITION_WRITE_PATH,
};
pub use scheduler::{RenewalScheduler, DEFAULT_RENEWAL_INTERVAL};
pub use session::{Session, SessionConfig};
pub use stub::{unsigned_token, StubFeed, StubHttp, StubRenewal};
pub use token::DEFAULT_LOOKAHEAD;
