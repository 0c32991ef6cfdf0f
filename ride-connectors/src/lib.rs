//! Ride Backend Connectors
//!
//! Adapters for the ride backend (REST + WebSocket).
//! Implement the session core's ports over real transports.

#![warn(clippy::all)]

// Public modules
pub mod rest;
pub mod ws;

// Re-exports
pub use rest::{RestClient, RestError, RENEWAL_PATH};
pub use ws::{WsError, WsPositionFeed};
