//! Ride Position Simulator
//!
//! Produces positions for a subject by walking a route there-and-back on a
//! timer, writing each waypoint through the authenticated session.
//!
//! # Example
//!
//! ```rust,ignore
//! use ride_sim::{demo_route, PositionSimulator};
//!
//! let simulator = PositionSimulator::new(subject, demo_route()?, session.gateway());
//! simulator.start();
//! // ...
//! simulator.stop().await;
//! ```

#![warn(clippy::all)]

pub mod error;
pub mod route_file;
pub mod simulator;

// Re-exports for convenience
pub use error::{SimError, SimResult};
pub use route_file::{demo_route, load_route};
pub use simulator::{PositionSimulator, SimulatorState, DEFAULT_INTERVAL};
