//! Ride Domain Layer
//!
//! Pure domain types with zero I/O dependencies: session credentials,
//! tracked subjects, positions and routes.

#![warn(missing_docs)]
#![warn(clippy::all)]

// Public modules
pub mod credentials;
pub mod position;
pub mod route;
pub mod value_objects;

// Re-export commonly used types
pub use credentials::{CredentialPair, SessionState};
pub use position::{Position, PositionEvent};
pub use route::Route;
pub use value_objects::{Coordinate, DomainError, Subject};
