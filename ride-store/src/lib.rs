//! Ride Storage Layer
//!
//! Holds the session's current credential pair.
//!
//! # Architecture
//!
//! - **`CredentialStore` trait**: the storage interface (port), injected into
//!   the refresh coordinator and the request gateway
//! - **In-memory store**: process-local backend, also used in tests
//! - **File store**: JSON-on-disk backend that survives restarts
//!
//! # Usage
//!
//! ```rust
//! use ride_store::{CredentialStore, MemoryCredentialStore};
//! use ride_domain::CredentialPair;
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = MemoryCredentialStore::new();
//!
//!     store.set(CredentialPair::new("access", "refresh")).await.unwrap();
//!     assert!(store.get().await.unwrap().is_some());
//!
//!     store.clear().await.unwrap();
//!     assert!(store.get().await.unwrap().is_none());
//! }
//! ```

#![warn(clippy::all)]

// Modules
mod credential_store;
mod error;

// Re-exports
pub use credential_store::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
pub use error::StoreError;
