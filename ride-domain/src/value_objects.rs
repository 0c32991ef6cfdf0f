//! Value Objects for the Ride Domain
//!
//! Immutable, validated domain primitives.
//! All value objects enforce invariants at construction time.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Domain errors for value object validation
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DomainError {
    /// Subject identifiers must be non-empty
    #[error("Invalid subject: {0}")]
    InvalidSubject(String),

    /// Coordinate out of range or not finite
    #[error("Invalid coordinate: {0}")]
    InvalidCoordinate(String),

    /// A route needs at least one waypoint
    #[error("Route must contain at least one waypoint")]
    EmptyRoute,
}

// =============================================================================
// Subject
// =============================================================================

/// Opaque identifier of a tracked moving entity (e.g. a driver id).
///
/// Correlates the write path (simulator) with the read path (live channel).
///
/// # Invariants
/// - Non-empty after trimming
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Subject(String);

impl Subject {
    /// Create a new Subject with validation
    ///
    /// # Errors
    /// Returns `DomainError::InvalidSubject` if the id is blank
    pub fn new(id: impl Into<String>) -> Result<Self, DomainError> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(DomainError::InvalidSubject("Subject id cannot be empty".to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Get the raw identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Subject {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Subject> for String {
    fn from(subject: Subject) -> Self {
        subject.0
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Coordinate
// =============================================================================

/// A WGS84 latitude/longitude pair.
///
/// # Invariants
/// - Both components finite
/// - Latitude within [-90, 90]
/// - Longitude within [-180, 180]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCoordinate")]
pub struct Coordinate {
    latitude: f64,
    longitude: f64,
}

impl Coordinate {
    /// Create a new Coordinate with validation
    ///
    /// # Errors
    /// Returns `DomainError::InvalidCoordinate` if either component is out of range
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, DomainError> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(DomainError::InvalidCoordinate(format!(
                "latitude {} outside [-90, 90]",
                latitude
            )));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(DomainError::InvalidCoordinate(format!(
                "longitude {} outside [-180, 180]",
                longitude
            )));
        }
        Ok(Self { latitude, longitude })
    }

    /// Latitude in degrees
    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    /// Longitude in degrees
    pub fn longitude(&self) -> f64 {
        self.longitude
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}, {:.6})", self.latitude, self.longitude)
    }
}

/// Unvalidated wire shape, used only to route deserialization through `new`.
#[derive(Deserialize)]
struct RawCoordinate {
    latitude: f64,
    longitude: f64,
}

impl TryFrom<RawCoordinate> for Coordinate {
    type Error = DomainError;

    fn try_from(raw: RawCoordinate) -> Result<Self, Self::Error> {
        Self::new(raw.latitude, raw.longitude)
    }
}

// =============================================================================
// Tests
// =============================================================================
