//! Live position samples.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value_objects::{Coordinate, DomainError, Subject};

/// A position fix for a subject.
///
/// Ephemeral and last-value-wins: consumers keep only the most recent sample
/// per subject, never a history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Who is at this position
    pub subject: Subject,
    /// Where they are
    pub coordinate: Coordinate,
    /// When the fix was observed by this client
    pub timestamp: DateTime<Utc>,
}

impl Position {
    /// Create a position stamped with the current time.
    pub fn new(subject: Subject, coordinate: Coordinate) -> Self {
        Self {
            subject,
            coordinate,
            timestamp: Utc::now(),
        }
    }

    /// Latitude in degrees
    pub fn latitude(&self) -> f64 {
        self.coordinate.latitude()
    }

    /// Longitude in degrees
    pub fn longitude(&self) -> f64 {
        self.coordinate.longitude()
    }
}

/// Raw push event as relayed by the live channel transport.
///
/// Also the body shape of a position write. Values are unvalidated until
/// converted with [`PositionEvent::into_position`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionEvent {
    /// Subject id the server scoped this event to
    pub subject: String,
    /// Latitude in degrees
    pub latitude: f64,
    /// Longitude in degrees
    pub longitude: f64,
}

impl PositionEvent {
    /// Validate into a domain `Position`, stamped now.
    ///
    /// # Errors
    /// Returns a `DomainError` if the subject is blank or the coordinate invalid
    pub fn into_position(self) -> Result<Position, DomainError> {
        let subject = Subject::new(self.subject)?;
        let coordinate = Coordinate::new(self.latitude, self.longitude)?;
        Ok(Position::new(subject, coordinate))
    }
}
