//! Routes traversed by the position simulator.
//!
//! A route is a fixed ordered list of waypoints, logically doubled by
//! appending its own reverse so that traversal forms a there-and-back cycle:
//!
//! ```text
//! [A, B, C]  →  A B C C B A  A B C C B A ...
//! ```
//!
//! Indices into the doubled sequence run over `0..doubled_len()` and wrap.

use serde::{Deserialize, Serialize};

use crate::value_objects::{Coordinate, DomainError};

/// A non-empty ordered sequence of waypoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Coordinate>", into = "Vec<Coordinate>")]
pub struct Route {
    waypoints: Vec<Coordinate>,
}

impl Route {
    /// Create a route from its forward waypoints.
    ///
    /// # Errors
    /// Returns `DomainError::EmptyRoute` if no waypoints are given
    pub fn new(waypoints: Vec<Coordinate>) -> Result<Self, DomainError> {
        if waypoints.is_empty() {
            return Err(DomainError::EmptyRoute);
        }
        Ok(Self { waypoints })
    }

    /// Forward waypoints, as given.
    pub fn waypoints(&self) -> &[Coordinate] {
        &self.waypoints
    }

    /// Length of the there-and-back cycle.
    pub fn doubled_len(&self) -> usize {
        self.waypoints.len() * 2
    }

    /// Advance a traversal index by one step, wrapping at the cycle length.
    pub fn next_index(&self, index: usize) -> usize {
        (index + 1) % self.doubled_len()
    }

    /// Waypoint at `index` of the doubled sequence (index wraps).
    pub fn waypoint_at(&self, index: usize) -> Coordinate {
        let n = self.waypoints.len();
        let i = index % self.doubled_len();
        if i < n {
            self.waypoints[i]
        } else {
            // Mirrored half: position n maps to the last waypoint.
            self.waypoints[2 * n - 1 - i]
        }
    }

    /// First waypoint of the cycle.
    pub fn start(&self) -> Coordinate {
        self.waypoints[0]
    }
}

impl TryFrom<Vec<Coordinate>> for Route {
    type Error = DomainError;

    fn try_from(waypoints: Vec<Coordinate>) -> Result<Self, Self::Error> {
        Self::new(waypoints)
    }
}

impl From<Route> for Vec<Coordinate> {
    fn from(route: Route) -> Self {
        route.waypoints
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn coord(lat: f64) -> Coordinate {
        Coordinate::new(lat, 0.0).unwrap()
    }

    #[test]
    fn test_empty_route_rejected() {
        assert_eq!(Route::new(vec![]), Err(DomainError::EmptyRoute));
    }

    #[test]
    fn test_doubled_sequence_is_palindrome() {
        let route = Route::new(vec![coord(1.0), coord(2.0), coord(3.0)]).unwrap();
        let cycle: Vec<f64> = (0..route.doubled_len())
            .map(|i| route.waypoint_at(i).latitude())
            .collect();

        assert_eq!(cycle, vec![1.0, 2.0, 3.0, 3.0, 2.0, 1.0]);
    }

    #[test]
    fn test_next_index_wraps_at_doubled_length() {
        let route = Route::new(vec![coord(1.0), coord(2.0)]).unwrap();

        let mut index = 0;
        for _ in 0..route.doubled_len() {
            index = route.next_index(index);
        }
        assert_eq!(index, 0);
        assert_eq!(route.waypoint_at(index), route.start());
    }

    #[test]
    fn test_single_waypoint_route() {
        let route = Route::new(vec![coord(5.0)]).unwrap();
        assert_eq!(route.doubled_len(), 2);
        assert_eq!(route.waypoint_at(1), coord(5.0));
    }

    #[test]
    fn test_route_from_json() {
        let json = r#"[{"latitude": 1.0, "longitude": 2.0}, {"latitude": 3.0, "longitude": 4.0}]"#;
        let route: Route = serde_json::from_str(json).unwrap();
        assert_eq!(route.waypoints().len(), 2);

        assert!(serde_json::from_str::<Route>("[]").is_err());
    }
}
