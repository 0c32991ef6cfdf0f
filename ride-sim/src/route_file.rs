//! Route sources: JSON route files and the built-in demo route.
//!
//! A route file is a JSON array of `{ "latitude", "longitude" }` objects in
//! traversal order.

use ride_domain::{Coordinate, Route};
use std::path::Path;
use tracing::info;

use crate::error::SimResult;

/// Built-in demo waypoints (latitude, longitude).
const DEMO_WAYPOINTS: [(f64, f64); 6] = [
    (10.7769, 106.7009),
    (10.7786, 106.7032),
    (10.7803, 106.7051),
    (10.7821, 106.7040),
    (10.7838, 106.7022),
    (10.7852, 106.6998),
];

/// Load a route from a JSON file.
///
/// # Errors
/// - `SimError::Io` if the file cannot be read
/// - `SimError::Route` if it is not a non-empty array of valid coordinates
pub async fn load_route(path: impl AsRef<Path>) -> SimResult<Route> {
    let path = path.as_ref();
    let contents = tokio::fs::read_to_string(path).await?;
    let route: Route = serde_json::from_str(&contents)?;

    info!(path = %path.display(), waypoints = route.waypoints().len(), "Route loaded");
    Ok(route)
}

/// Small built-in route for demos and local runs.
pub fn demo_route() -> SimResult<Route> {
    let waypoints = DEMO_WAYPOINTS
        .iter()
        .map(|&(lat, lng)| Coordinate::new(lat, lng))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Route::new(waypoints)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SimError;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("ride-sim-{}-{}.json", name, std::process::id()))
    }

    #[test]
    fn test_demo_route_is_valid() {
        let route = demo_route().unwrap();
        assert_eq!(route.waypoints().len(), DEMO_WAYPOINTS.len());
        assert_eq!(route.start().latitude(), 10.7769);
    }

    #[tokio::test]
    async fn test_load_route_from_file() {
        let path = temp_path("ok");
        tokio::fs::write(
            &path,
            r#"[{"latitude": 1.0, "longitude": 2.0}, {"latitude": 3.0, "longitude": 4.0}]"#,
        )
        .await
        .unwrap();

        let route = load_route(&path).await.unwrap();
        tokio::fs::remove_file(&path).await.unwrap();

        assert_eq!(route.waypoints().len(), 2);
        assert_eq!(route.waypoint_at(2).latitude(), 3.0);
    }

    #[tokio::test]
    async fn test_load_route_rejects_empty_and_invalid() {
        let empty = temp_path("empty");
        tokio::fs::write(&empty, "[]").await.unwrap();
        let result = load_route(&empty).await;
        tokio::fs::remove_file(&empty).await.unwrap();
        assert!(matches!(result, Err(SimError::Route(_))));

        let invalid = temp_path("invalid");
        tokio::fs::write(&invalid, r#"[{"latitude": 95.0, "longitude": 0.0}]"#)
            .await
            .unwrap();
        let result = load_route(&invalid).await;
        tokio::fs::remove_file(&invalid).await.unwrap();
        assert!(matches!(result, Err(SimError::Route(_))));
    }

    #[tokio::test]
    async fn test_load_route_missing_file() {
        let result = load_route(temp_path("missing")).await;
        assert!(matches!(result, Err(SimError::Io(_))));
    }
}
