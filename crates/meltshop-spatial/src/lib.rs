//! Spatial layout for the melt shop: bays, equipment placement, and ladle-car
//! path planning.
//!
//! Bays are axis-aligned rectangles holding equipment positions and named
//! crane runways. The [`SpatialPlanner`] owns every bay and answers
//! bay-to-bay path queries with a memoized cache keyed by
//! `(from, to, car type)`. Reconfiguring the layout drops the cache.
//!
//! # Routing
//!
//! Tapping and treatment cars use an L-shaped route (horizontal leg first,
//! then vertical). Every other routing class drives a straight line between
//! bay centers. Travel time for a segment is `distance / ladle_car_speed`.

use serde::{Deserialize, Serialize};

pub mod bay;
pub mod planner;

pub use bay::{Bay, PlacedEquipment};
pub use planner::{DEFAULT_LADLE_CAR_SPEED, SpatialPlanner};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A point on the plant floor, in plant units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance(&self, other: &Point) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// A horizontal crane runway inside a bay.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CranePath {
    pub start_x: f64,
    pub end_x: f64,
    pub y: f64,
}

impl CranePath {
    /// The parking point at the start of the runway.
    pub fn start(&self) -> Point {
        Point::new(self.start_x, self.y)
    }
}

/// Ladle car classes. The class decides which routing heuristic applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CarType {
    /// Carries heats between bays, typically EAF to LMF.
    Tapping,
    /// Carries heats between units of the same bay and to casters.
    Treatment,
    /// Serves the RH degasser.
    Rh,
}

impl CarType {
    /// All car classes, in fleet-construction order.
    pub fn all() -> [CarType; 3] {
        [CarType::Tapping, CarType::Treatment, CarType::Rh]
    }

    /// Lowercase label used in names and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            CarType::Tapping => "tapping",
            CarType::Treatment => "treatment",
            CarType::Rh => "rh",
        }
    }

    /// Whether paths for this class follow the horizontal-then-vertical route.
    pub fn uses_l_route(&self) -> bool {
        matches!(self, CarType::Tapping | CarType::Treatment)
    }
}

impl std::fmt::Display for CarType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One straight leg of a ladle-car path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathSegment {
    pub from: Point,
    pub to: Point,
    pub distance: f64,
    /// Minutes needed to drive this leg at the configured car speed.
    pub travel_time: f64,
}

/// Total distance of a path.
pub fn path_distance(path: &[PathSegment]) -> f64 {
    path.iter().map(|s| s.distance).sum()
}

/// Total travel time of a path.
pub fn path_travel_time(path: &[PathSegment]) -> f64 {
    path.iter().map(|s| s.travel_time).sum()
}

/// Errors from spatial operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SpatialError {
    #[error("bay '{bay}' has non-positive extent ({width} x {height})")]
    InvalidGeometry { bay: String, width: f64, height: f64 },
    #[error("bay '{0}' is defined twice")]
    DuplicateBay(String),
    #[error("bay '{0}' does not exist")]
    UnknownBay(String),
    #[error("position ({x}, {y}) lies outside bay '{bay}'")]
    OutOfBounds { bay: String, x: f64, y: f64 },
    #[error("ladle car speed must be positive, got {0}")]
    InvalidSpeed(f64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_distance_is_euclidean() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert_eq!(a.distance(&b), 5.0);
        assert_eq!(b.distance(&a), 5.0);
    }

    #[test]
    fn car_type_routing_classes() {
        assert!(CarType::Tapping.uses_l_route());
        assert!(CarType::Treatment.uses_l_route());
        assert!(!CarType::Rh.uses_l_route());
    }

    #[test]
    fn car_type_displays_lowercase() {
        assert_eq!(CarType::Treatment.to_string(), "treatment");
        assert_eq!(CarType::Rh.as_str(), "rh");
    }

    #[test]
    fn path_totals_sum_segments() {
        let path = vec![
            PathSegment {
                from: Point::new(0.0, 0.0),
                to: Point::new(10.0, 0.0),
                distance: 10.0,
                travel_time: 2.0,
            },
            PathSegment {
                from: Point::new(10.0, 0.0),
                to: Point::new(10.0, 5.0),
                distance: 5.0,
                travel_time: 1.0,
            },
        ];
        assert_eq!(path_distance(&path), 15.0);
        assert_eq!(path_travel_time(&path), 3.0);
    }
}
