//! # Geographic Utilities
//!
//! Core geographic computations shared by every trajectory component.
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`haversine_distance`] | Great-circle distance between two coordinates |
//! | [`haversine_distance_vector`] | Distances between each consecutive pair |
//! | [`bearing`] | Initial great-circle bearing, `[0, 360)` |
//! | [`stationary_runs`] | Runs of consecutive identical coordinates |
//! | [`compute_directions`] | Per-point headings with stationary-run repair |
//! | [`polyline_length`] | Total length of a point sequence |
//!
//! ## Example
//!
//! ```rust
//! use traj_refiner::{Coordinate, geo_utils};
//!
//! let beijing = Coordinate::new(116.4074, 39.9042);
//! let shanghai = Coordinate::new(121.4737, 31.2304);
//!
//! let d = geo_utils::haversine_distance(&beijing, &shanghai);
//! assert!((d - 1_067_000.0).abs() < 5_000.0);
//!
//! let b = geo_utils::bearing(&beijing, &shanghai);
//! assert!(b > 90.0 && b < 180.0);
//! ```
//!
//! ## Algorithm Notes
//!
//! Distances use the haversine formula on a sphere with the mean earth radius
//! 6371.0088 km (the radius `geo` uses for [`Haversine`]). The formula is
//! datum-agnostic to a first approximation, so it is applied to coordinates in
//! whichever system the trajectory is tagged with.

use std::ops::RangeInclusive;

use geo::{Bearing, Distance, Haversine, Point};
use serde::{Deserialize, Serialize};

use crate::{Coordinate, Located, Trajectory};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Mean earth radius in meters.
pub const EARTH_RADIUS_METERS: f64 = 6_371_008.8;

// =============================================================================
// Distance Functions
// =============================================================================

/// Great-circle distance between two coordinates in meters.
///
/// Returns exactly 0.0 for identical inputs.
#[inline]
pub fn haversine_distance(p1: &Coordinate, p2: &Coordinate) -> f64 {
    Haversine::distance(Point::new(p1.lng, p1.lat), Point::new(p2.lng, p2.lat))
}

/// Distance between each consecutive pair of points.
///
/// For `n` points the result has `n - 1` entries (empty when `n < 2`), each
/// identical to the corresponding [`haversine_distance`] call.
pub fn haversine_distance_vector<P: Located>(points: &[P]) -> Vec<f64> {
    points
        .windows(2)
        .map(|w| haversine_distance(&w[0].coord(), &w[1].coord()))
        .collect()
}

/// Parallel version of [`haversine_distance_vector`] for long trajectories.
#[cfg(feature = "parallel")]
pub fn haversine_distance_vector_parallel<P: Located + Sync>(points: &[P]) -> Vec<f64> {
    points
        .par_windows(2)
        .map(|w| haversine_distance(&w[0].coord(), &w[1].coord()))
        .collect()
}

/// Total length of a point sequence in meters.
pub fn polyline_length<P: Located>(points: &[P]) -> f64 {
    haversine_distance_vector(points).iter().sum()
}

// =============================================================================
// Bearings
// =============================================================================

/// Initial great-circle bearing from `p1` toward `p2`, in degrees `[0, 360)`.
///
/// Degenerate input (`p1 == p2`) yields 0; callers that need a meaningful
/// heading there should use [`compute_directions`], which repairs stationary runs.
pub fn bearing(p1: &Coordinate, p2: &Coordinate) -> f64 {
    if p1 == p2 {
        return 0.0;
    }
    Haversine::bearing(Point::new(p1.lng, p1.lat), Point::new(p2.lng, p2.lat))
}

/// Maximal runs of consecutive points sharing identical coordinates.
///
/// Every returned range spans at least two indices.
pub fn stationary_runs<P: Located>(points: &[P]) -> Vec<RangeInclusive<usize>> {
    let mut runs = Vec::new();
    let mut start: Option<usize> = None;

    for i in 0..points.len().saturating_sub(1) {
        if points[i].coord() == points[i + 1].coord() {
            start.get_or_insert(i);
        } else if let Some(s) = start.take() {
            runs.push(s..=i);
        }
    }
    if let Some(s) = start {
        runs.push(s..=points.len() - 1);
    }
    runs
}

/// Heading of every point.
///
/// Each point takes the bearing from its predecessor. Points inside a
/// stationary run take the bearing from the point just before the run to the
/// point just after it. The first point copies the second's heading.
pub fn compute_directions<P: Located>(points: &[P]) -> Vec<f64> {
    let n = points.len();
    if n < 2 {
        return vec![0.0; n];
    }

    let coords: Vec<Coordinate> = points.iter().map(Located::coord).collect();
    let mut directions = vec![0.0; n];
    for i in 1..n {
        directions[i] = bearing(&coords[i - 1], &coords[i]);
    }

    for run in stationary_runs(&coords) {
        let before = run.start().saturating_sub(1);
        let after = (*run.end() + 1).min(n - 1);
        let heading = bearing(&coords[before], &coords[after]);
        for i in run {
            directions[i] = heading;
        }
    }
    directions[0] = directions[1];
    directions
}

// =============================================================================
// Trajectory Summary
// =============================================================================

/// Basic statistics of a trajectory, attached to output metadata as `traj_info`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectorySummary {
    pub point_count: usize,
    /// Sum of consecutive haversine distances (m)
    pub length_meters: f64,
    pub start_time: Option<i64>,
    pub end_time: Option<i64>,
    /// End minus start time (ms), when both are known
    pub duration_ms: Option<i64>,
    /// Mean of the recorded point speeds (km/h)
    pub avg_speed: Option<f64>,
    pub max_speed: Option<f64>,
}

impl TrajectorySummary {
    pub fn from_trajectory(trajectory: &Trajectory) -> Self {
        let points = &trajectory.points;
        let start_time = points.first().and_then(|p| p.timestamp);
        let end_time = points.last().and_then(|p| p.timestamp);

        let speeds: Vec<f64> = points.iter().filter_map(|p| p.speed).collect();
        let (avg_speed, max_speed) = if speeds.is_empty() {
            (None, None)
        } else {
            (
                Some(speeds.iter().sum::<f64>() / speeds.len() as f64),
                Some(speeds.iter().cloned().fold(f64::MIN, f64::max)),
            )
        };

        Self {
            point_count: points.len(),
            length_meters: polyline_length(points),
            start_time,
            end_time,
            duration_ms: start_time.zip(end_time).map(|(s, e)| e - s),
            avg_speed,
            max_speed,
        }
    }
}
