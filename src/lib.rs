//! # Traj Refiner
//!
//! GPS trajectory refinement: coordinate-system normalization, noise removal,
//! point-count simplification and gap filling, plus synthesis of speed and
//! timestamp fields for trajectories that start out as bare geometry.
//!
//! This library provides:
//! - Haversine/bearing primitives and stationary-run repair
//! - WGS84 / GCJ02 / BD09 coordinate conversion
//! - A Markov-modulated driving-state simulator (speed, timestamps, stops)
//! - Two-phase detour denoising
//! - Interval-oriented, downclocking and Douglas-Peucker simplification
//! - Missing-segment detection with route-plan or interpolation filling
//!
//! ## Features
//!
//! - **`parallel`** - Parallel distance computation with rayon
//!
//! ## Quick Start
//!
//! ```rust
//! use traj_refiner::{CoordinateSystem, Trajectory, TrajectoryPoint};
//! use traj_refiner::denoise::{denoise, DenoiseConfig};
//!
//! let points: Vec<TrajectoryPoint> = (0..20)
//!     .map(|i| TrajectoryPoint::new(116.30 + i as f64 * 0.001, 39.90))
//!     .collect();
//! let trajectory = Trajectory::new(CoordinateSystem::Wgs84, points);
//!
//! let outcome = denoise(&trajectory, &DenoiseConfig::default()).unwrap();
//! assert_eq!(outcome.report.noise_count, 0);
//! assert_eq!(outcome.trajectory.len(), 20);
//! ```

use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{OptionExt, Result, TrajError};

// Geographic utilities (distance, bearing, stationary runs)
pub mod geo_utils;

// Coordinate-system conversion (WGS84 / GCJ02 / BD09)
pub mod coords;
pub use coords::CoordinateSystem;

// Local UTM projection for chord interpolation
pub mod projection;

// Severity levels, modes and per-component configuration
pub mod config;
pub use config::{GapFillMode, Level, PipelineConfig, SimplifyMode};

// Speed / timestamp synthesis
pub mod simulate;
pub use simulate::{simulate_driving_state, SimulatorConfig, StopConfig};

// Noise removal
pub mod denoise;
pub use denoise::{denoise, DenoiseConfig, DenoiseOutcome, NoiseReport, NoiseSpan};

// Point-count reduction
pub mod simplify;
pub use simplify::{simplify, SimplifyConfig, SimplifyOutcome, SimplifyReport};

// Route acquisition collaborator
pub mod route_plan;
pub use route_plan::{PlannerChain, RoutePlanner};

// Missing-segment detection and filling
pub mod gap_fill;
pub use gap_fill::{fill_gaps, GapFillConfig, GapFillOutcome, GapFillReport, MissingSegment};

// Metadata documents and persistence collaborator
pub mod output;
pub use output::{TrajectoryDocument, TrajectoryMeta, TrajectorySink};

// Validation + normalization + dispatch
pub mod pipeline;
pub use pipeline::TrajectoryProcessor;

// Algorithm toolbox - flat access to all algorithms
pub mod algorithms;

// ============================================================================
// Core Types
// ============================================================================

/// A bare longitude/latitude pair.
///
/// # Example
/// ```
/// use traj_refiner::Coordinate;
/// let beijing = Coordinate::new(116.4074, 39.9042);
/// assert!(beijing.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lng: f64,
    pub lat: f64,
}

impl Coordinate {
    /// Create a new coordinate.
    pub fn new(lng: f64, lat: f64) -> Self {
        Self { lng, lat }
    }

    /// Check if the coordinate is finite and within geographic range.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && self.lat >= -90.0
            && self.lat <= 90.0
            && self.lng >= -180.0
            && self.lng <= 180.0
    }
}

/// Anything that sits at a coordinate.
///
/// Lets the geometry helpers work on both bare coordinates and full
/// trajectory points.
pub trait Located {
    fn coord(&self) -> Coordinate;
}

impl Located for Coordinate {
    #[inline]
    fn coord(&self) -> Coordinate {
        *self
    }
}

/// A single trajectory sample.
///
/// Speed is in km/h, timestamp in milliseconds since the Unix epoch and
/// direction in degrees clockwise from north, `[0, 360)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryPoint {
    pub lng: f64,
    pub lat: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<f64>,
}

impl TrajectoryPoint {
    /// Create a geometry-only point.
    pub fn new(lng: f64, lat: f64) -> Self {
        Self {
            lng,
            lat,
            timestamp: None,
            speed: None,
            direction: None,
        }
    }

    /// Create a point with a timestamp (ms).
    pub fn with_timestamp(lng: f64, lat: f64, timestamp: i64) -> Self {
        Self {
            timestamp: Some(timestamp),
            ..Self::new(lng, lat)
        }
    }

    /// Same attributes, different position.
    pub fn moved_to(&self, coord: Coordinate) -> Self {
        Self {
            lng: coord.lng,
            lat: coord.lat,
            ..*self
        }
    }

    /// Whether two points share exactly the same coordinates.
    pub fn same_position(&self, other: &TrajectoryPoint) -> bool {
        self.lng == other.lng && self.lat == other.lat
    }
}

impl Located for TrajectoryPoint {
    #[inline]
    fn coord(&self) -> Coordinate {
        Coordinate::new(self.lng, self.lat)
    }
}

/// An ordered trajectory whose points all live in one coordinate system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    pub coord_system: CoordinateSystem,
    pub points: Vec<TrajectoryPoint>,
}

impl Trajectory {
    /// Create a trajectory from points already expressed in `coord_system`.
    pub fn new(coord_system: CoordinateSystem, points: Vec<TrajectoryPoint>) -> Self {
        Self {
            coord_system,
            points,
        }
    }

    /// Create a geometry-only trajectory from bare coordinates.
    pub fn from_coords(coord_system: CoordinateSystem, coords: &[Coordinate]) -> Self {
        Self::new(
            coord_system,
            coords
                .iter()
                .map(|c| TrajectoryPoint::new(c.lng, c.lat))
                .collect(),
        )
    }

    /// A new trajectory in the same coordinate system.
    pub fn with_points(&self, points: Vec<TrajectoryPoint>) -> Self {
        Self::new(self.coord_system, points)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Bare coordinates of every point, in order.
    pub fn coords(&self) -> Vec<Coordinate> {
        self.points.iter().map(Located::coord).collect()
    }

    /// True when every point carries both a timestamp and a speed.
    pub fn has_temporal_fields(&self) -> bool {
        !self.points.is_empty()
            && self
                .points
                .iter()
                .all(|p| p.timestamp.is_some() && p.speed.is_some())
    }

    /// Timestamps of every point, failing on the first point without one.
    pub fn timestamps(&self) -> Result<Vec<i64>> {
        self.points
            .iter()
            .enumerate()
            .map(|(i, p)| p.timestamp.ok_or_missing("timestamp", i))
            .collect()
    }

    /// Check the trajectory has at least `minimum` points, all with valid coordinates.
    pub fn validate(&self, minimum: usize) -> Result<()> {
        if self.points.len() < minimum {
            return Err(TrajError::InsufficientPoints {
                point_count: self.points.len(),
                minimum_required: minimum,
            });
        }
        if let Some((index, p)) = self
            .points
            .iter()
            .enumerate()
            .find(|(_, p)| !p.coord().is_valid())
        {
            return Err(TrajError::InvalidCoordinates {
                index,
                message: format!("lng={}, lat={}", p.lng, p.lat),
            });
        }
        Ok(())
    }

    /// Convert every point into another coordinate system.
    ///
    /// Point order, count and non-positional fields are preserved.
    pub fn to_coord_system(&self, to: CoordinateSystem) -> Self {
        if to == self.coord_system {
            return self.clone();
        }
        let points = self
            .points
            .iter()
            .map(|p| p.moved_to(coords::convert(p.coord(), self.coord_system, to)))
            .collect();
        Self::new(to, points)
    }
}

// ============================================================================
// Tests
// ============================================================================
