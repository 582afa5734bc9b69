//! # Algorithm Toolbox
//!
//! Direct access to every trajectory algorithm, for callers that want a single
//! step without going through [`TrajectoryProcessor`](crate::TrajectoryProcessor)
//! (no validation, no WGS84 normalization, no metadata).
//!
//! ## Core Algorithms
//!
//! - **Denoising**: detour detection over long hops
//! - **Simplification**: interval-oriented, downclocking, Douglas-Peucker
//! - **Gap Filling**: missing-segment detection, chord interpolation, route fill
//! - **Driving State**: Markov speed model, timestamps, stops
//!
//! ## Geographic Utilities
//!
//! - **Haversine Distance**: great-circle distance between coordinates
//! - **Bearing**: initial heading, with stationary-run repair
//! - **Coordinate Systems**: WGS84 / GCJ02 / BD09
//!
//! # Example
//!
//! ```rust
//! use traj_refiner::algorithms::{bearing, haversine_distance, rdp_indices, Coordinate};
//!
//! let line = vec![
//!     Coordinate::new(104.000, 30.600),
//!     Coordinate::new(104.005, 30.601),
//!     Coordinate::new(104.010, 30.600),
//! ];
//! assert_eq!(rdp_indices(&line, 5.0), vec![0, 1, 2]);
//! assert_eq!(rdp_indices(&line, 500.0), vec![0, 2]);
//!
//! let d = haversine_distance(&line[0], &line[2]);
//! assert!((d - 958.0).abs() < 5.0);
//! assert!((bearing(&line[0], &line[2]) - 90.0).abs() < 0.1);
//! ```

// =============================================================================
// Core Types (re-exported from lib)
// =============================================================================

pub use crate::{Coordinate, CoordinateSystem, Located, Trajectory, TrajectoryPoint};

// =============================================================================
// Geographic Utilities
// =============================================================================

pub use crate::geo_utils::{
    bearing,
    compute_directions,
    haversine_distance,
    haversine_distance_vector,
    polyline_length,
    stationary_runs,
    TrajectorySummary,
};

#[cfg(feature = "parallel")]
pub use crate::geo_utils::haversine_distance_vector_parallel;

pub use crate::coords::{
    bd09_to_gcj02,
    bd09_to_wgs84,
    convert,
    convert_batch,
    gcj02_to_bd09,
    gcj02_to_wgs84,
    is_in_coverage_region,
    wgs84_to_bd09,
    wgs84_to_gcj02,
};

pub use crate::projection::PlanarProjection;

// =============================================================================
// Denoising
// =============================================================================

pub use crate::denoise::{denoise, detect_noise_spans, DenoiseConfig, NoiseSpan};

// =============================================================================
// Simplification
// =============================================================================

pub use crate::simplify::{
    downclocking_indices,
    interval_oriented_indices,
    rdp_indices,
    simplify,
    triangle_height,
    SimplifyConfig,
};

// =============================================================================
// Gap Filling
// =============================================================================

pub use crate::gap_fill::{
    detect_missing_segments,
    fill_gaps,
    interpolate_segment,
    merge_by_timestamp,
    route_segment,
    GapFillConfig,
    MissingSegment,
};

// =============================================================================
// Driving State
// =============================================================================

pub use crate::simulate::{
    derive_speeds,
    generate_speeds,
    generate_timestamps,
    inject_stops,
    simulate_driving_state,
    DrivingStateSimulator,
    SimulatorConfig,
};
