//! Coordinate-system conversion between WGS84, GCJ02 and BD09.
//!
//! - **WGS84** is the uncorrected global datum reported by GPS receivers.
//! - **GCJ02** is the national offset datum, derived from WGS84 by an empirical
//!   polynomial distortion. The distortion only applies inside the coverage
//!   region; outside it the two systems coincide by convention.
//! - **BD09** is a regional offset datum derived from GCJ02 by a small polar
//!   perturbation.
//!
//! WGS84 <-> BD09 is composed through GCJ02.
//!
//! The GCJ02 -> WGS84 inverse subtracts the offset evaluated at the already
//! shifted coordinate instead of solving for the exact preimage, so a round
//! trip drifts by up to a few meters.
//!
//! ## Example
//! ```rust
//! use traj_refiner::coords::{convert, CoordinateSystem};
//! use traj_refiner::Coordinate;
//!
//! let wgs = Coordinate::new(116.4074, 39.9042);
//! let gcj = convert(wgs, CoordinateSystem::Wgs84, CoordinateSystem::Gcj02);
//! assert!((gcj.lng - wgs.lng).abs() > 1e-4); // shifted by a few hundred meters
//! ```

use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Coordinate, Located, TrajError};

/// Krasovsky 1940 semi-major axis used by the offset formulas.
const SEMI_MAJOR_AXIS: f64 = 6_378_245.0;
/// Krasovsky 1940 first eccentricity squared.
const ECCENTRICITY_SQ: f64 = 0.006_693_421_622_965_943_23;
const X_PI: f64 = PI * 3000.0 / 180.0;

/// Coverage region bounds (lng/lat degrees).
const COVERAGE_MIN_LNG: f64 = 73.66;
const COVERAGE_MAX_LNG: f64 = 135.05;
const COVERAGE_MIN_LAT: f64 = 3.86;
const COVERAGE_MAX_LAT: f64 = 53.55;

/// A coordinate reference system a trajectory can be expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CoordinateSystem {
    /// Uncorrected global datum
    #[default]
    #[serde(rename = "wgs84")]
    Wgs84,
    /// National offset datum
    #[serde(rename = "gcj02")]
    Gcj02,
    /// Regional offset datum derived from GCJ02
    #[serde(rename = "bd09ll", alias = "bd09")]
    Bd09,
}

impl CoordinateSystem {
    pub fn as_str(&self) -> &'static str {
        match self {
            CoordinateSystem::Wgs84 => "wgs84",
            CoordinateSystem::Gcj02 => "gcj02",
            CoordinateSystem::Bd09 => "bd09ll",
        }
    }
}

impl fmt::Display for CoordinateSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CoordinateSystem {
    type Err = TrajError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "wgs84" => Ok(CoordinateSystem::Wgs84),
            "gcj02" => Ok(CoordinateSystem::Gcj02),
            "bd09ll" | "bd09" => Ok(CoordinateSystem::Bd09),
            other => Err(TrajError::validation(format!(
                "coordinate system '{}' is not supported, expected wgs84, gcj02 or bd09ll",
                other
            ))),
        }
    }
}

/// Rough bounding-box test for the region where offset formulas apply.
pub fn is_in_coverage_region(lng: f64, lat: f64) -> bool {
    (COVERAGE_MIN_LNG..=COVERAGE_MAX_LNG).contains(&lng)
        && (COVERAGE_MIN_LAT..=COVERAGE_MAX_LAT).contains(&lat)
}

// ============================================================================
// WGS84 <-> GCJ02
// ============================================================================

fn transform_lat(x: f64, y: f64) -> f64 {
    let mut ret = -100.0 + 2.0 * x + 3.0 * y + 0.2 * y * y + 0.1 * x * y + 0.2 * x.abs().sqrt();
    ret += (20.0 * (6.0 * x * PI).sin() + 20.0 * (2.0 * x * PI).sin()) * 2.0 / 3.0;
    ret += (20.0 * (y * PI).sin() + 40.0 * (y / 3.0 * PI).sin()) * 2.0 / 3.0;
    ret += (160.0 * (y / 12.0 * PI).sin() + 320.0 * (y * PI / 30.0).sin()) * 2.0 / 3.0;
    ret
}

fn transform_lng(x: f64, y: f64) -> f64 {
    let mut ret = 300.0 + x + 2.0 * y + 0.1 * x * x + 0.1 * x * y + 0.1 * x.abs().sqrt();
    ret += (20.0 * (6.0 * x * PI).sin() + 20.0 * (2.0 * x * PI).sin()) * 2.0 / 3.0;
    ret += (20.0 * (x * PI).sin() + 40.0 * (x / 3.0 * PI).sin()) * 2.0 / 3.0;
    ret += (150.0 * (x / 12.0 * PI).sin() + 300.0 * (x / 30.0 * PI).sin()) * 2.0 / 3.0;
    ret
}

/// GCJ02 offset (d_lng, d_lat) in degrees, evaluated at (lng, lat).
fn gcj02_offset(lng: f64, lat: f64) -> (f64, f64) {
    let d_lat = transform_lat(lng - 105.0, lat - 35.0);
    let d_lng = transform_lng(lng - 105.0, lat - 35.0);

    let rad_lat = lat / 180.0 * PI;
    let magic = 1.0 - ECCENTRICITY_SQ * rad_lat.sin() * rad_lat.sin();
    let magic_sqrt = magic.sqrt();

    let d_lat = (d_lat * 180.0)
        / ((SEMI_MAJOR_AXIS * (1.0 - ECCENTRICITY_SQ)) / (magic * magic_sqrt) * PI);
    let d_lng = (d_lng * 180.0) / (SEMI_MAJOR_AXIS / magic_sqrt * rad_lat.cos() * PI);
    (d_lng, d_lat)
}

/// WGS84 -> GCJ02. Identity outside the coverage region.
pub fn wgs84_to_gcj02(lng: f64, lat: f64) -> (f64, f64) {
    if !is_in_coverage_region(lng, lat) {
        return (lng, lat);
    }
    let (d_lng, d_lat) = gcj02_offset(lng, lat);
    (lng + d_lng, lat + d_lat)
}

/// GCJ02 -> WGS84 (approximate). Identity outside the coverage region.
pub fn gcj02_to_wgs84(lng: f64, lat: f64) -> (f64, f64) {
    if !is_in_coverage_region(lng, lat) {
        return (lng, lat);
    }
    let (d_lng, d_lat) = gcj02_offset(lng, lat);
    (lng - d_lng, lat - d_lat)
}

// ============================================================================
// GCJ02 <-> BD09
// ============================================================================

/// GCJ02 -> BD09.
pub fn gcj02_to_bd09(lng: f64, lat: f64) -> (f64, f64) {
    let z = (lng * lng + lat * lat).sqrt() + 0.00002 * (lat * X_PI).sin();
    let theta = lat.atan2(lng) + 0.000003 * (lng * X_PI).cos();
    (z * theta.cos() + 0.0065, z * theta.sin() + 0.006)
}

/// BD09 -> GCJ02.
pub fn bd09_to_gcj02(lng: f64, lat: f64) -> (f64, f64) {
    let x = lng - 0.0065;
    let y = lat - 0.006;
    let z = (x * x + y * y).sqrt() - 0.00002 * (y * X_PI).sin();
    let theta = y.atan2(x) - 0.000003 * (x * X_PI).cos();
    (z * theta.cos(), z * theta.sin())
}

/// WGS84 -> BD09, through GCJ02.
pub fn wgs84_to_bd09(lng: f64, lat: f64) -> (f64, f64) {
    let (lng, lat) = wgs84_to_gcj02(lng, lat);
    gcj02_to_bd09(lng, lat)
}

/// BD09 -> WGS84, through GCJ02.
pub fn bd09_to_wgs84(lng: f64, lat: f64) -> (f64, f64) {
    let (lng, lat) = bd09_to_gcj02(lng, lat);
    gcj02_to_wgs84(lng, lat)
}

// ============================================================================
// Generic conversion
// ============================================================================

/// Convert a single coordinate between any two systems.
pub fn convert(coord: Coordinate, from: CoordinateSystem, to: CoordinateSystem) -> Coordinate {
    use CoordinateSystem::*;

    let (lng, lat) = match (from, to) {
        (Wgs84, Gcj02) => wgs84_to_gcj02(coord.lng, coord.lat),
        (Wgs84, Bd09) => wgs84_to_bd09(coord.lng, coord.lat),
        (Gcj02, Wgs84) => gcj02_to_wgs84(coord.lng, coord.lat),
        (Gcj02, Bd09) => gcj02_to_bd09(coord.lng, coord.lat),
        (Bd09, Wgs84) => bd09_to_wgs84(coord.lng, coord.lat),
        (Bd09, Gcj02) => bd09_to_gcj02(coord.lng, coord.lat),
        (Wgs84, Wgs84) | (Gcj02, Gcj02) | (Bd09, Bd09) => (coord.lng, coord.lat),
    };
    Coordinate::new(lng, lat)
}

/// Convert a sequence of points, preserving order and count.
pub fn convert_batch<P: Located>(
    points: &[P],
    from: CoordinateSystem,
    to: CoordinateSystem,
) -> Vec<Coordinate> {
    points.iter().map(|p| convert(p.coord(), from, to)).collect()
}
