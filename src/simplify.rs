//! Point-count reduction.
//!
//! Three interchangeable algorithms, each driven by one parameter picked from
//! a per-level table (or overridden):
//!
//! | Mode | low | mid | high | Parameter |
//! |------|-----|-----|------|-----------|
//! | `interval_oriented` | 5 | 10 | 15 | target sampling interval (s) |
//! | `downclocking` | 1 | 2 | 3 | points skipped between kept points |
//! | `rdp` | 5 | 8 | 10 | Douglas-Peucker distance threshold (m) |
//!
//! RDP can optionally *reproject* instead of dropping: every point it would
//! remove is moved onto the chord that replaced it, so the point count stays
//! the same while the geometry is smoothed.

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::geo_utils::{bearing, haversine_distance};
use crate::projection::PlanarProjection;
use crate::{Coordinate, Level, Located, Result, SimplifyMode, TrajError, Trajectory, TrajectoryPoint};

/// Simplification settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimplifyConfig {
    /// Default: interval_oriented
    pub mode: SimplifyMode,

    /// Default: low
    pub level: Level,

    /// Overrides the level's parameter for the chosen mode.
    /// Default: None
    pub parameter: Option<f64>,

    /// Move dropped points onto the retaining chord instead of removing
    /// them (rdp only).
    /// Default: false
    pub reproject: bool,
}

impl SimplifyConfig {
    pub fn new(mode: SimplifyMode, level: Level) -> Self {
        Self {
            mode,
            level,
            ..Self::default()
        }
    }

    /// Effective parameter for the configured mode and level.
    pub fn parameter(&self) -> f64 {
        self.parameter.unwrap_or_else(|| {
            let table = match self.mode {
                SimplifyMode::IntervalOriented => [5.0, 10.0, 15.0],
                SimplifyMode::Downclocking => [1.0, 2.0, 3.0],
                SimplifyMode::Rdp => [5.0, 8.0, 10.0],
            };
            match self.level {
                Level::Low => table[0],
                Level::Mid => table[1],
                Level::High => table[2],
            }
        })
    }

    pub fn validate(&self) -> Result<()> {
        let p = self.parameter();
        let valid = match self.mode {
            SimplifyMode::IntervalOriented => p > 0.0 && p.is_finite(),
            SimplifyMode::Downclocking => p >= 0.0 && p.is_finite() && p.fract() == 0.0,
            SimplifyMode::Rdp => p >= 0.0 && p.is_finite(),
        };
        if !valid {
            return Err(TrajError::validation(format!(
                "parameter {} is not valid for simplify mode {}",
                p, self.mode
            )));
        }
        if self.reproject && self.mode != SimplifyMode::Rdp {
            return Err(TrajError::validation("reproject is only supported in rdp mode"));
        }
        Ok(())
    }
}

/// Counts stored as `simplify_info` in output metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimplifyReport {
    pub raw_count: usize,
    pub remaining_count: usize,
    pub mode: SimplifyMode,
    pub parameter: f64,
    /// Points moved onto a chord instead of dropped
    pub reprojected_count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimplifyOutcome {
    pub trajectory: Trajectory,
    pub report: SimplifyReport,
}

// =============================================================================
// Index selection
// =============================================================================

/// Keep the first point, then every point at which the accumulated interval
/// reaches `target_sec`; the remainder carries over.
pub fn interval_oriented_indices(timestamps: &[i64], target_sec: f64) -> Vec<usize> {
    if timestamps.is_empty() {
        return Vec::new();
    }
    let mut kept = vec![0];
    let mut accumulated = 0.0;
    for i in 1..timestamps.len() {
        accumulated += (timestamps[i] - timestamps[i - 1]) as f64 / 1000.0;
        if accumulated >= target_sec {
            kept.push(i);
            accumulated %= target_sec;
        }
    }
    kept
}

/// Keep `0, stride + 1, 2(stride + 1), ...`.
pub fn downclocking_indices(len: usize, stride: usize) -> Vec<usize> {
    (0..len).step_by(stride + 1).collect()
}

/// Height of `other` above the chord `left`-`right`, from Heron's formula on
/// haversine side lengths.
///
/// Returns 0 for degenerate triangles (collinear points, zero-length chord).
pub fn triangle_height(left: &Coordinate, right: &Coordinate, other: &Coordinate) -> f64 {
    let a = haversine_distance(left, other);
    let b = haversine_distance(right, other);
    let c = haversine_distance(left, right);

    if a + b > c && b + c > a && c + a > b {
        let s = (a + b + c) / 2.0;
        let area = (s * (s - a) * (s - b) * (s - c)).max(0.0).sqrt();
        2.0 * area / c
    } else {
        0.0
    }
}

/// Douglas-Peucker retained indices, in ascending order.
///
/// Uses an explicit work stack, so trajectory length is not limited by
/// recursion depth.
pub fn rdp_indices<P: Located>(points: &[P], threshold: f64) -> Vec<usize> {
    let n = points.len();
    if n < 2 {
        return (0..n).collect();
    }

    let coords: Vec<Coordinate> = points.iter().map(Located::coord).collect();
    let mut keep = vec![false; n];
    keep[0] = true;
    keep[n - 1] = true;

    let mut stack = vec![(0usize, n - 1)];
    while let Some((left, right)) = stack.pop() {
        if right - left < 2 || coords[left] == coords[right] {
            continue;
        }

        let mut max_height = 0.0;
        let mut max_index = left;
        for i in (left + 1)..right {
            let h = triangle_height(&coords[left], &coords[right], &coords[i]);
            if h > max_height {
                max_height = h;
                max_index = i;
            }
        }

        if max_height > threshold {
            keep[max_index] = true;
            stack.push((max_index, right));
            stack.push((left, max_index));
        }
    }

    (0..n).filter(|&i| keep[i]).collect()
}

/// Move every point not in `kept` onto the chord between its retaining
/// neighbours, heading along that chord.
fn reproject_dropped(points: &[TrajectoryPoint], kept: &[usize]) -> (Vec<TrajectoryPoint>, usize) {
    let mut result = points.to_vec();
    let mut moved = 0;

    for pair in kept.windows(2) {
        let (left, right) = (pair[0], pair[1]);
        if right - left < 2 {
            continue;
        }
        let a = points[left].coord();
        let b = points[right].coord();
        let heading = bearing(&a, &b);
        let projection = PlanarProjection::local_to(&a);
        for i in (left + 1)..right {
            let projected = projection.project_onto_segment(&a, &b, &points[i].coord());
            result[i] = TrajectoryPoint {
                direction: Some(heading),
                ..points[i].moved_to(projected)
            };
            moved += 1;
        }
    }
    (result, moved)
}

// =============================================================================
// Entry point
// =============================================================================

/// Reduce the number of points of a trajectory.
///
/// `interval_oriented` requires a timestamp on every point.
pub fn simplify(trajectory: &Trajectory, config: &SimplifyConfig) -> Result<SimplifyOutcome> {
    config.validate()?;
    let parameter = config.parameter();
    let points = &trajectory.points;

    let kept = match config.mode {
        SimplifyMode::IntervalOriented => {
            let timestamps = trajectory.timestamps()?;
            interval_oriented_indices(&timestamps, parameter)
        }
        SimplifyMode::Downclocking => downclocking_indices(points.len(), parameter as usize),
        SimplifyMode::Rdp => rdp_indices(points, parameter),
    };

    let (simplified, reprojected_count) = if config.reproject {
        debug!("[Simplify] Reprojecting {} dropped points", points.len() - kept.len());
        reproject_dropped(points, &kept)
    } else {
        (kept.iter().map(|&i| points[i]).collect(), 0)
    };

    info!(
        "[Simplify] mode={} parameter={} kept {}/{} points",
        config.mode,
        parameter,
        simplified.len(),
        points.len()
    );

    Ok(SimplifyOutcome {
        report: SimplifyReport {
            raw_count: points.len(),
            remaining_count: simplified.len(),
            mode: config.mode,
            parameter,
            reprojected_count,
        },
        trajectory: trajectory.with_points(simplified),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CoordinateSystem;

    fn timed_track(n: usize, step_ms: i64) -> Trajectory {
        Trajectory::new(
            CoordinateSystem::Wgs84,
            (0..n)
                .map(|i| TrajectoryPoint::with_timestamp(104.0 + i as f64 * 0.0005, 30.6, i as i64 * step_ms))
                .collect(),
        )
    }

    /// Eastward line with one bump ~110 m north at index 5.
    fn bumped_line() -> Trajectory {
        let points = (0..11)
            .map(|i| {
                let lat = if i == 5 { 30.601 } else { 30.6 };
                TrajectoryPoint::new(104.0 + i as f64 * 0.001, lat)
            })
            .collect();
        Trajectory::new(CoordinateSystem::Wgs84, points)
    }

    #[test]
    fn test_parameter_table() {
        let cases = [
            (SimplifyMode::IntervalOriented, Level::Mid, 10.0),
            (SimplifyMode::Downclocking, Level::High, 3.0),
            (SimplifyMode::Rdp, Level::Low, 5.0),
        ];
        for (mode, level, expected) in cases {
            assert_eq!(SimplifyConfig::new(mode, level).parameter(), expected);
        }
        let custom = SimplifyConfig {
            parameter: Some(42.0),
            ..SimplifyConfig::new(SimplifyMode::Rdp, Level::High)
        };
        assert_eq!(custom.parameter(), 42.0);
    }

    #[test]
    fn test_interval_oriented_carries_remainder() {
        let timestamps: Vec<i64> = (0..11).map(|i| i * 2_000).collect();
        assert_eq!(interval_oriented_indices(&timestamps, 5.0), vec![0, 3, 5, 8, 10]);
        assert!(interval_oriented_indices(&[], 5.0).is_empty());
    }

    #[test]
    fn test_interval_oriented_requires_timestamps() {
        let mut traj = timed_track(10, 1_000);
        traj.points[4].timestamp = None;
        let result = simplify(&traj, &SimplifyConfig::default());
        assert!(matches!(
            result,
            Err(TrajError::MissingField {
                field: "timestamp",
                index: 4
            })
        ));
    }

    #[test]
    fn test_downclocking() {
        assert_eq!(downclocking_indices(10, 2), vec![0, 3, 6, 9]);
        assert_eq!(downclocking_indices(3, 0), vec![0, 1, 2]);

        let traj = timed_track(10, 1_000);
        let outcome = simplify(
            &traj,
            &SimplifyConfig::new(SimplifyMode::Downclocking, Level::Low),
        )
        .unwrap();
        assert_eq!(outcome.report.remaining_count, 5);
        assert_eq!(outcome.trajectory.points[1], traj.points[2]);
    }

    #[test]
    fn test_triangle_height() {
        let a = Coordinate::new(104.0, 30.0);
        let b = Coordinate::new(104.01, 30.0);
        let off = Coordinate::new(104.005, 30.001);
        let h = triangle_height(&a, &b, &off);
        assert!((h - 111.2).abs() < 1.0, "h = {}", h);

        // Zero-length chord is degenerate
        assert_eq!(triangle_height(&a, &a, &off), 0.0);
        // Point beyond the chord on the same meridian
        let north = Coordinate::new(104.0, 30.01);
        let beyond = Coordinate::new(104.0, 30.02);
        assert!(triangle_height(&a, &north, &beyond) < 0.01);
    }

    #[test]
    fn test_rdp_keeps_bump() {
        let traj = bumped_line();
        // Both flanks of the bump deviate from the apex chords too
        let kept = rdp_indices(&traj.points, 5.0);
        assert_eq!(kept, vec![0, 4, 5, 6, 10]);

        // Threshold above the bump collapses everything
        assert_eq!(rdp_indices(&traj.points, 200.0), vec![0, 10]);
    }

    #[test]
    fn test_rdp_identical_endpoints() {
        let c = |lng: f64, lat: f64| TrajectoryPoint::new(lng, lat);
        let loop_points = vec![c(104.0, 30.0), c(104.01, 30.0), c(104.01, 30.01), c(104.0, 30.0)];
        assert_eq!(rdp_indices(&loop_points, 5.0), vec![0, 3]);
    }

    #[test]
    fn test_rdp_short_inputs() {
        assert!(rdp_indices::<Coordinate>(&[], 5.0).is_empty());
        assert_eq!(rdp_indices(&[Coordinate::new(0.0, 0.0)], 5.0), vec![0]);
        assert_eq!(
            rdp_indices(&[Coordinate::new(0.0, 0.0), Coordinate::new(0.0, 1.0)], 5.0),
            vec![0, 1]
        );
    }

    #[test]
    fn test_reproject_preserves_count() {
        let traj = bumped_line();
        let config = SimplifyConfig {
            reproject: true,
            parameter: Some(200.0),
            ..SimplifyConfig::new(SimplifyMode::Rdp, Level::Low)
        };
        let outcome = simplify(&traj, &config).unwrap();
        assert_eq!(outcome.trajectory.len(), traj.len());
        assert_eq!(outcome.report.reprojected_count, 9);

        // The bump is pulled back onto the chord
        let moved = outcome.trajectory.points[5];
        assert!((moved.lat - 30.6).abs() < 1e-5);
        assert!((moved.lng - 104.005).abs() < 1e-4);
        let heading = moved.direction.unwrap();
        assert!((heading - 90.0).abs() < 0.1);

        // Chord ends untouched
        assert_eq!(outcome.trajectory.points[0], traj.points[0]);
        assert_eq!(outcome.trajectory.points[10], traj.points[10]);
    }

    #[test]
    fn test_reproject_only_for_rdp() {
        let config = SimplifyConfig {
            reproject: true,
            ..SimplifyConfig::new(SimplifyMode::Downclocking, Level::Low)
        };
        assert!(matches!(config.validate(), Err(TrajError::Validation { .. })));

        let fractional = SimplifyConfig {
            parameter: Some(1.5),
            ..SimplifyConfig::new(SimplifyMode::Downclocking, Level::Low)
        };
        assert!(fractional.validate().is_err());
    }
}
