//! Missing-segment detection and filling.
//!
//! A consecutive pair whose distance falls within `[lower_km, upper_km]` is a
//! *missing segment*: the receiver lost fixes for a stretch that is too long
//! to be ordinary sampling but too short to be a separate trip. Each segment
//! is filled with synthetic points, either
//!
//! - **route_plan**: vertices of a route asked from a [`RoutePlanner`], timed by
//!   their position along the planned path, or
//! - **interpolate**: evenly spaced points on the straight chord.
//!
//! A route-plan segment whose planner fails (or returns nothing) is
//! interpolated instead; other segments are unaffected.
//!
//! Inserted points carry the *virtual speed* so later passes don't mistake
//! them for measured data. Original and inserted points are merged by a
//! stable sort on timestamp, keeping the first point of any duplicate
//! timestamp.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::geo_utils::{bearing, haversine_distance};
use crate::projection::PlanarProjection;
use crate::route_plan::RoutePlanner;
use crate::{Coordinate, GapFillMode, Located, OptionExt, Result, TrajError, Trajectory, TrajectoryPoint};

/// Gap filling settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GapFillConfig {
    /// Shortest hop treated as missing (km).
    /// Default: 10.0
    pub lower_km: f64,

    /// Longest hop treated as missing (km).
    /// Default: 50.0
    pub upper_km: f64,

    /// Default: route_plan
    pub mode: GapFillMode,

    /// Spacing of interpolated points (m).
    /// Default: 100.0
    pub step_meters: f64,

    /// Speed given to inserted points (km/h).
    /// Default: 200.0
    pub virtual_speed: f64,
}

impl Default for GapFillConfig {
    fn default() -> Self {
        Self {
            lower_km: 10.0,
            upper_km: 50.0,
            mode: GapFillMode::RoutePlan,
            step_meters: 100.0,
            virtual_speed: 200.0,
        }
    }
}

impl GapFillConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.lower_km >= 0.0 && self.lower_km <= self.upper_km && self.upper_km.is_finite()) {
            return Err(TrajError::validation(format!(
                "gap thresholds must satisfy 0 <= lower_km <= upper_km, got {} / {}",
                self.lower_km, self.upper_km
            )));
        }
        if !(self.step_meters > 0.0 && self.step_meters.is_finite()) {
            return Err(TrajError::validation("step_meters must be positive"));
        }
        if !(self.virtual_speed >= 0.0 && self.virtual_speed.is_finite()) {
            return Err(TrajError::validation("virtual_speed must be non-negative"));
        }
        Ok(())
    }
}

/// Two consecutive points too far apart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingSegment {
    /// Index of `start` in the input trajectory
    pub start_index: usize,
    pub start: TrajectoryPoint,
    pub end: TrajectoryPoint,
    pub length_meters: f64,
    pub interval_ms: i64,
}

impl MissingSegment {
    fn start_time(&self) -> i64 {
        self.start.timestamp.unwrap_or_default()
    }

    fn time_at(&self, fraction: f64) -> i64 {
        self.start_time() + (fraction * self.interval_ms as f64) as i64
    }
}

/// How a segment was actually filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillStrategy {
    RoutePlan,
    Interpolate,
    /// Route planning failed, interpolated instead
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentDetail {
    #[serde(flatten)]
    pub segment: MissingSegment,
    pub strategy: FillStrategy,
    pub inserted: usize,
}

/// Stored as `missing_supplement_info` in output metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapFillReport {
    pub segment_count: usize,
    /// Points generated across all segments, before timestamp dedup
    pub inserted_count: usize,
    pub mode: GapFillMode,
    pub segments: Vec<SegmentDetail>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GapFillOutcome {
    pub trajectory: Trajectory,
    pub report: GapFillReport,
}

// =============================================================================
// Detection
// =============================================================================

/// Find consecutive pairs whose distance lies in `[lower_m, upper_m]`.
///
/// Both ends of each segment need a timestamp.
pub fn detect_missing_segments(
    trajectory: &Trajectory,
    lower_m: f64,
    upper_m: f64,
) -> Result<Vec<MissingSegment>> {
    let points = &trajectory.points;
    let mut segments = Vec::new();

    for i in 0..points.len().saturating_sub(1) {
        let (start, end) = (points[i], points[i + 1]);
        let length = haversine_distance(&start.coord(), &end.coord());
        if length < lower_m || length > upper_m {
            continue;
        }
        let t0 = start.timestamp.ok_or_missing("timestamp", i)?;
        let t1 = end.timestamp.ok_or_missing("timestamp", i + 1)?;
        segments.push(MissingSegment {
            start_index: i,
            start,
            end,
            length_meters: length,
            interval_ms: t1 - t0,
        });
    }
    Ok(segments)
}

// =============================================================================
// Filling strategies
// =============================================================================

/// Straight-chord points every `step` meters, excluding both ends.
pub fn interpolate_segment(segment: &MissingSegment, step: f64, virtual_speed: f64) -> Vec<TrajectoryPoint> {
    let a = segment.start.coord();
    let b = segment.end.coord();
    let length = segment.length_meters;
    if !(length > step) {
        return Vec::new();
    }

    let fractions: Vec<f64> = (1..)
        .map(|k| k as f64 * step)
        .take_while(|d| *d < length)
        .map(|d| d / length)
        .collect();

    let heading = bearing(&a, &b);
    PlanarProjection::local_to(&a)
        .interpolate_chord(&a, &b, &fractions)
        .into_iter()
        .zip(&fractions)
        .map(|(c, &f)| TrajectoryPoint {
            lng: c.lng,
            lat: c.lat,
            timestamp: Some(segment.time_at(f)),
            speed: Some(virtual_speed),
            direction: Some(heading),
        })
        .collect()
}

/// Interior vertices of `[start, route..., end]`, timed by their position
/// along the path.
pub fn route_segment(
    segment: &MissingSegment,
    route: &[Coordinate],
    virtual_speed: f64,
) -> Vec<TrajectoryPoint> {
    let mut path = Vec::with_capacity(route.len() + 2);
    path.push(segment.start.coord());
    path.extend_from_slice(route);
    path.push(segment.end.coord());

    let fractions = PlanarProjection::local_to(&path[0]).vertex_fractions(&path);
    (1..path.len() - 1)
        .map(|i| TrajectoryPoint {
            lng: path[i].lng,
            lat: path[i].lat,
            timestamp: Some(segment.time_at(fractions[i])),
            speed: Some(virtual_speed),
            direction: Some(bearing(&path[i - 1], &path[i])),
        })
        .collect()
}

/// Concatenate, stable-sort by timestamp and drop repeated timestamps
/// (first occurrence wins).
pub fn merge_by_timestamp(original: &[TrajectoryPoint], inserted: Vec<TrajectoryPoint>) -> Vec<TrajectoryPoint> {
    let mut merged = Vec::with_capacity(original.len() + inserted.len());
    merged.extend_from_slice(original);
    merged.extend(inserted);
    merged.sort_by_key(|p| p.timestamp);
    merged.dedup_by_key(|p| p.timestamp);
    merged
}

// =============================================================================
// Entry point
// =============================================================================

/// Detect and fill missing segments.
///
/// `planner` is consulted in route-plan mode; without one every segment is
/// interpolated and reported as a fallback. Trajectories without missing
/// segments come back unchanged.
pub fn fill_gaps(
    trajectory: &Trajectory,
    config: &GapFillConfig,
    planner: Option<&dyn RoutePlanner>,
) -> Result<GapFillOutcome> {
    config.validate()?;
    let segments = detect_missing_segments(trajectory, config.lower_km * 1000.0, config.upper_km * 1000.0)?;

    if segments.is_empty() {
        info!("[GapFill] No missing segments found");
        return Ok(GapFillOutcome {
            trajectory: trajectory.clone(),
            report: GapFillReport {
                segment_count: 0,
                inserted_count: 0,
                mode: config.mode,
                segments: Vec::new(),
            },
        });
    }
    // Merging sorts on timestamps, so every point needs one
    trajectory.timestamps()?;

    info!(
        "[GapFill] Found {} missing segments, filling with {}",
        segments.len(),
        config.mode
    );

    let mut inserted = Vec::new();
    let mut details = Vec::with_capacity(segments.len());
    for segment in segments {
        let (points, strategy) = fill_segment(&segment, config, planner, trajectory);
        debug!(
            "[GapFill] Segment at {} ({:.0}m, {}ms): {} points via {:?}",
            segment.start_index,
            segment.length_meters,
            segment.interval_ms,
            points.len(),
            strategy
        );
        details.push(SegmentDetail {
            segment,
            strategy,
            inserted: points.len(),
        });
        inserted.extend(points);
    }

    let inserted_count = inserted.len();
    let merged = merge_by_timestamp(&trajectory.points, inserted);
    info!(
        "[GapFill] Inserted {} points, trajectory now has {} points",
        inserted_count,
        merged.len()
    );

    Ok(GapFillOutcome {
        trajectory: trajectory.with_points(merged),
        report: GapFillReport {
            segment_count: details.len(),
            inserted_count,
            mode: config.mode,
            segments: details,
        },
    })
}

fn fill_segment(
    segment: &MissingSegment,
    config: &GapFillConfig,
    planner: Option<&dyn RoutePlanner>,
    trajectory: &Trajectory,
) -> (Vec<TrajectoryPoint>, FillStrategy) {
    if config.mode == GapFillMode::Interpolate {
        return (
            interpolate_segment(segment, config.step_meters, config.virtual_speed),
            FillStrategy::Interpolate,
        );
    }

    let planned = match planner {
        Some(planner) => planner
            .plan(segment.start.coord(), segment.end.coord(), trajectory.coord_system)
            .and_then(|route| {
                if route.is_empty() {
                    Err(TrajError::Collaborator {
                        planner: planner.name().to_string(),
                        message: "returned an empty route".to_string(),
                    })
                } else {
                    Ok(route)
                }
            }),
        None => Err(TrajError::Collaborator {
            planner: "none".to_string(),
            message: "no route planner configured".to_string(),
        }),
    };

    match planned {
        Ok(route) => (
            route_segment(segment, &route, config.virtual_speed),
            FillStrategy::RoutePlan,
        ),
        Err(e) => {
            warn!(
                "[GapFill] Route planning failed for segment at {}, interpolating instead: {}",
                segment.start_index, e
            );
            (
                interpolate_segment(segment, config.step_meters, config.virtual_speed),
                FillStrategy::Fallback,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route_plan::{FnPlanner, StaticPlanner};
    use crate::CoordinateSystem;

    /// Chengdu track with a ~22 km hole between indices 4 and 5.
    fn gappy_track() -> Trajectory {
        let mut points: Vec<TrajectoryPoint> = (0..5)
            .map(|i| TrajectoryPoint::with_timestamp(104.0 + i as f64 * 0.001, 30.6, i as i64 * 5_000))
            .collect();
        points.extend((0..5).map(|i| {
            TrajectoryPoint::with_timestamp(104.23 + i as f64 * 0.001, 30.6, 900_000 + i as i64 * 5_000)
        }));
        Trajectory::new(CoordinateSystem::Wgs84, points)
    }

    fn interpolate_config() -> GapFillConfig {
        GapFillConfig {
            mode: GapFillMode::Interpolate,
            ..GapFillConfig::default()
        }
    }

    #[test]
    fn test_config_validation() {
        assert!(GapFillConfig::default().validate().is_ok());
        let inverted = GapFillConfig {
            lower_km: 60.0,
            ..GapFillConfig::default()
        };
        assert!(matches!(inverted.validate(), Err(TrajError::Validation { .. })));
        let no_step = GapFillConfig {
            step_meters: 0.0,
            ..GapFillConfig::default()
        };
        assert!(no_step.validate().is_err());
    }

    #[test]
    fn test_detection() {
        let traj = gappy_track();
        let segments = detect_missing_segments(&traj, 10_000.0, 50_000.0).unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].start_index, 4);
        assert_eq!(segments[0].interval_ms, 900_000 - 20_000);
        assert!(segments[0].length_meters > 20_000.0 && segments[0].length_meters < 25_000.0);

        // Hole beyond the upper bound is a separate trip, not a gap
        assert!(detect_missing_segments(&traj, 1_000.0, 5_000.0).unwrap().is_empty());
    }

    #[test]
    fn test_detection_requires_timestamps() {
        let mut traj = gappy_track();
        traj.points[5].timestamp = None;
        assert!(matches!(
            detect_missing_segments(&traj, 10_000.0, 50_000.0),
            Err(TrajError::MissingField { index: 5, .. })
        ));
    }

    #[test]
    fn test_interpolate_fill() {
        let traj = gappy_track();
        let outcome = fill_gaps(&traj, &interpolate_config(), None).unwrap();
        let segment = &outcome.report.segments[0];
        assert_eq!(segment.strategy, FillStrategy::Interpolate);

        let expected = (segment.segment.length_meters / 100.0).floor() as usize;
        assert_eq!(segment.inserted, expected);
        assert_eq!(outcome.trajectory.len(), traj.len() + expected);

        for pair in outcome.trajectory.points.windows(2) {
            assert!(pair[1].timestamp > pair[0].timestamp);
        }
        let filled = &outcome.trajectory.points[5..5 + expected];
        for p in filled {
            assert_eq!(p.speed, Some(200.0));
            assert!((p.direction.unwrap() - 90.0).abs() < 0.1);
            assert!((p.lat - 30.6).abs() < 1e-3);
        }
    }

    #[test]
    fn test_route_plan_fill() {
        let traj = gappy_track();
        let route = vec![
            Coordinate::new(104.05, 30.62),
            Coordinate::new(104.12, 30.63),
            Coordinate::new(104.20, 30.61),
        ];
        let planner = StaticPlanner::new("static", route.clone());
        let outcome = fill_gaps(&traj, &GapFillConfig::default(), Some(&planner)).unwrap();

        assert_eq!(outcome.report.inserted_count, 3);
        assert_eq!(outcome.report.segments[0].strategy, FillStrategy::RoutePlan);
        assert_eq!(outcome.trajectory.len(), traj.len() + 3);

        let inserted = &outcome.trajectory.points[5..8];
        for (p, c) in inserted.iter().zip(&route) {
            assert_eq!(p.coord(), *c);
        }
        let t0 = traj.points[4].timestamp.unwrap();
        let t1 = traj.points[5].timestamp.unwrap();
        let times: Vec<i64> = inserted.iter().map(|p| p.timestamp.unwrap()).collect();
        assert!(times[0] > t0 && times[2] < t1);
        assert!(times.windows(2).all(|w| w[0] < w[1]));

        // First inserted vertex heads from the segment start toward it
        let expected = bearing(&traj.points[4].coord(), &route[0]);
        assert_eq!(inserted[0].direction, Some(expected));
    }

    #[test]
    fn test_route_plan_falls_back_per_segment() {
        let traj = gappy_track();
        let planner = FnPlanner::new("down", |_, _, _| {
            Err(TrajError::Collaborator {
                planner: "down".to_string(),
                message: "503".to_string(),
            })
        });
        let outcome = fill_gaps(&traj, &GapFillConfig::default(), Some(&planner)).unwrap();
        assert_eq!(outcome.report.segments[0].strategy, FillStrategy::Fallback);
        assert!(outcome.report.inserted_count > 200);

        let without_planner = fill_gaps(&traj, &GapFillConfig::default(), None).unwrap();
        assert_eq!(without_planner.report.segments[0].strategy, FillStrategy::Fallback);
        assert_eq!(without_planner.trajectory, outcome.trajectory);
    }

    #[test]
    fn test_merge_is_stable_and_dedups() {
        let original = vec![
            TrajectoryPoint::with_timestamp(0.0, 0.0, 0),
            TrajectoryPoint::with_timestamp(0.0, 1.0, 1_000),
        ];
        let inserted = vec![
            TrajectoryPoint::with_timestamp(0.0, 0.5, 500),
            TrajectoryPoint::with_timestamp(0.0, 0.6, 500),
            TrajectoryPoint::with_timestamp(0.0, 0.9, 1_000),
        ];
        let merged = merge_by_timestamp(&original, inserted);
        let lats: Vec<f64> = merged.iter().map(|p| p.lat).collect();
        // Original wins at t=1000; the earlier of the two t=500 points is kept
        assert_eq!(lats, vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn test_no_segments_passes_through() {
        let traj = Trajectory::new(
            CoordinateSystem::Wgs84,
            (0..10)
                .map(|i| TrajectoryPoint::new(104.0 + i as f64 * 0.001, 30.6))
                .collect(),
        );
        let outcome = fill_gaps(&traj, &GapFillConfig::default(), None).unwrap();
        assert_eq!(outcome.trajectory, traj);
        assert_eq!(outcome.report.segment_count, 0);
    }
}
