//! Detour-based noise removal.
//!
//! A GPS glitch shows up as a pair of long hops: the track jumps away to the
//! bad fix(es) and jumps back. Detection runs in two phases:
//!
//! 1. **Hops**: every consecutive pair whose distance reaches `distance_limit`.
//! 2. **Detours**: for each consecutive pair of hops `(h_k, h_{k+1})`, the
//!    chord from `p[h_k]` to `p[h_{k+1} + 1]` is compared with both hop
//!    lengths. When both hops are at least `time_multiplier × chord`, every
//!    point strictly between the chord ends is noise.
//!
//! A single outlier produces adjacent hops; a cluster of bad fixes produces
//! hops separated by the cluster. A hop that closes a detour never opens a
//! non-adjacent one, so two separate outliers don't swallow the track between
//! them. A genuine long move has one hop and a long chord, so it survives.

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::geo_utils::haversine_distance;
#[cfg(not(feature = "parallel"))]
use crate::geo_utils::haversine_distance_vector;
#[cfg(feature = "parallel")]
use crate::geo_utils::haversine_distance_vector_parallel;
use crate::{Level, Located, Result, TrajError, Trajectory, TrajectoryPoint};

/// Denoising thresholds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DenoiseConfig {
    /// Preset strength. low = (10 km, 3), mid = (8 km, 2), high = (5 km, 1).
    /// Default: low
    pub level: Level,

    /// Overrides the level's hop distance (m).
    /// Default: None
    pub distance_limit: Option<f64>,

    /// Overrides the level's hop-to-chord ratio.
    /// Default: None
    pub time_multiplier: Option<f64>,
}

impl DenoiseConfig {
    pub fn with_level(level: Level) -> Self {
        Self {
            level,
            ..Self::default()
        }
    }

    /// Effective `(distance_limit, time_multiplier)`.
    pub fn thresholds(&self) -> (f64, f64) {
        let (limit, multiplier) = match self.level {
            Level::Low => (10_000.0, 3.0),
            Level::Mid => (8_000.0, 2.0),
            Level::High => (5_000.0, 1.0),
        };
        (
            self.distance_limit.unwrap_or(limit),
            self.time_multiplier.unwrap_or(multiplier),
        )
    }

    pub fn validate(&self) -> Result<()> {
        let (limit, multiplier) = self.thresholds();
        if !(limit > 0.0 && limit.is_finite()) {
            return Err(TrajError::validation("denoise distance_limit must be positive"));
        }
        if !(multiplier > 0.0 && multiplier.is_finite()) {
            return Err(TrajError::validation("denoise time_multiplier must be positive"));
        }
        Ok(())
    }
}

/// Run of points to remove: everything strictly between the two indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoiseSpan {
    pub start_index: usize,
    pub end_index: usize,
}

impl NoiseSpan {
    /// Indices of the removed interior.
    pub fn interior(&self) -> std::ops::Range<usize> {
        (self.start_index + 1)..self.end_index
    }
}

/// What the denoiser removed, stored as `noise_info` in output metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NoiseReport {
    pub noise_count: usize,
    /// Removed points in their original order
    pub noise_points: Vec<TrajectoryPoint>,
    pub spans: Vec<NoiseSpan>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DenoiseOutcome {
    pub trajectory: Trajectory,
    pub report: NoiseReport,
}

/// Detect detour spans given consecutive distances.
///
/// `distances[i]` is the distance between points `i` and `i + 1`.
pub fn detect_noise_spans<P: Located>(
    points: &[P],
    distances: &[f64],
    distance_limit: f64,
    time_multiplier: f64,
) -> Vec<NoiseSpan> {
    let hops: Vec<usize> = distances
        .iter()
        .enumerate()
        .filter(|(_, &d)| d >= distance_limit)
        .map(|(i, _)| i)
        .collect();

    let mut spans = Vec::new();
    let mut closing_hop: Option<usize> = None;

    for pair in hops.windows(2) {
        let (first, second) = (pair[0], pair[1]);
        if second > first + 1 && closing_hop == Some(first) {
            continue;
        }

        let left = first;
        let right = second + 1;
        let chord = haversine_distance(&points[left].coord(), &points[right].coord());
        let threshold = time_multiplier * chord;

        if distances[first] >= threshold && distances[second] >= threshold {
            debug!(
                "[Denoise] Detour {}..{}: hops {:.0}m/{:.0}m, chord {:.0}m",
                left, right, distances[first], distances[second], chord
            );
            spans.push(NoiseSpan {
                start_index: left,
                end_index: right,
            });
            closing_hop = Some(second);
        }
    }
    spans
}

/// Remove detour noise from a trajectory.
///
/// Trajectories without noise come back unchanged with an empty report.
pub fn denoise(trajectory: &Trajectory, config: &DenoiseConfig) -> Result<DenoiseOutcome> {
    config.validate()?;
    let (limit, multiplier) = config.thresholds();

    let points = &trajectory.points;
    #[cfg(feature = "parallel")]
    let distances = haversine_distance_vector_parallel(points);
    #[cfg(not(feature = "parallel"))]
    let distances = haversine_distance_vector(points);
    let spans = detect_noise_spans(points, &distances, limit, multiplier);

    let mut is_noise = vec![false; points.len()];
    for span in &spans {
        for i in span.interior() {
            is_noise[i] = true;
        }
    }

    let mut kept = Vec::with_capacity(points.len());
    let mut noise_points = Vec::new();
    for (point, noise) in points.iter().zip(&is_noise) {
        if *noise {
            noise_points.push(*point);
        } else {
            kept.push(*point);
        }
    }

    info!(
        "[Denoise] {} points in, {} noise points removed across {} spans",
        points.len(),
        noise_points.len(),
        spans.len()
    );

    Ok(DenoiseOutcome {
        trajectory: trajectory.with_points(kept),
        report: NoiseReport {
            noise_count: noise_points.len(),
            noise_points,
            spans,
        },
    })
}
