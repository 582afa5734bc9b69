//! Trajectory processor: validation, normalization and dispatch.
//!
//! Every entry point follows the same steps:
//!
//! 1. Validate the input (at least two points, finite in-range coordinates).
//! 2. Convert to WGS84 when the input is in an offset system.
//! 3. Summarize the normalized input as `traj_info`.
//! 4. Run one component.
//! 5. Return a [`TrajectoryDocument`] carrying the component's report.
//!
//! Components run independently; chain them by feeding one document's
//! trajectory into the next call.
//!
//! ## Example
//! ```rust
//! use traj_refiner::{PipelineConfig, TrajectoryPoint, TrajectoryProcessor};
//!
//! let processor = TrajectoryProcessor::new(PipelineConfig::default()).unwrap();
//! let raw: Vec<TrajectoryPoint> = (0..30)
//!     .map(|i| TrajectoryPoint::with_timestamp(104.0 + i as f64 * 0.0005, 30.6, i * 2_000))
//!     .collect();
//!
//! let doc = processor.simplify(&processor.ingest(raw)).unwrap();
//! let info = doc.meta.simplify_info.as_ref().unwrap();
//! assert!(info.remaining_count < info.raw_count);
//! ```

use log::info;
use rand::Rng;

use crate::denoise::denoise;
use crate::gap_fill::fill_gaps;
use crate::geo_utils::{haversine_distance_vector, TrajectorySummary};
use crate::output::{TrajectoryDocument, TrajectoryMeta};
use crate::route_plan::{acquire_trajectory, RoutePlanner};
use crate::simplify::simplify;
use crate::simulate::{derive_speeds, DrivingStateSimulator};
use crate::{Coordinate, CoordinateSystem, PipelineConfig, Result, Trajectory, TrajectoryPoint};

/// Minimum number of points any component accepts.
const MIN_POINTS: usize = 2;

/// Entry point for all trajectory processing.
#[derive(Debug, Clone)]
pub struct TrajectoryProcessor {
    config: PipelineConfig,
    simulator: DrivingStateSimulator,
}

impl TrajectoryProcessor {
    /// Create a processor, rejecting invalid settings up front.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let simulator = DrivingStateSimulator::new(config.simulator.clone())?;
        Ok(Self { config, simulator })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Tag raw points with the configured input coordinate system.
    pub fn ingest(&self, points: Vec<TrajectoryPoint>) -> Trajectory {
        Trajectory::new(self.config.coord_type, points)
    }

    /// Remove detour noise.
    pub fn denoise(&self, trajectory: &Trajectory) -> Result<TrajectoryDocument> {
        let (normalized, mut meta) = self.prepare(trajectory)?;
        let outcome = denoise(&normalized, &self.config.denoise)?;
        meta.noise_info = Some(outcome.report);
        Ok(TrajectoryDocument::new(outcome.trajectory, meta))
    }

    /// Reduce the point count.
    pub fn simplify(&self, trajectory: &Trajectory) -> Result<TrajectoryDocument> {
        let (normalized, mut meta) = self.prepare(trajectory)?;
        let outcome = simplify(&normalized, &self.config.simplify)?;
        meta.simplify_info = Some(outcome.report);
        Ok(TrajectoryDocument::new(outcome.trajectory, meta))
    }

    /// Detect and fill missing segments, consulting `planner` in route-plan mode.
    pub fn fill_gaps(&self, trajectory: &Trajectory, planner: &dyn RoutePlanner) -> Result<TrajectoryDocument> {
        let (normalized, mut meta) = self.prepare(trajectory)?;
        let outcome = fill_gaps(&normalized, &self.config.gap_fill, Some(planner))?;
        meta.missing_supplement_info = Some(outcome.report);
        Ok(TrajectoryDocument::new(outcome.trajectory, meta))
    }

    /// Synthesize speeds and timestamps for trajectories that lack them.
    ///
    /// Only trajectories with no timestamp at all are simulated. Recorded
    /// timestamps are kept: missing speeds are derived from them, and a
    /// trajectory timed on only some points is rejected with `MissingField`.
    pub fn complete_temporal_fields<R: Rng + ?Sized>(
        &self,
        trajectory: &Trajectory,
        rng: &mut R,
    ) -> Result<TrajectoryDocument> {
        let (normalized, meta) = self.prepare(trajectory)?;
        if normalized.points.iter().all(|p| p.timestamp.is_none()) {
            let simulated = self.simulator.simulate(&normalized, rng)?;
            return Ok(TrajectoryDocument::new(simulated, meta));
        }

        let timestamps = normalized.timestamps()?;
        if normalized.has_temporal_fields() {
            info!("[Pipeline] Temporal fields already present, skipping simulation");
            return Ok(TrajectoryDocument::new(normalized, meta));
        }

        let derived = derive_speeds(&haversine_distance_vector(&normalized.points), &timestamps);
        let mut filled = 0;
        let points = normalized
            .points
            .iter()
            .zip(derived)
            .map(|(p, speed)| {
                let mut point = *p;
                if point.speed.is_none() {
                    point.speed = Some(speed);
                    filled += 1;
                }
                point
            })
            .collect();
        info!("[Pipeline] Derived {} missing speeds from recorded timestamps", filled);
        Ok(TrajectoryDocument::new(normalized.with_points(points), meta))
    }

    /// Plan a route in the configured coordinate system and simulate driving
    /// along it. The document holds the WGS84 trajectory.
    pub fn acquire<R: Rng + ?Sized>(
        &self,
        planner: &dyn RoutePlanner,
        origin: Coordinate,
        destination: Coordinate,
        waypoints: &[Coordinate],
        rng: &mut R,
    ) -> Result<TrajectoryDocument> {
        let acquired = acquire_trajectory(
            planner,
            origin,
            destination,
            waypoints,
            self.config.coord_type,
            self.simulator.config(),
            rng,
        )?;
        let (normalized, meta) = self.prepare(&acquired)?;
        Ok(TrajectoryDocument::new(normalized, meta))
    }

    /// Validate, convert to WGS84 and summarize.
    fn prepare(&self, trajectory: &Trajectory) -> Result<(Trajectory, TrajectoryMeta)> {
        trajectory.validate(MIN_POINTS)?;

        let normalized = if trajectory.coord_system != CoordinateSystem::Wgs84 {
            info!(
                "[Pipeline] Converting {} points from {} to {}",
                trajectory.len(),
                trajectory.coord_system,
                CoordinateSystem::Wgs84
            );
            trajectory.to_coord_system(CoordinateSystem::Wgs84)
        } else {
            trajectory.clone()
        };

        let meta = TrajectoryMeta {
            traj_info: Some(TrajectorySummary::from_trajectory(&normalized)),
            ..TrajectoryMeta::default()
        };
        Ok((normalized, meta))
    }
}
