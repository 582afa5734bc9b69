//! Driving-state simulation: synthesize speed and timestamp fields for
//! trajectories that arrive as bare geometry (e.g. planned route polylines).
//!
//! ## Speed
//!
//! Speed follows a random walk modulated by an acceleration mode
//! (accelerate / decelerate / cruise). At every step the current speed is
//! classified into a bucket (low < 50, mid < 70, high < 90, super-high km/h),
//! the speed is nudged by a bucket- and mode-dependent uniform amount, and the
//! next mode is drawn from a fixed bucket × mode transition table. Over long
//! runs the walk averages a little under 70 km/h.
//!
//! ## Timestamps
//!
//! Elapsed time between consecutive points is chord distance over the mean of
//! the two speeds, clamped to `[lower_interval_sec, upper_interval_sec]`
//! (10 s when both speeds are zero).
//!
//! ## Stops
//!
//! Optionally, random windows of ±`half_width` points get zero speed with the
//! window ends pinned to `edge_speed`. Stops are injected after timestamps are
//! generated, so timestamps stay as computed.
//!
//! The process is stochastic; the random source is always supplied by the
//! caller so results are reproducible with a seeded generator.
//!
//! ## Example
//! ```rust
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//! use traj_refiner::{Coordinate, CoordinateSystem, Trajectory};
//! use traj_refiner::simulate::{simulate_driving_state, SimulatorConfig};
//!
//! let coords: Vec<Coordinate> = (0..50)
//!     .map(|i| Coordinate::new(116.30 + i as f64 * 0.002, 39.90))
//!     .collect();
//! let route = Trajectory::from_coords(CoordinateSystem::Wgs84, &coords);
//!
//! let mut rng = StdRng::seed_from_u64(7);
//! let simulated = simulate_driving_state(&route, &SimulatorConfig::default(), &mut rng).unwrap();
//! assert!(simulated.has_temporal_fields());
//! ```

use chrono::NaiveDateTime;
use log::{debug, info};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::geo_utils::{compute_directions, haversine_distance_vector};
use crate::{Result, TrajError, Trajectory};

const START_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Elapsed time used when both endpoint speeds are zero.
const STATIONARY_INTERVAL_SEC: f64 = 10.0;

/// Transition probabilities `[accelerate, decelerate, cruise]`,
/// indexed by `[speed bucket][current mode]`.
const TRANSITIONS: [[[f64; 3]; 3]; 4] = [
    // low
    [[0.8, 0.1, 0.1], [0.1, 0.8, 0.1], [0.3, 0.3, 0.4]],
    // mid
    [[0.6, 0.1, 0.3], [0.2, 0.5, 0.3], [0.3, 0.2, 0.5]],
    // high
    [[0.4, 0.2, 0.4], [0.1, 0.5, 0.4], [0.1, 0.1, 0.8]],
    // super-high
    [[0.3, 0.4, 0.3], [0.1, 0.6, 0.3], [0.2, 0.4, 0.4]],
];

/// Speed band used to pick transition probabilities and step sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeedBucket {
    Low,
    Mid,
    High,
    SuperHigh,
}

impl SpeedBucket {
    /// Classify a speed in km/h.
    pub fn classify(speed: f64) -> Self {
        if speed < 50.0 {
            SpeedBucket::Low
        } else if speed < 70.0 {
            SpeedBucket::Mid
        } else if speed < 90.0 {
            SpeedBucket::High
        } else {
            SpeedBucket::SuperHigh
        }
    }

    fn index(self) -> usize {
        match self {
            SpeedBucket::Low => 0,
            SpeedBucket::Mid => 1,
            SpeedBucket::High => 2,
            SpeedBucket::SuperHigh => 3,
        }
    }

    fn is_fast(self) -> bool {
        matches!(self, SpeedBucket::High | SpeedBucket::SuperHigh)
    }
}

/// Acceleration state of the simulated vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccelMode {
    Accelerate,
    Decelerate,
    Cruise,
}

impl AccelMode {
    fn index(self) -> usize {
        match self {
            AccelMode::Accelerate => 0,
            AccelMode::Decelerate => 1,
            AccelMode::Cruise => 2,
        }
    }

    /// Select the next mode given a uniform draw in `[0, 1)`.
    pub fn next(self, bucket: SpeedBucket, draw: f64) -> Self {
        let p = TRANSITIONS[bucket.index()][self.index()];
        if draw < p[0] {
            AccelMode::Accelerate
        } else if draw < p[0] + p[1] {
            AccelMode::Decelerate
        } else {
            AccelMode::Cruise
        }
    }

    /// Speed change for one step (km/h).
    fn speed_delta<R: Rng + ?Sized>(self, bucket: SpeedBucket, rng: &mut R) -> f64 {
        match self {
            // Gentler acceleration and harsher braking at speed keep the walk
            // near the steady-state band.
            AccelMode::Accelerate if bucket.is_fast() => rng.gen_range(2.0..6.0),
            AccelMode::Accelerate => rng.gen_range(4.0..8.0),
            AccelMode::Decelerate if bucket.is_fast() => -rng.gen_range(4.0..8.0),
            AccelMode::Decelerate => -rng.gen_range(2.0..6.0),
            AccelMode::Cruise => rng.gen_range(-2.0..2.0),
        }
    }
}

/// Stationary-period injection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StopConfig {
    /// Number of stop windows.
    /// Default: 5
    pub count: usize,
    /// Points on each side of the window centre.
    /// Default: 5
    pub half_width: usize,
    /// Speed pinned on both window ends (km/h).
    /// Default: 30.0
    pub edge_speed: f64,
}

impl Default for StopConfig {
    fn default() -> Self {
        Self {
            count: 5,
            half_width: 5,
            edge_speed: 30.0,
        }
    }
}

/// Configuration for the driving-state simulator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulatorConfig {
    /// Timestamp of the first point, `%Y-%m-%d %H:%M:%S`, read as UTC.
    /// Default: "2014-06-07 08:00:00"
    pub start_time: String,

    /// Upper speed clamp (km/h).
    /// Default: 100.0
    pub max_speed: f64,

    /// Speed of the first point (km/h).
    /// Default: 10.0
    pub initial_speed: f64,

    /// Shortest allowed gap between consecutive timestamps (s).
    /// Default: 5.0
    pub lower_interval_sec: f64,

    /// Longest allowed gap between consecutive timestamps (s).
    /// Default: 30.0
    pub upper_interval_sec: f64,

    /// Stop injection, disabled when `None`.
    /// Default: None
    pub stop: Option<StopConfig>,

    /// Also compute per-point directions.
    /// Default: false
    pub fill_directions: bool,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            start_time: "2014-06-07 08:00:00".to_string(),
            max_speed: 100.0,
            initial_speed: 10.0,
            lower_interval_sec: 5.0,
            upper_interval_sec: 30.0,
            stop: None,
            fill_directions: false,
        }
    }
}

impl SimulatorConfig {
    /// Start time as milliseconds since the Unix epoch.
    pub fn start_epoch_ms(&self) -> Result<i64> {
        NaiveDateTime::parse_from_str(self.start_time.trim(), START_TIME_FORMAT)
            .map(|dt| dt.and_utc().timestamp_millis())
            .map_err(|e| {
                TrajError::validation(format!(
                    "start time '{}' does not match {}: {}",
                    self.start_time, START_TIME_FORMAT, e
                ))
            })
    }

    pub fn validate(&self) -> Result<()> {
        self.start_epoch_ms()?;
        if !(self.max_speed > 0.0) {
            return Err(TrajError::validation("max_speed must be positive"));
        }
        if !(0.0..=self.max_speed).contains(&self.initial_speed) {
            return Err(TrajError::validation(
                "initial_speed must lie within [0, max_speed]",
            ));
        }
        if !(self.lower_interval_sec >= 0.0 && self.lower_interval_sec <= self.upper_interval_sec) {
            return Err(TrajError::validation(
                "time intervals must satisfy 0 <= lower_interval_sec <= upper_interval_sec",
            ));
        }
        if let Some(stop) = &self.stop {
            if !(0.0..=self.max_speed).contains(&stop.edge_speed) {
                return Err(TrajError::validation(
                    "stop edge_speed must lie within [0, max_speed]",
                ));
            }
        }
        Ok(())
    }
}

/// Reusable simulator with a validated configuration.
#[derive(Debug, Clone)]
pub struct DrivingStateSimulator {
    config: SimulatorConfig,
    start_ms: i64,
}

impl DrivingStateSimulator {
    pub fn new(config: SimulatorConfig) -> Result<Self> {
        config.validate()?;
        let start_ms = config.start_epoch_ms()?;
        Ok(Self { config, start_ms })
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Produce a copy of `trajectory` with synthesized speed and timestamp
    /// fields (and directions, when configured).
    ///
    /// Existing speed/timestamp values are overwritten.
    pub fn simulate<R: Rng + ?Sized>(&self, trajectory: &Trajectory, rng: &mut R) -> Result<Trajectory> {
        trajectory.validate(2)?;
        let n = trajectory.len();

        let mut speeds = generate_speeds(n, &self.config, rng);
        let distances = haversine_distance_vector(&trajectory.points);
        let timestamps = generate_timestamps(&distances, &speeds, self.start_ms, &self.config);

        if let Some(stop) = &self.config.stop {
            inject_stops(&mut speeds, stop, rng);
        }

        let directions = self
            .config
            .fill_directions
            .then(|| compute_directions(&trajectory.points));

        let points = trajectory
            .points
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let mut point = *p;
                point.speed = Some(speeds[i]);
                point.timestamp = Some(timestamps[i]);
                if let Some(directions) = &directions {
                    point.direction = Some(directions[i]);
                }
                point
            })
            .collect();

        info!(
            "[Simulate] Generated driving state for {} points, duration={}s",
            n,
            (timestamps[n - 1] - timestamps[0]) / 1000
        );

        Ok(trajectory.with_points(points))
    }
}

/// Convenience wrapper around [`DrivingStateSimulator`].
pub fn simulate_driving_state<R: Rng + ?Sized>(
    trajectory: &Trajectory,
    config: &SimulatorConfig,
    rng: &mut R,
) -> Result<Trajectory> {
    DrivingStateSimulator::new(config.clone())?.simulate(trajectory, rng)
}

/// Markov-modulated speed sequence of length `n`, every value in `[0, max_speed]`.
pub fn generate_speeds<R: Rng + ?Sized>(n: usize, config: &SimulatorConfig, rng: &mut R) -> Vec<f64> {
    let mut speeds = Vec::with_capacity(n);
    let mut speed = config.initial_speed;
    let mut mode = AccelMode::Accelerate;

    for _ in 0..n {
        speeds.push(speed);

        let bucket = SpeedBucket::classify(speed);
        speed += mode.speed_delta(bucket, rng);
        speed = round2(speed).max(0.0).min(config.max_speed);

        mode = mode.next(bucket, rng.gen::<f64>());
    }
    speeds
}

/// Cumulative millisecond timestamps from per-pair distances and point speeds.
///
/// `distances[i]` is the distance between points `i` and `i + 1`.
pub fn generate_timestamps(
    distances: &[f64],
    speeds: &[f64],
    start_ms: i64,
    config: &SimulatorConfig,
) -> Vec<i64> {
    let mut elapsed_ms = 0.0;
    let mut timestamps = Vec::with_capacity(speeds.len());
    timestamps.push(start_ms);

    for (i, distance) in distances.iter().enumerate() {
        let avg_speed = (speeds[i] + speeds[i + 1]) / 2.0;
        let delta_sec = if avg_speed > 0.0 {
            (distance / (avg_speed / 3.6))
                .max(config.lower_interval_sec)
                .min(config.upper_interval_sec)
        } else {
            STATIONARY_INTERVAL_SEC
        };
        elapsed_ms += delta_sec * 1000.0;
        timestamps.push(start_ms + elapsed_ms as i64);
    }
    timestamps
}

/// Per-point speeds (km/h) implied by recorded timestamps.
///
/// Point `i` takes the speed over the pair ending at it; the first point
/// copies the second. Pairs with a non-positive time step yield 0.
pub fn derive_speeds(distances: &[f64], timestamps: &[i64]) -> Vec<f64> {
    let mut speeds: Vec<f64> = Vec::with_capacity(timestamps.len());
    speeds.push(0.0);
    for (i, distance) in distances.iter().enumerate() {
        let delta_ms = timestamps[i + 1] - timestamps[i];
        let speed = if delta_ms > 0 {
            round2(distance / (delta_ms as f64 / 1000.0) * 3.6)
        } else {
            0.0
        };
        speeds.push(speed);
    }
    if speeds.len() > 1 {
        speeds[0] = speeds[1];
    }
    speeds
}

/// Zero out random windows of speeds, pinning each window's ends.
pub fn inject_stops<R: Rng + ?Sized>(speeds: &mut [f64], stop: &StopConfig, rng: &mut R) {
    let n = speeds.len();
    if n < 2 {
        return;
    }
    for _ in 0..stop.count {
        let centre = rng.gen_range(0.0..(n - 1) as f64) as usize;
        let left = centre.saturating_sub(stop.half_width);
        let right = (centre + stop.half_width).min(n - 1);

        speeds[left..=right].iter_mut().for_each(|s| *s = 0.0);
        speeds[left] = stop.edge_speed;
        speeds[right] = stop.edge_speed;
        debug!("[Simulate] Injected stop over points {}..={}", left, right);
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
