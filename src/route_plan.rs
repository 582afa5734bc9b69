//! Route acquisition.
//!
//! Routing providers live outside this crate. They plug in through the
//! [`RoutePlanner`] trait; [`PlannerChain`] tries several in order and keeps a
//! record of every failed attempt. [`acquire_trajectory`] turns a planned
//! polyline into a full trajectory by running the driving-state simulator
//! over it.
//!
//! Endpoints and waypoints arrive as text in the providers' usual
//! `"lng,lat"` / `"lng,lat;lng,lat"` format.

use std::fmt;

use log::{info, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::coords::{self, is_in_coverage_region};
use crate::simulate::{DrivingStateSimulator, SimulatorConfig};
use crate::{Coordinate, CoordinateSystem, Result, TrajError, Trajectory};

/// A source of route polylines between two coordinates.
///
/// Implementations return coordinates in `coord_system`, origin first.
pub trait RoutePlanner {
    fn name(&self) -> &str;

    fn plan(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        coord_system: CoordinateSystem,
    ) -> Result<Vec<Coordinate>>;
}

impl<T: RoutePlanner + ?Sized> RoutePlanner for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn plan(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        coord_system: CoordinateSystem,
    ) -> Result<Vec<Coordinate>> {
        (**self).plan(origin, destination, coord_system)
    }
}

// =============================================================================
// Planner chain
// =============================================================================

/// Outcome of asking one planner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanAttempt {
    pub planner: String,
    /// `None` on success
    pub error: Option<String>,
}

/// Ordered fallback over several planners.
///
/// The first planner returning a non-empty polyline wins. An empty polyline
/// counts as a failure.
#[derive(Default)]
pub struct PlannerChain {
    planners: Vec<Box<dyn RoutePlanner>>,
}

impl fmt::Debug for PlannerChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.planners.iter().map(|p| p.name()))
            .finish()
    }
}

impl PlannerChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a planner to the end of the chain.
    pub fn with(mut self, planner: impl RoutePlanner + 'static) -> Self {
        self.planners.push(Box::new(planner));
        self
    }

    pub fn push(&mut self, planner: Box<dyn RoutePlanner>) {
        self.planners.push(planner);
    }

    pub fn len(&self) -> usize {
        self.planners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.planners.is_empty()
    }

    /// Try planners in order, returning the polyline (if any) and every attempt made.
    pub fn plan_with_attempts(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        coord_system: CoordinateSystem,
    ) -> (Option<Vec<Coordinate>>, Vec<PlanAttempt>) {
        let mut attempts = Vec::with_capacity(self.planners.len());

        for planner in &self.planners {
            let error = match planner.plan(origin, destination, coord_system) {
                Ok(route) if !route.is_empty() => {
                    attempts.push(PlanAttempt {
                        planner: planner.name().to_string(),
                        error: None,
                    });
                    return (Some(route), attempts);
                }
                Ok(_) => "returned an empty route".to_string(),
                Err(e) => e.to_string(),
            };
            warn!("[RoutePlan] Planner '{}' failed: {}", planner.name(), error);
            attempts.push(PlanAttempt {
                planner: planner.name().to_string(),
                error: Some(error),
            });
        }
        (None, attempts)
    }
}

impl RoutePlanner for PlannerChain {
    fn name(&self) -> &str {
        "chain"
    }

    fn plan(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        coord_system: CoordinateSystem,
    ) -> Result<Vec<Coordinate>> {
        let (route, attempts) = self.plan_with_attempts(origin, destination, coord_system);
        route.ok_or_else(|| {
            let message = if attempts.is_empty() {
                "no planners configured".to_string()
            } else {
                attempts
                    .iter()
                    .map(|a| format!("{}: {}", a.planner, a.error.as_deref().unwrap_or("ok")))
                    .collect::<Vec<_>>()
                    .join("; ")
            };
            TrajError::Collaborator {
                planner: self.name().to_string(),
                message,
            }
        })
    }
}

// =============================================================================
// In-memory planners
// =============================================================================

/// Always returns the same polyline.
#[derive(Debug, Clone)]
pub struct StaticPlanner {
    name: String,
    route: Vec<Coordinate>,
}

impl StaticPlanner {
    pub fn new(name: impl Into<String>, route: Vec<Coordinate>) -> Self {
        Self {
            name: name.into(),
            route,
        }
    }
}

impl RoutePlanner for StaticPlanner {
    fn name(&self) -> &str {
        &self.name
    }

    fn plan(&self, _: Coordinate, _: Coordinate, _: CoordinateSystem) -> Result<Vec<Coordinate>> {
        Ok(self.route.clone())
    }
}

/// Planner backed by a closure.
pub struct FnPlanner<F> {
    name: String,
    plan_fn: F,
}

impl<F> FnPlanner<F>
where
    F: Fn(Coordinate, Coordinate, CoordinateSystem) -> Result<Vec<Coordinate>>,
{
    pub fn new(name: impl Into<String>, plan_fn: F) -> Self {
        Self {
            name: name.into(),
            plan_fn,
        }
    }
}

impl<F> RoutePlanner for FnPlanner<F>
where
    F: Fn(Coordinate, Coordinate, CoordinateSystem) -> Result<Vec<Coordinate>>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn plan(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        coord_system: CoordinateSystem,
    ) -> Result<Vec<Coordinate>> {
        (self.plan_fn)(origin, destination, coord_system)
    }
}

// =============================================================================
// Endpoint handling
// =============================================================================

/// Parse `"lng,lat"`.
pub fn parse_endpoint(text: &str) -> Result<Coordinate> {
    let parts: Vec<&str> = text.split(',').map(str::trim).collect();
    if parts.len() != 2 {
        return Err(TrajError::validation(format!(
            "endpoint '{}' must be formatted as 'lng,lat'",
            text
        )));
    }
    let parse = |s: &str| {
        s.parse::<f64>()
            .map_err(|e| TrajError::validation(format!("endpoint '{}': {}", text, e)))
    };
    let coord = Coordinate::new(parse(parts[0])?, parse(parts[1])?);
    if !coord.is_valid() {
        return Err(TrajError::validation(format!(
            "endpoint '{}' is out of geographic range",
            text
        )));
    }
    Ok(coord)
}

/// Parse `"lng,lat;lng,lat;..."`. An empty string yields no waypoints.
pub fn parse_waypoints(text: &str) -> Result<Vec<Coordinate>> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(Vec::new());
    }
    text.split(';').map(parse_endpoint).collect()
}

/// Check that an endpoint given in `coord_system` lies inside the coverage
/// region once converted to WGS84. Returns the WGS84 coordinate.
pub fn validate_endpoint(coord: Coordinate, coord_system: CoordinateSystem) -> Result<Coordinate> {
    let wgs84 = coords::convert(coord, coord_system, CoordinateSystem::Wgs84);
    if !wgs84.is_valid() || !is_in_coverage_region(wgs84.lng, wgs84.lat) {
        return Err(TrajError::validation(format!(
            "endpoint ({}, {}) in {} is outside the coverage region",
            coord.lng, coord.lat, coord_system
        )));
    }
    Ok(wgs84)
}

/// Plan a route through `waypoints` leg by leg and join the legs, dropping
/// the duplicated junction vertices.
pub fn plan_route(
    planner: &dyn RoutePlanner,
    origin: Coordinate,
    destination: Coordinate,
    waypoints: &[Coordinate],
    coord_system: CoordinateSystem,
) -> Result<Vec<Coordinate>> {
    let stops: Vec<Coordinate> = std::iter::once(origin)
        .chain(waypoints.iter().copied())
        .chain(std::iter::once(destination))
        .collect();

    let mut route: Vec<Coordinate> = Vec::new();
    for leg in stops.windows(2) {
        let polyline = planner.plan(leg[0], leg[1], coord_system)?;
        let skip = match (route.last(), polyline.first()) {
            (Some(last), Some(first)) if last == first => 1,
            _ => 0,
        };
        route.extend(polyline.into_iter().skip(skip));
    }
    Ok(route)
}

/// Plan a route and give it simulated speeds and timestamps.
///
/// Endpoints must lie in the coverage region. The result is tagged with
/// `coord_system`, the system the planner was asked for.
pub fn acquire_trajectory<R: Rng + ?Sized>(
    planner: &dyn RoutePlanner,
    origin: Coordinate,
    destination: Coordinate,
    waypoints: &[Coordinate],
    coord_system: CoordinateSystem,
    simulator: &SimulatorConfig,
    rng: &mut R,
) -> Result<Trajectory> {
    validate_endpoint(origin, coord_system)?;
    validate_endpoint(destination, coord_system)?;
    let simulator = DrivingStateSimulator::new(simulator.clone())?;

    let route = plan_route(planner, origin, destination, waypoints, coord_system)?;
    info!(
        "[RoutePlan] Planner '{}' returned {} vertices across {} legs",
        planner.name(),
        route.len(),
        waypoints.len() + 1
    );

    let trajectory = Trajectory::from_coords(coord_system, &route);
    simulator.simulate(&trajectory, rng)
}
