//! Configuration surface: severity levels, mode identifiers and the
//! top-level [`PipelineConfig`].
//!
//! All identifiers parse through `FromStr` and reject unknown values with
//! [`TrajError::Validation`]. JSON configs reject unknown keys.
//!
//! ## Example
//! ```rust
//! use traj_refiner::config::{Level, PipelineConfig, SimplifyMode};
//!
//! let config = PipelineConfig::from_json_str(r#"{
//!     "coord_type": "gcj02",
//!     "simplify": { "mode": "rdp", "level": "mid" }
//! }"#).unwrap();
//!
//! assert_eq!(config.simplify.mode, SimplifyMode::Rdp);
//! assert_eq!(config.simplify.level, Level::Mid);
//! ```

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::denoise::DenoiseConfig;
use crate::gap_fill::GapFillConfig;
use crate::simplify::SimplifyConfig;
use crate::simulate::SimulatorConfig;
use crate::{CoordinateSystem, Result, TrajError};

/// Processing strength. Higher levels remove more points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    #[default]
    Low,
    Mid,
    High,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Low => "low",
            Level::Mid => "mid",
            Level::High => "high",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = TrajError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Level::Low),
            "mid" => Ok(Level::Mid),
            "high" => Ok(Level::High),
            other => Err(TrajError::validation(format!(
                "level '{}' is not supported, expected low, mid or high",
                other
            ))),
        }
    }
}

/// Simplification algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimplifyMode {
    /// Keep points so the average sampling interval approaches a target
    #[default]
    IntervalOriented,
    /// Keep every (stride + 1)-th point
    Downclocking,
    /// Ramer-Douglas-Peucker with a distance threshold in meters
    Rdp,
}

impl SimplifyMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SimplifyMode::IntervalOriented => "interval_oriented",
            SimplifyMode::Downclocking => "downclocking",
            SimplifyMode::Rdp => "rdp",
        }
    }
}

impl fmt::Display for SimplifyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SimplifyMode {
    type Err = TrajError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "interval_oriented" => Ok(SimplifyMode::IntervalOriented),
            "downclocking" => Ok(SimplifyMode::Downclocking),
            "rdp" => Ok(SimplifyMode::Rdp),
            other => Err(TrajError::validation(format!(
                "simplify mode '{}' is not supported, expected interval_oriented, downclocking or rdp",
                other
            ))),
        }
    }
}

/// Strategy for filling missing segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapFillMode {
    /// Ask the route planner, interpolating when it fails
    #[default]
    RoutePlan,
    /// Straight-line interpolation at a fixed step
    Interpolate,
}

impl GapFillMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            GapFillMode::RoutePlan => "route_plan",
            GapFillMode::Interpolate => "interpolate",
        }
    }
}

impl fmt::Display for GapFillMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GapFillMode {
    type Err = TrajError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "route_plan" => Ok(GapFillMode::RoutePlan),
            "interpolate" => Ok(GapFillMode::Interpolate),
            other => Err(TrajError::validation(format!(
                "gap fill mode '{}' is not supported, expected route_plan or interpolate",
                other
            ))),
        }
    }
}

/// Configuration for every component of the processor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Coordinate system the raw input points are expressed in.
    /// Default: wgs84
    pub coord_type: CoordinateSystem,

    pub denoise: DenoiseConfig,

    pub simplify: SimplifyConfig,

    pub gap_fill: GapFillConfig,

    pub simulator: SimulatorConfig,
}

impl PipelineConfig {
    /// Parse and validate a JSON config.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: PipelineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Check numeric settings of every component.
    pub fn validate(&self) -> Result<()> {
        self.denoise.validate()?;
        self.simplify.validate()?;
        self.gap_fill.validate()?;
        self.simulator.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_levels_and_modes() {
        assert_eq!("HIGH".parse::<Level>().unwrap(), Level::High);
        assert_eq!(
            "downclocking".parse::<SimplifyMode>().unwrap(),
            SimplifyMode::Downclocking
        );
        assert_eq!(
            "interpolate".parse::<GapFillMode>().unwrap(),
            GapFillMode::Interpolate
        );

        assert!(matches!(
            "extreme".parse::<Level>(),
            Err(TrajError::Validation { .. })
        ));
        assert!(matches!(
            "sliding_window".parse::<SimplifyMode>(),
            Err(TrajError::Validation { .. })
        ));
        assert!(matches!(
            "teleport".parse::<GapFillMode>(),
            Err(TrajError::Validation { .. })
        ));
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        for mode in [
            SimplifyMode::IntervalOriented,
            SimplifyMode::Downclocking,
            SimplifyMode::Rdp,
        ] {
            assert_eq!(mode.to_string().parse::<SimplifyMode>().unwrap(), mode);
        }
    }

    #[test]
    fn test_empty_json_uses_defaults() {
        let config = PipelineConfig::from_json_str("{}").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.coord_type, CoordinateSystem::Wgs84);
        assert_eq!(config.gap_fill.mode, GapFillMode::RoutePlan);
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let result = PipelineConfig::from_json_str(r#"{"other_params": {"profile": "driving-hgv"}}"#);
        assert!(matches!(result, Err(TrajError::Config { .. })));

        let result = PipelineConfig::from_json_str(r#"{"coord_type": "epsg4326"}"#);
        assert!(matches!(result, Err(TrajError::Config { .. })));
    }

    #[test]
    fn test_invalid_numbers_rejected() {
        let result = PipelineConfig::from_json_str(
            r#"{"gap_fill": {"lower_km": 60.0, "upper_km": 50.0}}"#,
        );
        assert!(matches!(result, Err(TrajError::Validation { .. })));
    }
}
