//! Unified error handling for the traj-refiner library.
//!
//! Every public operation returns [`Result`]. Degenerate geometry (coincident
//! points, zero-length chords) is never an error: the geometry helpers return
//! zero distances or heights instead.

use thiserror::Error;

/// Unified error type for trajectory processing.
#[derive(Debug, Clone, Error)]
pub enum TrajError {
    /// Malformed input or unsupported identifier, raised before processing
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// A per-point field required by the operation is absent
    #[error("Point {index} is missing required field '{field}'")]
    MissingField { field: &'static str, index: usize },

    /// Trajectory has too few points for processing
    #[error("Trajectory has {point_count} points, minimum {minimum_required} required")]
    InsufficientPoints {
        point_count: usize,
        minimum_required: usize,
    },

    /// Point has non-finite or out-of-range coordinates
    #[error("Point {index} has invalid coordinates: {message}")]
    InvalidCoordinates { index: usize, message: String },

    /// Route-acquisition collaborator failed
    #[error("Route planner '{planner}' failed: {message}")]
    Collaborator { planner: String, message: String },

    /// Configuration could not be loaded
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl TrajError {
    /// Shorthand for a [`TrajError::Validation`] error.
    pub fn validation(message: impl Into<String>) -> Self {
        TrajError::Validation {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for TrajError {
    fn from(err: serde_json::Error) -> Self {
        TrajError::Config {
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for TrajError {
    fn from(err: std::io::Error) -> Self {
        TrajError::Config {
            message: err.to_string(),
        }
    }
}

/// Result type alias for trajectory operations.
pub type Result<T> = std::result::Result<T, TrajError>;

/// Extension trait for converting Option to TrajError.
pub trait OptionExt<T> {
    /// Convert Option to Result with a missing-field error.
    fn ok_or_missing(self, field: &'static str, index: usize) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_missing(self, field: &'static str, index: usize) -> Result<T> {
        self.ok_or(TrajError::MissingField { field, index })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TrajError::InsufficientPoints {
            point_count: 1,
            minimum_required: 2,
        };
        assert!(err.to_string().contains("1 points"));
        assert!(err.to_string().contains("minimum 2"));

        let err = TrajError::MissingField {
            field: "timestamp",
            index: 7,
        };
        assert!(err.to_string().contains("timestamp"));
        assert!(err.to_string().contains('7'));
    }

    #[test]
    fn test_option_ext() {
        let none: Option<i64> = None;
        let result = none.ok_or_missing("timestamp", 3);
        assert!(matches!(
            result,
            Err(TrajError::MissingField {
                field: "timestamp",
                index: 3
            })
        ));

        assert_eq!(Some(5).ok_or_missing("speed", 0).unwrap(), 5);
    }

    #[test]
    fn test_json_error_maps_to_config() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        assert!(matches!(TrajError::from(err), TrajError::Config { .. }));
    }
}
