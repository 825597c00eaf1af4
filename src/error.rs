//! Unified error handling for the explore-tracker library.
//!
//! Every failure in the core is recoverable and local. Variants map to the
//! situations the tracking pipeline can run into: no fix yet, storage
//! trouble, too few points for an area, and location authorization.

use thiserror::Error;

/// Unified error type for tracking operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrackingError {
    /// No location fix has been received yet, so there is no grid origin.
    #[error("No location fix available yet")]
    LocationUnavailable,
    /// A durable append failed; in-memory state is kept.
    #[error("Persistence write failed: {message}")]
    PersistenceWriteFailed { message: String },
    /// Reading persisted rows failed.
    #[error("Persistence read failed: {message}")]
    PersistenceReadFailed { message: String },
    /// Too few distinct, non-collinear points to bound an area.
    /// `point_count` is the number of hull vertices that could be formed.
    #[error("Hull needs {minimum_required} non-collinear points, have {point_count}")]
    InsufficientHullPoints {
        point_count: usize,
        minimum_required: usize,
    },
    /// The user denied location access.
    #[error("Location access denied")]
    AuthorizationDenied,
    /// Location access is restricted on this device.
    #[error("Location access restricted")]
    AuthorizationRestricted,
    /// The user has not answered the location prompt yet.
    #[error("Location authorization not determined")]
    AuthorizationNotDetermined,
    /// A fix with out-of-range or non-finite coordinates.
    #[error("Invalid coordinates ({latitude}, {longitude})")]
    InvalidCoordinates { latitude: f64, longitude: f64 },
    /// A viewport request covers more grid cells than the configured limit.
    #[error("Viewport covers {cell_count} cells, limit is {limit}")]
    ViewportTooLarge { cell_count: u64, limit: usize },
    /// Configuration error
    #[error("Configuration error: {message}")]
    ConfigError { message: String },
    /// Generic internal error
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl TrackingError {
    pub(crate) fn write_failed(err: impl std::fmt::Display) -> Self {
        TrackingError::PersistenceWriteFailed {
            message: err.to_string(),
        }
    }

    pub(crate) fn read_failed(err: impl std::fmt::Display) -> Self {
        TrackingError::PersistenceReadFailed {
            message: err.to_string(),
        }
    }
}

/// Result type alias for tracking operations.
pub type Result<T> = std::result::Result<T, TrackingError>;

/// Extension trait for converting Option to TrackingError.
pub trait OptionExt<T> {
    /// Convert Option to Result with a location-unavailable error.
    fn ok_or_location_unavailable(self) -> Result<T>;

    /// Convert Option to Result with generic internal error.
    fn ok_or_internal(self, message: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_location_unavailable(self) -> Result<T> {
        self.ok_or(TrackingError::LocationUnavailable)
    }

    fn ok_or_internal(self, message: &str) -> Result<T> {
        self.ok_or_else(|| TrackingError::Internal {
            message: message.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TrackingError::InsufficientHullPoints {
            point_count: 2,
            minimum_required: 3,
        };
        assert!(err.to_string().contains("3 non-collinear points"));
        assert!(err.to_string().contains("have 2"));

        let err = TrackingError::write_failed("disk full");
        assert_eq!(err.to_string(), "Persistence write failed: disk full");
    }

    #[test]
    fn test_option_ext() {
        let none: Option<i32> = None;
        assert_eq!(
            none.ok_or_location_unavailable(),
            Err(TrackingError::LocationUnavailable)
        );
        assert!(matches!(
            None::<i32>.ok_or_internal("missing"),
            Err(TrackingError::Internal { .. })
        ));
        assert_eq!(Some(4).ok_or_location_unavailable(), Ok(4));
    }
}
