//! Error type shared by the tracker, the extrapolator and the integration layer.

use thiserror::Error;

/// Errors raised at the boundaries of the tracking core.
///
/// A track failing to associate is not an error; it is handled through the
/// missed-frame counters.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrackError {
    /// Malformed frame, non-finite coordinate or invalid time step.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Wrong number of coordinates or axes.
    #[error("invalid dimension: expected {expected}, got {got}")]
    InvalidDimension { expected: usize, got: usize },

    /// History access outside `[0, len)`.
    #[error("index {index} out of range for history of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    /// Not enough samples to fit the extrapolation windows.
    #[error("insufficient samples: need at least {required}, got {got}")]
    InsufficientSamples { required: usize, got: usize },

    /// The track has fewer than two samples, so its filter has no estimate yet.
    #[error("filter is not initialized")]
    FilterNotReady,

    /// Covariance could not be factorized or the innovation covariance inverted.
    #[error("degenerate covariance in unscented transform")]
    DegenerateCovariance,

    /// Configuration rejected by validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, TrackError>;

/// Checks that a time step is finite and non-negative.
pub(crate) fn validate_dt(dt: f64) -> Result<()> {
    if dt.is_finite() && dt >= 0.0 {
        Ok(())
    } else {
        Err(TrackError::InvalidInput(format!(
            "dt must be a finite non-negative number, got {dt}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_dt() {
        assert!(validate_dt(0.0).is_ok());
        assert!(validate_dt(0.033).is_ok());
        assert!(matches!(validate_dt(-1.0), Err(TrackError::InvalidInput(_))));
        assert!(matches!(validate_dt(f64::NAN), Err(TrackError::InvalidInput(_))));
        assert!(matches!(
            validate_dt(f64::INFINITY),
            Err(TrackError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_display() {
        let err = TrackError::IndexOutOfRange { index: 4, len: 2 };
        assert_eq!(err.to_string(), "index 4 out of range for history of length 2");
    }
}
