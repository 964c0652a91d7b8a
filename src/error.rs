use thiserror::Error;

/// Errors produced by camera transforms and calibration.
#[derive(Debug, Error)]
pub enum CameraError {
    /// A physical or pose quantity was outside of its valid range.
    #[error("invalid {name}: {value} ({reason})")]
    InvalidParameter {
        /// Name of the offending quantity.
        name: &'static str,
        /// The rejected value.
        value: f64,
        /// What the value must satisfy.
        reason: &'static str,
    },

    /// Back-projection needs exactly one of X, Y or Z to be fixed.
    #[error("exactly one of X, Y, Z has to be fixed, got {0}")]
    FixedAxis(usize),

    /// Two parallel input sequences have different lengths.
    #[error("mismatched lengths: {left_name} ({left_len}) != {right_name} ({right_len})")]
    MismatchedLengths {
        /// Label of the first sequence.
        left_name: &'static str,
        /// Length of the first sequence.
        left_len: usize,
        /// Label of the second sequence.
        right_name: &'static str,
        /// Length of the second sequence.
        right_len: usize,
    },

    /// Not enough observations were supplied for the requested operation.
    #[error("{operation} requires at least {required} observations, got {actual}")]
    InsufficientObservations {
        /// Operation that rejected the input.
        operation: &'static str,
        /// Minimum number of observations.
        required: usize,
        /// Number of observations supplied.
        actual: usize,
    },

    /// The reduced projection system has no unique solution, which happens when
    /// the viewing ray is parallel to the fixed plane.
    #[error("singular projection system while solving for {0}")]
    Singular(&'static str),

    /// A GPS transform was requested before the camera position was anchored.
    #[error("the camera has no geographic anchor, call set_geo_anchor first")]
    MissingGeoAnchor,

    /// A degree format template could not be used.
    #[error("invalid format string {format:?}: {reason}")]
    InvalidFormat {
        /// The rejected template.
        format: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// The minimizer aborted.
    #[error("optimization failed: {0}")]
    Optimization(String),

    /// Reading or writing persisted state failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Persisted state could not be encoded or decoded.
    #[cfg(feature = "serde-serialize")]
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl CameraError {
    pub(crate) fn ensure_positive(name: &'static str, value: f64) -> Result<f64, Self> {
        if value.is_finite() && value > 0.0 {
            Ok(value)
        } else {
            Err(Self::InvalidParameter {
                name,
                value,
                reason: "must be finite and positive",
            })
        }
    }

    pub(crate) fn ensure_finite(name: &'static str, value: f64) -> Result<f64, Self> {
        if value.is_finite() {
            Ok(value)
        } else {
            Err(Self::InvalidParameter {
                name,
                value,
                reason: "must be finite",
            })
        }
    }

    pub(crate) fn ensure_same_len(
        left_name: &'static str,
        left_len: usize,
        right_name: &'static str,
        right_len: usize,
    ) -> Result<(), Self> {
        if left_len == right_len {
            Ok(())
        } else {
            Err(Self::MismatchedLengths {
                left_name,
                left_len,
                right_name,
                right_len,
            })
        }
    }

    pub(crate) fn ensure_at_least(
        operation: &'static str,
        required: usize,
        actual: usize,
    ) -> Result<(), Self> {
        if actual >= required {
            Ok(())
        } else {
            Err(Self::InsufficientObservations {
                operation,
                required,
                actual,
            })
        }
    }
}
