//! Error types for the detection and correction engine
//!
//! Flat curves and sanity-check rejections are decision outcomes, not errors.
//! Everything here is a caller precondition violation.

use thiserror::Error;

/// Errors raised by the engine
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FlattenError {
    #[error("Insufficient data: need at least {required} readings, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    #[error("Reading {index} is not a finite number ({value})")]
    NonFiniteReading { index: usize, value: f64 },

    #[error("Reading range overflows f64 (min {min}, max {max})")]
    RangeOverflow { min: f64, max: f64 },

    #[error("Sequence length mismatch: {readings} readings but {trace} CUSUM values")]
    LengthMismatch { readings: usize, trace: usize },

    #[error("Change point {index} is out of bounds for {len} readings")]
    ChangePointOutOfBounds { index: usize, len: usize },

    #[error("Degenerate linear fit: {0}")]
    DegenerateFit(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, FlattenError>;

/// Reject sequences that are too short or contain NaN/infinite values
pub fn validate_readings(readings: &[f64], required: usize) -> Result<()> {
    if readings.len() < required {
        return Err(FlattenError::InsufficientData {
            required,
            actual: readings.len(),
        });
    }

    if let Some((index, &value)) = readings.iter().enumerate().find(|(_, v)| !v.is_finite()) {
        return Err(FlattenError::NonFiniteReading { index, value });
    }

    Ok(())
}
