//! First-difference detector
//!
//! Alternative detection statistic for method comparison: the steepest single
//! step down in the raw readings.

use serde::{Deserialize, Serialize};

/// Steepest decline between two consecutive readings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DerivativeMinimum {
    /// `readings[index] - readings[index - 1]`
    pub value: f64,
    /// Position in the reading sequence where the step lands
    pub index: usize,
}

/// Consecutive differences, one shorter than the input
pub fn derivative(readings: &[f64]) -> Vec<f64> {
    readings.windows(2).map(|w| w[1] - w[0]).collect()
}

/// Smallest consecutive difference, first occurrence on ties
///
/// Returns `None` for fewer than two readings.
pub fn derivative_minimum(readings: &[f64]) -> Option<DerivativeMinimum> {
    let diffs = derivative(readings);
    let (offset, value) = crate::cusum::first_minimum(&diffs)?;
    Some(DerivativeMinimum {
        value,
        index: offset + 1,
    })
}
