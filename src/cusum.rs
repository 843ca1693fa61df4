//! One-sided (lower) CUSUM change-point detector
//!
//! Accumulates evidence of sustained decline in a normalized sequence:
//!
//! ```text
//! S[0] = 0
//! S[i] = min(0, S[i-1] + (x[i] - x[i-1] - k))
//! ```
//!
//! The statistic only depends on local differences and the slack `k`, never
//! on the absolute level. The change point is the first index at which the
//! trace reaches its minimum.

use crate::error::{FlattenError, Result};
use serde::{Deserialize, Serialize};

/// CUSUM trace plus its minimum and change point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CusumTrace {
    /// Trace values, one per input position, all `<= 0`
    pub values: Vec<f64>,

    /// Smallest trace value
    pub min_value: f64,

    /// Index of the first occurrence of `min_value`
    pub change_point: usize,
}

impl CusumTrace {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Compute the lower CUSUM trace of `series` with slack `k`
pub fn lower_cusum(series: &[f64], k: f64) -> Vec<f64> {
    let mut trace = Vec::with_capacity(series.len());
    if series.is_empty() {
        return trace;
    }

    trace.push(0.0);
    for window in series.windows(2) {
        let diff = window[1] - window[0];
        let previous = trace[trace.len() - 1];
        trace.push((previous + (diff - k)).min(0.0));
    }
    trace
}

/// Index and value of the first minimum (leftmost on ties)
pub fn first_minimum(values: &[f64]) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in values.iter().enumerate() {
        match best {
            Some((_, current)) if v >= current => {}
            _ => best = Some((i, v)),
        }
    }
    best
}

/// Run the detector over a normalized sequence
///
/// # Example
/// ```
/// use cusum_flatten::cusum::detect;
///
/// let trace = detect(&[0.0, 0.0, -50.0, -50.0], 0.0).unwrap();
/// assert_eq!(trace.values, vec![0.0, 0.0, -50.0, -50.0]);
/// assert_eq!(trace.min_value, -50.0);
/// assert_eq!(trace.change_point, 2);
/// ```
pub fn detect(normalized: &[f64], k: f64) -> Result<CusumTrace> {
    if !k.is_finite() {
        return Err(FlattenError::InvalidConfig(format!(
            "slack k must be finite, got {}",
            k
        )));
    }

    let values = lower_cusum(normalized, k);
    let (change_point, min_value) =
        first_minimum(&values).ok_or(FlattenError::InsufficientData {
            required: 1,
            actual: 0,
        })?;

    tracing::trace!(change_point, min_value, k, "cusum computed");

    Ok(CusumTrace {
        values,
        min_value,
        change_point,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worked_example() {
        let trace = detect(&[0.0, 0.0, -50.0, -50.0], 0.0).unwrap();
        assert_eq!(trace.values, vec![0.0, 0.0, -50.0, -50.0]);
        assert_eq!(trace.min_value, -50.0);
        assert_eq!(trace.change_point, 2);
    }

    #[test]
    fn test_rising_sequence_stays_at_zero() {
        let trace = detect(&[1.0, 2.0, 4.0, 8.0], 0.0).unwrap();
        assert_eq!(trace.values, vec![0.0; 4]);
        assert_eq!(trace.min_value, 0.0);
        assert_eq!(trace.change_point, 0);
    }

    #[test]
    fn test_recovery_clamps_to_zero() {
        // Drop of 10, then a rise of 30 resets to 0, then drop of 5
        let trace = detect(&[20.0, 10.0, 40.0, 35.0], 0.0).unwrap();
        assert_eq!(trace.values, vec![0.0, -10.0, 0.0, -5.0]);
        assert_eq!(trace.change_point, 1);
    }

    #[test]
    fn test_slack_applied_every_step() {
        // Flat input with k = 2 accumulates -2 per step
        let trace = detect(&[5.0, 5.0, 5.0, 5.0], 2.0).unwrap();
        assert_eq!(trace.values, vec![0.0, -2.0, -4.0, -6.0]);
        assert_eq!(trace.change_point, 3);
    }

    #[test]
    fn test_negative_slack_absorbs_small_declines() {
        let trace = detect(&[10.0, 9.0, 8.0], -1.0).unwrap();
        assert_eq!(trace.values, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_tie_resolves_leftmost() {
        assert_eq!(first_minimum(&[0.0, -3.0, -1.0, -3.0]), Some((1, -3.0)));
    }

    #[test]
    fn test_single_value() {
        let trace = detect(&[42.0], 0.0).unwrap();
        assert_eq!(trace.values, vec![0.0]);
        assert_eq!(trace.change_point, 0);
    }

    #[test]
    fn test_empty_input_is_error() {
        assert!(matches!(
            detect(&[], 0.0),
            Err(FlattenError::InsufficientData { .. })
        ));
    }

    #[test]
    fn test_non_finite_slack_is_error() {
        assert!(detect(&[1.0, 2.0], f64::NAN).is_err());
    }
}
