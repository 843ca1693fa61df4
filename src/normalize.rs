//! Signal normalizer
//!
//! Rescales a raw reading sequence into a bounded analysis domain `[0, H]`
//! and smooths it, so curves with very different raw amplitudes produce
//! comparable CUSUM statistics under the same `k` and threshold.
//!
//! The rescaling goes through display coordinates first (larger readings map
//! to smaller y, as on a plot), then inverts around the display maximum. The
//! net effect is `H * (r - min) / range`; `display_coordinates` exposes the
//! intermediate plot mapping.

use crate::error::{validate_readings, FlattenError, Result};
use crate::numeric::centered_moving_average;
use serde::{Deserialize, Serialize};

/// Geometry and smoothing parameters for normalization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeConfig {
    /// Height `H` of the analysis domain (400 px plot minus two 50 px margins)
    pub plot_height: f64,

    /// Display margin added before inversion
    pub margin: f64,

    /// Centered moving-average window
    pub window: usize,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            plot_height: 300.0,
            margin: 50.0,
            window: 5,
        }
    }
}

impl NormalizeConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !(self.plot_height.is_finite() && self.plot_height > 0.0) {
            return Err(FlattenError::InvalidConfig(format!(
                "plot_height must be positive, got {}",
                self.plot_height
            )));
        }
        if !self.margin.is_finite() {
            return Err(FlattenError::InvalidConfig(format!(
                "margin must be finite, got {}",
                self.margin
            )));
        }
        if self.window == 0 {
            return Err(FlattenError::InvalidConfig(
                "smoothing window must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Map readings to display y-coordinates in `[margin, margin + H]`
///
/// The minimum reading lands at the bottom (`margin + H`), the maximum at the
/// top (`margin`). A flat curve uses a denominator of 1.
pub fn display_coordinates(readings: &[f64], config: &NormalizeConfig) -> Vec<f64> {
    let min = readings.iter().copied().fold(f64::INFINITY, f64::min);
    let max = readings.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = if max != min { max - min } else { 1.0 };
    let h = config.plot_height;

    readings
        .iter()
        .map(|r| config.margin + h - (h * (r - min) / range))
        .collect()
}

/// Display coordinates inverted around their own maximum (unsmoothed)
pub fn rescale(readings: &[f64], config: &NormalizeConfig) -> Vec<f64> {
    let display = display_coordinates(readings, config);
    let top = display.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    display.iter().map(|y| top - y).collect()
}

/// Normalize a reading sequence for change-point analysis
///
/// Requires at least two finite readings. Output has the same length as the
/// input and lies in `[0, plot_height]`. Readings whose spread cannot be
/// represented (`max - min` or its scaled value overflows) are rejected with
/// `RangeOverflow`.
///
/// # Example
/// ```
/// use cusum_flatten::normalize::{normalize, NormalizeConfig};
///
/// let normalized = normalize(&[10.0, 10.0, 10.0], &NormalizeConfig::default()).unwrap();
/// assert_eq!(normalized, vec![0.0, 0.0, 0.0]);
/// ```
pub fn normalize(readings: &[f64], config: &NormalizeConfig) -> Result<Vec<f64>> {
    validate_readings(readings, 2)?;
    config.validate()?;

    let min = readings.iter().copied().fold(f64::INFINITY, f64::min);
    let max = readings.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !(max - min).is_finite() {
        return Err(FlattenError::RangeOverflow { min, max });
    }

    let inverted = rescale(readings, config);
    // H * (r - min) can still overflow when the range is near f64::MAX
    if inverted.iter().any(|v| !v.is_finite()) {
        return Err(FlattenError::RangeOverflow { min, max });
    }
    Ok(centered_moving_average(&inverted, config.window))
}
