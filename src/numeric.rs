//! Shared numeric utilities: descriptive statistics, smoothing and OLS fitting
//!
//! All functions operate on `f64` slices in index order. Statistics use the
//! population convention (divide by `n`), matching how curve noise is scaled.

use crate::error::{FlattenError, Result};

/// Ordinary-least-squares line fitted to a set of points
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    /// Gradient of the fitted line
    pub slope: f64,
    /// Value of the fitted line at x = 0
    pub intercept: f64,
    /// Pearson correlation coefficient (0.0 when y has no variance)
    pub r_value: f64,
}

/// Arithmetic mean, `None` for an empty slice
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation, `None` for an empty slice
pub fn population_std_dev(values: &[f64]) -> Option<f64> {
    let mu = mean(values)?;
    let variance = values.iter().map(|v| (v - mu).powi(2)).sum::<f64>() / values.len() as f64;
    Some(variance.sqrt())
}

/// Centered moving average with a window that shrinks at the boundaries
///
/// For index `i` the window covers `values[i - w/2 ..= i + w/2]`, clipped to
/// the slice. The denominator is the number of points actually covered, so
/// the first and last `w/2` outputs average over fewer points. No padding.
pub fn centered_moving_average(values: &[f64], window: usize) -> Vec<f64> {
    let half = window / 2;
    let n = values.len();

    (0..n)
        .map(|i| {
            let start = i.saturating_sub(half);
            let end = (i + half + 1).min(n);
            let slice = &values[start..end];
            slice.iter().sum::<f64>() / slice.len() as f64
        })
        .collect()
}

/// Fit a least-squares line through `(x, y)` pairs
///
/// Fails when fewer than two points are given or all x values coincide.
pub fn linear_fit(xs: &[f64], ys: &[f64]) -> Result<LinearFit> {
    if xs.len() != ys.len() {
        return Err(FlattenError::DegenerateFit(format!(
            "x has {} values but y has {}",
            xs.len(),
            ys.len()
        )));
    }
    if xs.len() < 2 {
        return Err(FlattenError::DegenerateFit(format!(
            "need at least 2 points, got {}",
            xs.len()
        )));
    }

    let x_mean = mean(xs).unwrap_or(0.0);
    let y_mean = mean(ys).unwrap_or(0.0);

    let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - x_mean;
        let dy = y - y_mean;
        sxx += dx * dx;
        syy += dy * dy;
        sxy += dx * dy;
    }

    if sxx == 0.0 {
        return Err(FlattenError::DegenerateFit(
            "all x values are identical".to_string(),
        ));
    }

    let slope = sxy / sxx;
    let r_value = if syy == 0.0 {
        0.0
    } else {
        (sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0)
    };

    Ok(LinearFit {
        slope,
        intercept: y_mean - slope * x_mean,
        r_value,
    })
}

/// Fit a line through `(i, values[i])` for each index
pub fn linear_fit_indexed(values: &[f64]) -> Result<LinearFit> {
    let xs: Vec<f64> = (0..values.len()).map(|i| i as f64).collect();
    linear_fit(&xs, values)
}
