//! Corrector: flattens a curve's leading segment up to an accepted change point
//!
//! Positions before the change point become `readings[cp] + jitter`, with
//! jitter drawn uniformly from `[-s, s]`, `s = noise_fraction * stddev`.
//!
//! All randomness comes from the caller's generator: the same seed produces
//! the same corrected curve.

use crate::decision::DEFAULT_NOISE_FRACTION;
use crate::error::{validate_readings, FlattenError, Result};
use crate::numeric::population_std_dev;
use rand::Rng;

/// Jitter half-width for a curve
pub fn noise_scale(readings: &[f64], noise_fraction: f64) -> f64 {
    population_std_dev(readings).unwrap_or(0.0) * noise_fraction
}

fn jitter<R: Rng>(rng: &mut R, scale: f64) -> f64 {
    if scale.is_finite() && scale > 0.0 {
        rng.gen_range(-scale..=scale)
    } else {
        0.0
    }
}

fn check_change_point(readings: &[f64], change_point: usize) -> Result<()> {
    if change_point >= readings.len() {
        return Err(FlattenError::ChangePointOutOfBounds {
            index: change_point,
            len: readings.len(),
        });
    }
    Ok(())
}

/// Flatten with the default noise fraction (0.1% of the standard deviation)
pub fn correct<R: Rng>(
    readings: &[f64],
    change_point: usize,
    rng: &mut R,
) -> Result<Vec<f64>> {
    correct_with_noise(readings, change_point, DEFAULT_NOISE_FRACTION, rng)
}

/// Flatten the leading segment, returning a new sequence
///
/// The input is never modified. Output length always equals input length and
/// `output[change_point..] == readings[change_point..]`.
///
/// # Example
/// ```
/// use cusum_flatten::correct::correct_with_noise;
/// use rand::rngs::StdRng;
/// use rand::SeedableRng;
///
/// let readings = [9.0, 7.0, 4.0, 4.5, 6.0];
/// let mut rng = StdRng::seed_from_u64(7);
/// let corrected = correct_with_noise(&readings, 2, 0.0, &mut rng).unwrap();
/// assert_eq!(corrected, vec![4.0, 4.0, 4.0, 4.5, 6.0]);
/// ```
pub fn correct_with_noise<R: Rng>(
    readings: &[f64],
    change_point: usize,
    noise_fraction: f64,
    rng: &mut R,
) -> Result<Vec<f64>> {
    validate_readings(readings, 1)?;
    check_change_point(readings, change_point)?;

    let scale = noise_scale(readings, noise_fraction);
    let target = readings[change_point];

    let mut corrected = readings.to_vec();
    for value in corrected.iter_mut().take(change_point) {
        *value = target + jitter(rng, scale);
    }

    Ok(corrected)
}

/// Replacement for the record's scalar result value after flattening
///
/// The reading just before the change point, with the same jitter. Draw it
/// after `correct_with_noise` on the same generator to reproduce a full
/// record update.
pub fn replacement_result<R: Rng>(
    readings: &[f64],
    change_point: usize,
    noise_fraction: f64,
    rng: &mut R,
) -> Result<f64> {
    validate_readings(readings, 1)?;
    check_change_point(readings, change_point)?;

    let scale = noise_scale(readings, noise_fraction);
    Ok(readings[change_point.saturating_sub(1)] + jitter(rng, scale))
}
