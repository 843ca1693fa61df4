// Configuration for detection, decision and correction
//
// One struct carries every tuning knob so a run can be reproduced from a
// single TOML file. CLI flags override individual fields.

use crate::decision::sanity::{SanityCheck, SanityChecks};
use crate::error::{FlattenError, Result};
use crate::normalize::NormalizeConfig;
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// CUSUM minimum at or below this value indicates a real artifact
pub const DEFAULT_THRESHOLD: f64 = -80.0;

/// Jitter amplitude as a fraction of the curve's standard deviation
pub const DEFAULT_NOISE_FRACTION: f64 = 0.001;

/// Records with fewer readings are skipped by batch callers
pub const DEFAULT_MIN_READINGS: usize = 10;

/// Configuration for curve flattening
///
/// # Example
/// ```
/// use cusum_flatten::decision::FlattenConfig;
///
/// let config = FlattenConfig::default();
/// assert_eq!(config.threshold, -80.0);
/// assert_eq!(config.k, 0.0);
/// assert!(config.sanity_checks.is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlattenConfig {
    /// CUSUM slack, subtracted from every normalized step
    ///
    /// The effect of increasing `k` on how many curves get flattened is not
    /// assumed to be monotonic; use `cusum-flatten compare` to measure it on
    /// real data before changing it.
    pub k: f64,

    /// Flatten only when the CUSUM minimum is `<=` this value
    pub threshold: f64,

    /// Plausibility checks that must all pass before correction
    pub sanity_checks: SanityChecks,

    /// Jitter amplitude relative to the population standard deviation
    pub noise_fraction: f64,

    /// Minimum sequence length accepted by batch callers
    pub min_readings: usize,

    /// Normalizer geometry
    pub normalize: NormalizeConfig,
}

impl Default for FlattenConfig {
    fn default() -> Self {
        Self {
            k: 0.0,
            threshold: DEFAULT_THRESHOLD,
            sanity_checks: SanityChecks::none(),
            noise_fraction: DEFAULT_NOISE_FRACTION,
            min_readings: DEFAULT_MIN_READINGS,
            normalize: NormalizeConfig::default(),
        }
    }
}

impl FlattenConfig {
    /// Both plausibility checks enabled (fewer corrections, fewer false flattenings)
    pub fn strict() -> Self {
        Self {
            sanity_checks: SanityChecks::all(),
            ..Self::default()
        }
    }

    /// No checks and the shallow negative-slope threshold (-10)
    pub fn permissive() -> Self {
        Self {
            threshold: -10.0,
            sanity_checks: SanityChecks::none(),
            ..Self::default()
        }
    }

    /// Enable a single plausibility check
    pub fn with_check(mut self, check: SanityCheck) -> Self {
        self.sanity_checks.insert(check);
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !self.k.is_finite() || self.k < 0.0 {
            return Err(FlattenError::InvalidConfig(format!(
                "k must be a non-negative finite number, got {}",
                self.k
            )));
        }

        if !self.threshold.is_finite() {
            return Err(FlattenError::InvalidConfig(format!(
                "threshold must be finite, got {}",
                self.threshold
            )));
        }

        if !self.noise_fraction.is_finite() || self.noise_fraction < 0.0 {
            return Err(FlattenError::InvalidConfig(format!(
                "noise_fraction must be non-negative, got {}",
                self.noise_fraction
            )));
        }

        if self.min_readings < 2 {
            return Err(FlattenError::InvalidConfig(format!(
                "min_readings must be >= 2, got {}",
                self.min_readings
            )));
        }

        self.normalize.validate()
    }

    /// Load configuration from a TOML file
    ///
    /// Missing keys take their default values.
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();

        if !path_ref.exists() {
            bail!("Config file not found: {}", path_ref.display());
        }

        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("Failed to read config file {}", path_ref.display()))?;

        let config: FlattenConfig = toml::from_str(&contents).context("Invalid config TOML")?;
        config
            .validate()
            .with_context(|| format!("Invalid config in {}", path_ref.display()))?;

        Ok(config)
    }
}
