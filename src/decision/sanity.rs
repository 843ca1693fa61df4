// Plausibility checks gating a detected change point
//
// A deep CUSUM minimum alone does not prove the raw curve declined: the
// normalized domain is smoothed and rescaled, and some curves dip and recover
// above their starting level. Each check looks at the raw readings up to the
// change point and passes only when they show a genuine decline.
//
// Checks are modelled as a set so new validators can be added without
// changing `decide`.

use crate::error::{FlattenError, Result};
use crate::numeric::{linear_fit_indexed, mean};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Change points before this index use the two-reading baseline
const SHORT_BASELINE_CUTOFF: usize = 5;

/// A single plausibility check
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum SanityCheck {
    /// Reading at the change point must be below the early-cycle average
    #[value(alias = "average")]
    AverageComparison,
    /// OLS gradient from cycle 0 to the change point must be negative
    #[value(alias = "lob")]
    LineOfBestFit,
}

impl SanityCheck {
    /// Short label used in reports and CSV output
    pub fn label(&self) -> &'static str {
        match self {
            SanityCheck::AverageComparison => "average",
            SanityCheck::LineOfBestFit => "lob",
        }
    }

    /// Evaluate this check against the raw readings
    pub fn evaluate(&self, readings: &[f64], change_point: usize) -> Result<CheckResult> {
        if change_point >= readings.len() {
            return Err(FlattenError::ChangePointOutOfBounds {
                index: change_point,
                len: readings.len(),
            });
        }

        match self {
            SanityCheck::AverageComparison => average_comparison(readings, change_point),
            SanityCheck::LineOfBestFit => line_of_best_fit(readings, change_point),
        }
    }
}

/// Numbers behind a check result, kept for reporting
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "check", rename_all = "kebab-case")]
pub enum CheckEvidence {
    AverageComparison {
        /// Reading at the change point
        target: f64,
        /// Mean of the first two (change point < 5) or first five readings
        baseline: f64,
        /// Number of readings averaged into the baseline
        baseline_len: usize,
    },
    LineOfBestFit {
        slope: f64,
        intercept: f64,
        r_value: f64,
    },
}

/// Outcome of one plausibility check
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub check: SanityCheck,
    pub passed: bool,
    pub evidence: CheckEvidence,
}

fn average_comparison(readings: &[f64], change_point: usize) -> Result<CheckResult> {
    let baseline_len = if change_point < SHORT_BASELINE_CUTOFF {
        2
    } else {
        SHORT_BASELINE_CUTOFF
    };
    let window = &readings[..baseline_len.min(readings.len())];
    let baseline = mean(window).ok_or(FlattenError::InsufficientData {
        required: baseline_len,
        actual: readings.len(),
    })?;
    let target = readings[change_point];

    Ok(CheckResult {
        check: SanityCheck::AverageComparison,
        passed: target < baseline,
        evidence: CheckEvidence::AverageComparison {
            target,
            baseline,
            baseline_len: window.len(),
        },
    })
}

fn line_of_best_fit(readings: &[f64], change_point: usize) -> Result<CheckResult> {
    let fit = linear_fit_indexed(&readings[..=change_point])?;

    Ok(CheckResult {
        check: SanityCheck::LineOfBestFit,
        passed: fit.slope < 0.0,
        evidence: CheckEvidence::LineOfBestFit {
            slope: fit.slope,
            intercept: fit.intercept,
            r_value: fit.r_value,
        },
    })
}

/// Set of enabled plausibility checks, evaluated in a fixed order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SanityChecks(BTreeSet<SanityCheck>);

impl SanityChecks {
    /// No checks: every change point past the guard is accepted
    pub fn none() -> Self {
        Self(BTreeSet::new())
    }

    /// Every available check
    pub fn all() -> Self {
        [SanityCheck::AverageComparison, SanityCheck::LineOfBestFit]
            .into_iter()
            .collect()
    }

    pub fn insert(&mut self, check: SanityCheck) -> bool {
        self.0.insert(check)
    }

    pub fn contains(&self, check: SanityCheck) -> bool {
        self.0.contains(&check)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Checks in evaluation order (average comparison first)
    pub fn iter(&self) -> impl Iterator<Item = SanityCheck> + '_ {
        self.0.iter().copied()
    }

    /// Evaluate every enabled check
    pub fn evaluate(&self, readings: &[f64], change_point: usize) -> Result<Vec<CheckResult>> {
        self.iter()
            .map(|check| check.evaluate(readings, change_point))
            .collect()
    }
}

impl FromIterator<SanityCheck> for SanityChecks {
    fn from_iter<I: IntoIterator<Item = SanityCheck>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
