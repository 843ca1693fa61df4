// Correction verdict from a CUSUM trace, a threshold and a set of checks
//
// `decide` never touches the readings beyond reading them, so inspection
// callers can ask "would this curve be flattened?" without producing any
// corrected data.

use crate::cusum::CusumTrace;
use crate::decision::sanity::{CheckEvidence, CheckResult, SanityCheck, SanityChecks};
use crate::error::{FlattenError, Result};
use serde::{Deserialize, Serialize};

/// Why no correction is needed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotNeededReason {
    /// CUSUM minimum above the threshold
    AboveThreshold,
    /// Change point at index 0 or 1, no leading segment to flatten
    ChangePointTooEarly,
}

/// Tri-state correction outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Verdict {
    /// No sustained decline worth correcting
    NotNeeded { reason: NotNeededReason },

    /// Decline detected but a plausibility check failed
    Rejected {
        /// First failing check in evaluation order
        failed: SanityCheck,
    },

    /// Correction should be applied
    Accepted,
}

impl Verdict {
    /// Stable label for text and CSV output
    pub fn label(&self) -> &'static str {
        match self {
            Verdict::NotNeeded { .. } => "not_needed",
            Verdict::Rejected { .. } => "rejected",
            Verdict::Accepted => "accepted",
        }
    }
}

/// Correction decision with its evidence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub verdict: Verdict,

    /// Index of the first CUSUM minimum, valid in the raw reading sequence
    pub change_point: usize,

    /// Smallest CUSUM value
    pub cusum_min: f64,

    /// Threshold the minimum was compared against
    pub threshold: f64,

    /// Results of every enabled check (empty when a check was never reached)
    pub checks: Vec<CheckResult>,
}

impl Decision {
    pub fn is_accepted(&self) -> bool {
        self.verdict == Verdict::Accepted
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self.verdict, Verdict::Rejected { .. })
    }

    /// Generate human-readable report
    pub fn to_report_string(&self) -> String {
        let mut report = String::new();

        match &self.verdict {
            Verdict::Accepted => {
                report.push_str("FLATTEN: correction accepted\n");
            }
            Verdict::NotNeeded {
                reason: NotNeededReason::AboveThreshold,
            } => {
                report.push_str("NO CORRECTION: CUSUM minimum above threshold\n");
            }
            Verdict::NotNeeded {
                reason: NotNeededReason::ChangePointTooEarly,
            } => {
                report.push_str("NO CORRECTION: change point too early\n");
            }
            Verdict::Rejected { failed } => {
                report.push_str(&format!(
                    "REJECTED: {} sanity check failed\n",
                    failed.label()
                ));
            }
        }

        report.push_str(&format!(
            "CUSUM minimum: {:.3} (threshold {:.3})\n",
            self.cusum_min, self.threshold
        ));
        report.push_str(&format!("Change point: cycle {}\n", self.change_point));

        for result in &self.checks {
            let status = if result.passed { "pass" } else { "fail" };
            match result.evidence {
                CheckEvidence::AverageComparison {
                    target, baseline, ..
                } => {
                    report.push_str(&format!(
                        "  average: {} (target={:.3}, baseline={:.3})\n",
                        status, target, baseline
                    ));
                }
                CheckEvidence::LineOfBestFit { slope, .. } => {
                    report.push_str(&format!("  lob: {} (slope={:.4})\n", status, slope));
                }
            }
        }

        report
    }
}

/// Decide whether a curve should be flattened
///
/// `readings` are the raw readings; `trace` was computed on their normalized
/// form and must have the same length. Checks only run once the threshold
/// test and the early-change-point guard have both passed.
///
/// # Example
/// ```
/// use cusum_flatten::cusum::detect;
/// use cusum_flatten::decision::{decide, SanityChecks, Verdict};
///
/// let readings = [0.0, 0.0, -50.0, -50.0];
/// let trace = detect(&readings, 0.0).unwrap();
/// let decision = decide(&readings, &trace, -40.0, &SanityChecks::none()).unwrap();
/// assert_eq!(decision.verdict, Verdict::Accepted);
/// assert_eq!(decision.change_point, 2);
/// ```
pub fn decide(
    readings: &[f64],
    trace: &CusumTrace,
    threshold: f64,
    checks: &SanityChecks,
) -> Result<Decision> {
    if readings.len() != trace.len() {
        return Err(FlattenError::LengthMismatch {
            readings: readings.len(),
            trace: trace.len(),
        });
    }
    if trace.change_point >= readings.len() {
        return Err(FlattenError::ChangePointOutOfBounds {
            index: trace.change_point,
            len: readings.len(),
        });
    }

    let decision = |verdict, checks| Decision {
        verdict,
        change_point: trace.change_point,
        cusum_min: trace.min_value,
        threshold,
        checks,
    };

    // Step 1: threshold test
    if trace.min_value > threshold {
        return Ok(decision(
            Verdict::NotNeeded {
                reason: NotNeededReason::AboveThreshold,
            },
            Vec::new(),
        ));
    }

    // Step 2: nothing to flatten before index 2
    if trace.change_point <= 1 {
        return Ok(decision(
            Verdict::NotNeeded {
                reason: NotNeededReason::ChangePointTooEarly,
            },
            Vec::new(),
        ));
    }

    // Step 3: plausibility checks
    let results = checks.evaluate(readings, trace.change_point)?;
    let verdict = match results.iter().find(|r| !r.passed) {
        Some(failed) => {
            tracing::debug!(
                check = failed.check.label(),
                change_point = trace.change_point,
                "sanity check rejected correction"
            );
            Verdict::Rejected {
                failed: failed.check,
            }
        }
        None => Verdict::Accepted,
    };

    Ok(decision(verdict, results))
}
