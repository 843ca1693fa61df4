//! Engine composition: Normalizer -> CUSUM -> Decision -> (Corrector)
//!
//! `analyze` stops after the decision and is what inspection callers use.
//! `flatten` additionally produces corrected readings for accepted curves.
//! The change point found on the normalized sequence indexes straight into
//! the raw readings; both sequences always have the same length.

use crate::correct::{correct_with_noise, replacement_result};
use crate::cusum::{detect, CusumTrace};
use crate::decision::{decide, Decision, FlattenConfig};
use crate::error::{validate_readings, Result};
use crate::normalize::normalize;
use rand::Rng;
use serde::Serialize;

/// Everything computed for one curve up to the decision
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurveAnalysis {
    /// Normalized, smoothed sequence the CUSUM ran on
    pub normalized: Vec<f64>,
    /// CUSUM trace over `normalized`
    pub trace: CusumTrace,
    /// Correction decision
    pub decision: Decision,
}

/// Analysis plus corrected data when the decision was accepted
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlattenOutcome {
    pub analysis: CurveAnalysis,
    /// Flattened readings (accepted decisions only)
    pub corrected: Option<Vec<f64>>,
    /// Replacement scalar result value (accepted decisions only)
    pub replacement_result: Option<f64>,
}

impl FlattenOutcome {
    pub fn is_corrected(&self) -> bool {
        self.corrected.is_some()
    }

    /// Corrected readings if any, otherwise the originals
    pub fn final_readings<'a>(&'a self, original: &'a [f64]) -> &'a [f64] {
        self.corrected.as_deref().unwrap_or(original)
    }
}

/// Run the decision-only pipeline
///
/// # Example
/// ```
/// use cusum_flatten::decision::{FlattenConfig, Verdict};
/// use cusum_flatten::pipeline::analyze;
///
/// let rising = [100.0, 101.0, 103.0, 108.0, 120.0, 150.0, 210.0, 320.0, 480.0, 600.0];
/// let analysis = analyze(&rising, &FlattenConfig::default()).unwrap();
/// assert!(!analysis.decision.is_accepted());
/// assert!(matches!(analysis.decision.verdict, Verdict::NotNeeded { .. }));
/// ```
pub fn analyze(readings: &[f64], config: &FlattenConfig) -> Result<CurveAnalysis> {
    validate_readings(readings, 2)?;
    config.validate()?;

    let normalized = normalize(readings, &config.normalize)?;
    let trace = detect(&normalized, config.k)?;
    let decision = decide(readings, &trace, config.threshold, &config.sanity_checks)?;

    Ok(CurveAnalysis {
        normalized,
        trace,
        decision,
    })
}

/// Run the full pipeline, correcting the curve when the decision is accepted
pub fn flatten<R: Rng>(
    readings: &[f64],
    config: &FlattenConfig,
    rng: &mut R,
) -> Result<FlattenOutcome> {
    let analysis = analyze(readings, config)?;

    if !analysis.decision.is_accepted() {
        return Ok(FlattenOutcome {
            analysis,
            corrected: None,
            replacement_result: None,
        });
    }

    let change_point = analysis.decision.change_point;
    let corrected = correct_with_noise(readings, change_point, config.noise_fraction, rng)?;
    let result = replacement_result(readings, change_point, config.noise_fraction, rng)?;

    Ok(FlattenOutcome {
        analysis,
        corrected: Some(corrected),
        replacement_result: Some(result),
    })
}
