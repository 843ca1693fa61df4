//! JSON output format for batch and comparison results
//!
//! `--format json`: `{ version, format, mode, summary, records: [...] }`

use crate::batch::{BatchReport, BatchSummary, Mode, RecordOutcome, RecordResult};
use crate::compare::{CompareSummary, Comparison, ComparisonReport, Method};
use crate::decision::{CheckEvidence, CheckResult, NotNeededReason, Verdict};
use serde::Serialize;

const FORMAT: &str = "cusum-flatten-json-v1";

/// Outcome of one sanity check
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonCheck {
    /// Check label ("average" or "lob")
    pub check: String,
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slope: Option<f64>,
}

impl From<&CheckResult> for JsonCheck {
    fn from(result: &CheckResult) -> Self {
        let mut check = JsonCheck {
            check: result.check.label().to_string(),
            passed: result.passed,
            target: None,
            baseline: None,
            slope: None,
        };
        match result.evidence {
            CheckEvidence::AverageComparison {
                target, baseline, ..
            } => {
                check.target = Some(target);
                check.baseline = Some(baseline);
            }
            CheckEvidence::LineOfBestFit { slope, .. } => check.slope = Some(slope),
        }
        check
    }
}

/// One record in the JSON output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonRecord {
    pub id: u64,
    /// accepted, not_needed, rejected, negative_slope, no_negative_slope,
    /// skipped or failed
    pub outcome: String,
    /// Why no correction was needed, or why the record was skipped or failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// First failing sanity check
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_check: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cusum_min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_point: Option<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub checks: Vec<JsonCheck>,
    /// Original readings
    pub readings: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub corrected: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replacement_result: Option<f64>,
    /// Full CUSUM trace (cusum mode)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cusum: Option<Vec<f64>>,
}

impl From<&RecordResult> for JsonRecord {
    fn from(result: &RecordResult) -> Self {
        let mut record = JsonRecord {
            id: result.record.id,
            outcome: result.outcome.label().to_string(),
            reason: None,
            failed_check: None,
            cusum_min: result.outcome.cusum_min(),
            change_point: None,
            checks: Vec::new(),
            readings: result.record.readings.clone(),
            corrected: None,
            results: result.record.results,
            replacement_result: None,
            cusum: None,
        };

        match &result.outcome {
            RecordOutcome::Analyzed(outcome) => {
                let decision = &outcome.analysis.decision;
                record.change_point = Some(decision.change_point);
                record.checks = decision.checks.iter().map(JsonCheck::from).collect();
                match decision.verdict {
                    Verdict::NotNeeded { reason } => {
                        record.reason = Some(
                            match reason {
                                NotNeededReason::AboveThreshold => "above_threshold",
                                NotNeededReason::ChangePointTooEarly => "change_point_too_early",
                            }
                            .to_string(),
                        );
                    }
                    Verdict::Rejected { failed } => {
                        record.failed_check = Some(failed.label().to_string());
                    }
                    Verdict::Accepted => {}
                }
                record.corrected = outcome.corrected.clone();
                record.replacement_result = outcome.replacement_result;
            }
            RecordOutcome::Cusum(summary) => {
                record.change_point = Some(summary.trace.change_point);
                record.cusum = Some(summary.trace.values.clone());
            }
            RecordOutcome::Skipped { reason } => record.reason = Some(reason.clone()),
            RecordOutcome::Failed { error } => record.reason = Some(error.clone()),
        }

        record
    }
}

/// Root JSON output structure for batch runs
#[derive(Debug, Clone, Serialize)]
pub struct JsonOutput {
    /// Format version identifier
    pub version: String,
    /// Format name
    pub format: String,
    pub mode: Mode,
    pub summary: BatchSummary,
    pub records: Vec<JsonRecord>,
}

impl JsonOutput {
    pub fn from_report(report: &BatchReport) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            format: FORMAT.to_string(),
            mode: report.mode,
            summary: report.summary.clone(),
            records: report.records.iter().map(JsonRecord::from).collect(),
        }
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Root JSON output structure for method comparisons
#[derive(Debug, Clone, Serialize)]
pub struct JsonComparisonOutput {
    pub version: String,
    pub format: String,
    pub default: Method,
    pub test: Method,
    pub summary: CompareSummary,
    pub records: Vec<Comparison>,
}

impl JsonComparisonOutput {
    pub fn from_report(report: &ComparisonReport) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            format: FORMAT.to_string(),
            default: report.default,
            test: report.test,
            summary: report.summary.clone(),
            records: report.records.clone(),
        }
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
