//! Detection method comparison
//!
//! Runs a default and a test method over the same records and classifies
//! each record by whether the test method gains or loses a flattening. Used
//! to measure the effect of changing `k` (or of switching to the raw
//! derivative statistic) on real data before adopting it.
//!
//! "Flattened" is the threshold test alone (`statistic <= threshold`), so
//! gained/lost counts do not move when sanity checks are toggled. The full
//! CUSUM decision is still carried per record as `verdict`.

use crate::batch::{OutcomeFilter, SortKey, SortOrder};
use crate::decision::{FlattenConfig, Verdict};
use crate::derivative::derivative_minimum;
use crate::error::{FlattenError, Result as EngineResult};
use crate::pipeline::analyze;
use crate::record::CurveRecord;
use anyhow::Result;
use clap::ValueEnum;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

/// Derivative minimum at or below this value counts as flattened
pub const DEFAULT_DERIVATIVE_THRESHOLD: f64 = -0.1;

/// Detection method under comparison
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Method {
    /// CUSUM minimum against the configured threshold, with the given slack
    Cusum { k: f64 },
    /// Steepest single-cycle drop in the raw readings
    Derivative,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Cusum { k } => write!(f, "cusum(k={})", k),
            Method::Derivative => write!(f, "derivative"),
        }
    }
}

/// One method's verdict on one record
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MethodResult {
    /// Statistic at or below the method's threshold
    pub flattened: bool,
    /// CUSUM minimum or derivative minimum
    pub statistic: f64,
    /// Change point (CUSUM) or steepest-drop cycle (derivative)
    pub index: usize,
    /// Full decision including the guard and sanity checks (CUSUM only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verdict: Option<Verdict>,
}

/// How the test method differs from the default on one record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlatteningChange {
    /// Flattened by the test method only
    Gained,
    /// Flattened by the default method only
    Lost,
    Unchanged,
}

impl FlatteningChange {
    pub fn classify(default: bool, test: bool) -> Self {
        match (default, test) {
            (false, true) => FlatteningChange::Gained,
            (true, false) => FlatteningChange::Lost,
            _ => FlatteningChange::Unchanged,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            FlatteningChange::Gained => "gained",
            FlatteningChange::Lost => "lost",
            FlatteningChange::Unchanged => "unchanged",
        }
    }
}

/// Restrict listed comparisons
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ComparisonFilter {
    /// Flattened by the test method
    Threshold,
    /// Test method's decision rejected by the average comparison
    Sanity,
    /// Test method's decision rejected by the line-of-best-fit check
    SanityLob,
    /// Gained or lost
    Changes,
}

impl ComparisonFilter {
    pub fn matches(&self, comparison: &Comparison) -> bool {
        let rejected_by = |filter: OutcomeFilter| {
            comparison
                .test
                .verdict
                .is_some_and(|verdict| filter.matches_verdict(&verdict))
        };
        match self {
            ComparisonFilter::Threshold => comparison.test.flattened,
            ComparisonFilter::Sanity => rejected_by(OutcomeFilter::Sanity),
            ComparisonFilter::SanityLob => rejected_by(OutcomeFilter::SanityLob),
            ComparisonFilter::Changes => comparison.change != FlatteningChange::Unchanged,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    pub id: u64,
    pub default: MethodResult,
    pub test: MethodResult,
    pub change: FlatteningChange,
}

#[derive(Debug, Clone)]
pub struct CompareOptions {
    pub default: Method,
    pub test: Method,
    /// Threshold, sanity checks and minimum length for CUSUM methods
    pub config: FlattenConfig,
    pub derivative_threshold: f64,
    pub ids: Option<Vec<u64>>,
    pub limit: Option<usize>,
    /// `Cusum` sorts by the default method's statistic
    pub sort_by: SortKey,
    pub sort_order: SortOrder,
    pub only: Option<ComparisonFilter>,
}

impl CompareOptions {
    pub fn new(default: Method, test: Method, config: FlattenConfig) -> Self {
        Self {
            default,
            test,
            config,
            derivative_threshold: DEFAULT_DERIVATIVE_THRESHOLD,
            ids: None,
            limit: None,
            sort_by: SortKey::Id,
            sort_order: SortOrder::Down,
            only: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CompareSummary {
    pub compared: usize,
    pub skipped: usize,
    pub failed: usize,
    pub default_flattened: usize,
    pub test_flattened: usize,
    pub gained: usize,
    pub lost: usize,
    pub unchanged: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonReport {
    pub default: Method,
    pub test: Method,
    pub summary: CompareSummary,
    pub records: Vec<Comparison>,
}

impl ComparisonReport {
    /// Generate human-readable report
    pub fn to_report_string(&self) -> String {
        let mut report = String::new();
        report.push_str(&format!("Default: {}\nTest: {}\n", self.default, self.test));

        for c in &self.records {
            report.push_str(&format!(
                "{:>8}  {:<9}  default {:>10.3} @{:<3} {}  test {:>10.3} @{:<3} {}\n",
                c.id,
                c.change.label(),
                c.default.statistic,
                c.default.index,
                if c.default.flattened { "F" } else { "-" },
                c.test.statistic,
                c.test.index,
                if c.test.flattened { "F" } else { "-" },
            ));
        }

        let s = &self.summary;
        report.push_str(&format!(
            "Compared: {} (skipped {}, failed {})\n",
            s.compared, s.skipped, s.failed
        ));
        report.push_str(&format!(
            "Flattened: default {}, test {}\n",
            s.default_flattened, s.test_flattened
        ));
        report.push_str(&format!(
            "Gained: {}, lost: {}, unchanged: {}\n",
            s.gained, s.lost, s.unchanged
        ));
        report
    }
}

/// Evaluate one method on one curve
pub fn evaluate_method(
    readings: &[f64],
    method: Method,
    config: &FlattenConfig,
    derivative_threshold: f64,
) -> EngineResult<MethodResult> {
    match method {
        Method::Cusum { k } => {
            let config = FlattenConfig {
                k,
                ..config.clone()
            };
            let analysis = analyze(readings, &config)?;
            Ok(MethodResult {
                flattened: analysis.trace.min_value <= config.threshold,
                statistic: analysis.trace.min_value,
                index: analysis.trace.change_point,
                verdict: Some(analysis.decision.verdict),
            })
        }
        Method::Derivative => {
            crate::error::validate_readings(readings, 2)?;
            let minimum = derivative_minimum(readings).ok_or(FlattenError::InsufficientData {
                required: 2,
                actual: readings.len(),
            })?;
            Ok(MethodResult {
                flattened: minimum.value <= derivative_threshold,
                statistic: minimum.value,
                index: minimum.index,
                verdict: None,
            })
        }
    }
}

fn sort_comparisons(comparisons: &mut [Comparison], key: SortKey, order: SortOrder) {
    comparisons.sort_by(|a, b| {
        let ordering = match key {
            SortKey::Id => a.id.cmp(&b.id),
            SortKey::Cusum => a.default.statistic.total_cmp(&b.default.statistic),
        };
        match order {
            SortOrder::Up => ordering,
            SortOrder::Down => ordering.reverse(),
        }
    });
}

/// Compare two methods over a set of records
///
/// The summary counts every compared record; sorting, `only` and `limit`
/// apply to the listed comparisons.
pub fn compare_records(
    records: &[CurveRecord],
    options: &CompareOptions,
) -> Result<ComparisonReport> {
    options.config.validate()?;
    if !options.derivative_threshold.is_finite() {
        anyhow::bail!(
            "Derivative threshold must be finite, got {}",
            options.derivative_threshold
        );
    }
    for method in [options.default, options.test] {
        if let Method::Cusum { k } = method {
            FlattenConfig {
                k,
                ..options.config.clone()
            }
            .validate()?;
        }
    }

    tracing::info!(
        default = %options.default,
        test = %options.test,
        records = records.len(),
        "comparing methods"
    );

    let wanted: Option<HashSet<u64>> = options
        .ids
        .as_ref()
        .map(|ids| ids.iter().copied().collect());
    let mut summary = CompareSummary::default();
    let mut comparisons = Vec::new();

    for record in records {
        if let Some(wanted) = &wanted {
            if !wanted.contains(&record.id) {
                continue;
            }
        }
        if record.readings.len() < options.config.min_readings {
            tracing::debug!(id = record.id, "skipping short record");
            summary.skipped += 1;
            continue;
        }

        let run = |method| {
            evaluate_method(
                &record.readings,
                method,
                &options.config,
                options.derivative_threshold,
            )
        };
        let (default, test) = match (run(options.default), run(options.test)) {
            (Ok(d), Ok(t)) => (d, t),
            (Err(e), _) | (_, Err(e)) => {
                tracing::warn!("Record {} failed: {}", record.id, e);
                summary.failed += 1;
                continue;
            }
        };

        let change = FlatteningChange::classify(default.flattened, test.flattened);
        summary.compared += 1;
        summary.default_flattened += usize::from(default.flattened);
        summary.test_flattened += usize::from(test.flattened);
        match change {
            FlatteningChange::Gained => summary.gained += 1,
            FlatteningChange::Lost => summary.lost += 1,
            FlatteningChange::Unchanged => summary.unchanged += 1,
        }

        comparisons.push(Comparison {
            id: record.id,
            default,
            test,
            change,
        });
    }

    sort_comparisons(&mut comparisons, options.sort_by, options.sort_order);
    if let Some(filter) = options.only {
        comparisons.retain(|c| filter.matches(c));
    }
    if let Some(limit) = options.limit {
        comparisons.truncate(limit);
    }

    tracing::info!(
        gained = summary.gained,
        lost = summary.lost,
        "comparison complete"
    );

    Ok(ComparisonReport {
        default: options.default,
        test: options.test,
        summary,
        records: comparisons,
    })
}
