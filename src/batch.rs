//! Batch processing over many curve records
//!
//! Selection (ID list, minimum length), per-record engine runs, sorting,
//! outcome filtering and summary counts. Records can be spread over worker
//! threads; every record draws jitter from its own generator seeded from the
//! run seed and the record ID, so output does not depend on `jobs` or on
//! input order.

use crate::cusum::{detect, CusumTrace};
use crate::decision::{Decision, FlattenConfig, NotNeededReason, SanityCheck, Verdict};
use crate::normalize::normalize;
use crate::pipeline::{analyze, flatten, FlattenOutcome};
use crate::record::CurveRecord;
use anyhow::{anyhow, Result};
use clap::ValueEnum;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::collections::HashSet;

/// What to compute for each record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Full pipeline with correction
    Flatten,
    /// Decision only
    Inspect,
    /// CUSUM trace and negative-slope flag only
    Cusum,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum SortKey {
    Id,
    #[default]
    Cusum,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum SortOrder {
    /// Ascending
    Up,
    /// Descending
    #[default]
    Down,
}

/// Restrict listed records to one outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutcomeFilter {
    Accepted,
    /// Any "not needed" outcome
    NotNeeded,
    /// CUSUM minimum above threshold
    Threshold,
    /// Change point at cycle 0 or 1
    TooEarly,
    /// Any sanity-check rejection
    Rejected,
    /// Rejected by the average comparison
    Sanity,
    /// Rejected by the line-of-best-fit check
    SanityLob,
}

impl OutcomeFilter {
    pub fn matches(&self, outcome: &RecordOutcome) -> bool {
        outcome
            .decision()
            .is_some_and(|decision| self.matches_verdict(&decision.verdict))
    }

    pub fn matches_verdict(&self, verdict: &Verdict) -> bool {
        match (self, *verdict) {
            (OutcomeFilter::Accepted, Verdict::Accepted) => true,
            (OutcomeFilter::NotNeeded, Verdict::NotNeeded { .. }) => true,
            (
                OutcomeFilter::Threshold,
                Verdict::NotNeeded {
                    reason: NotNeededReason::AboveThreshold,
                },
            ) => true,
            (
                OutcomeFilter::TooEarly,
                Verdict::NotNeeded {
                    reason: NotNeededReason::ChangePointTooEarly,
                },
            ) => true,
            (OutcomeFilter::Rejected, Verdict::Rejected { .. }) => true,
            (
                OutcomeFilter::Sanity,
                Verdict::Rejected {
                    failed: SanityCheck::AverageComparison,
                },
            ) => true,
            (
                OutcomeFilter::SanityLob,
                Verdict::Rejected {
                    failed: SanityCheck::LineOfBestFit,
                },
            ) => true,
            _ => false,
        }
    }
}

/// Batch run parameters
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub mode: Mode,
    pub config: FlattenConfig,
    /// Only process these record IDs
    pub ids: Option<Vec<u64>>,
    /// Maximum number of records listed
    pub limit: Option<usize>,
    pub sort_by: SortKey,
    pub sort_order: SortOrder,
    pub only: Option<OutcomeFilter>,
    /// Worker threads (0 = available parallelism)
    pub jobs: usize,
    /// Run seed; drawn at random when absent
    pub seed: Option<u64>,
}

impl BatchOptions {
    pub fn new(mode: Mode, config: FlattenConfig) -> Self {
        Self {
            mode,
            config,
            ids: None,
            limit: None,
            sort_by: SortKey::default(),
            sort_order: SortOrder::default(),
            only: None,
            jobs: 1,
            seed: None,
        }
    }
}

/// CUSUM-only result for one record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CusumSummary {
    pub trace: CusumTrace,
    /// CUSUM minimum strictly below the threshold
    pub negative_slope: bool,
}

/// Per-record result
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecordOutcome {
    Analyzed(FlattenOutcome),
    Cusum(CusumSummary),
    Skipped { reason: String },
    Failed { error: String },
}

impl RecordOutcome {
    pub fn decision(&self) -> Option<&Decision> {
        match self {
            RecordOutcome::Analyzed(outcome) => Some(&outcome.analysis.decision),
            _ => None,
        }
    }

    pub fn trace(&self) -> Option<&CusumTrace> {
        match self {
            RecordOutcome::Analyzed(outcome) => Some(&outcome.analysis.trace),
            RecordOutcome::Cusum(summary) => Some(&summary.trace),
            _ => None,
        }
    }

    pub fn cusum_min(&self) -> Option<f64> {
        self.trace().map(|t| t.min_value)
    }

    /// Stable label for text and CSV output
    pub fn label(&self) -> &'static str {
        match self {
            RecordOutcome::Analyzed(outcome) => outcome.analysis.decision.verdict.label(),
            RecordOutcome::Cusum(summary) if summary.negative_slope => "negative_slope",
            RecordOutcome::Cusum(_) => "no_negative_slope",
            RecordOutcome::Skipped { .. } => "skipped",
            RecordOutcome::Failed { .. } => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordResult {
    pub record: CurveRecord,
    pub outcome: RecordOutcome,
}

/// Counts over every selected record
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchSummary {
    pub selected: usize,
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub accepted: usize,
    pub not_needed_threshold: usize,
    pub not_needed_too_early: usize,
    pub rejected_average: usize,
    pub rejected_lob: usize,
    pub negative_slope: usize,
    pub cusum_min_lowest: Option<f64>,
    pub cusum_min_highest: Option<f64>,
    pub cusum_min_mean: Option<f64>,
    pub seed: u64,
}

impl BatchSummary {
    fn from_results(results: &[RecordResult], seed: u64) -> Self {
        let mut summary = BatchSummary {
            selected: results.len(),
            seed,
            ..Default::default()
        };
        let mut minima = Vec::new();

        for result in results {
            match &result.outcome {
                RecordOutcome::Skipped { .. } => summary.skipped += 1,
                RecordOutcome::Failed { .. } => summary.failed += 1,
                RecordOutcome::Cusum(cusum) => {
                    summary.processed += 1;
                    if cusum.negative_slope {
                        summary.negative_slope += 1;
                    }
                }
                RecordOutcome::Analyzed(outcome) => {
                    summary.processed += 1;
                    match outcome.analysis.decision.verdict {
                        Verdict::Accepted => summary.accepted += 1,
                        Verdict::NotNeeded {
                            reason: NotNeededReason::AboveThreshold,
                        } => summary.not_needed_threshold += 1,
                        Verdict::NotNeeded {
                            reason: NotNeededReason::ChangePointTooEarly,
                        } => summary.not_needed_too_early += 1,
                        Verdict::Rejected {
                            failed: SanityCheck::AverageComparison,
                        } => summary.rejected_average += 1,
                        Verdict::Rejected {
                            failed: SanityCheck::LineOfBestFit,
                        } => summary.rejected_lob += 1,
                    }
                }
            }
            if let Some(min) = result.outcome.cusum_min() {
                minima.push(min);
            }
        }

        summary.cusum_min_lowest = minima.iter().copied().reduce(f64::min);
        summary.cusum_min_highest = minima.iter().copied().reduce(f64::max);
        summary.cusum_min_mean = crate::numeric::mean(&minima);
        summary
    }

    pub fn not_needed(&self) -> usize {
        self.not_needed_threshold + self.not_needed_too_early
    }

    pub fn rejected(&self) -> usize {
        self.rejected_average + self.rejected_lob
    }

    /// Generate human-readable summary
    pub fn to_report_string(&self, mode: Mode) -> String {
        let mut report = String::new();
        report.push_str(&format!(
            "Records: {} selected, {} processed, {} skipped, {} failed\n",
            self.selected, self.processed, self.skipped, self.failed
        ));

        match mode {
            Mode::Cusum => {
                report.push_str(&format!("Negative slope: {}\n", self.negative_slope));
            }
            Mode::Flatten | Mode::Inspect => {
                let verb = if mode == Mode::Flatten {
                    "Flattened"
                } else {
                    "Would flatten"
                };
                report.push_str(&format!("{}: {}\n", verb, self.accepted));
                report.push_str(&format!(
                    "Not needed: {} (above threshold {}, change point too early {})\n",
                    self.not_needed(),
                    self.not_needed_threshold,
                    self.not_needed_too_early
                ));
                report.push_str(&format!(
                    "Rejected: {} (average {}, lob {})\n",
                    self.rejected(),
                    self.rejected_average,
                    self.rejected_lob
                ));
            }
        }

        if let (Some(low), Some(high), Some(mean)) = (
            self.cusum_min_lowest,
            self.cusum_min_highest,
            self.cusum_min_mean,
        ) {
            report.push_str(&format!(
                "CUSUM minimum: lowest {:.3}, highest {:.3}, mean {:.3}\n",
                low, high, mean
            ));
        }
        report.push_str(&format!("Seed: {}\n", self.seed));
        report
    }
}

/// Batch results in listing order plus the summary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    pub mode: Mode,
    pub summary: BatchSummary,
    pub records: Vec<RecordResult>,
}

impl BatchReport {
    /// Generate human-readable report: one line per listed record, then the summary
    pub fn to_report_string(&self) -> String {
        let mut report = String::new();

        for result in &self.records {
            report.push_str(&format!("{:>8}  {:<17}", result.record.id, result.outcome.label()));
            match &result.outcome {
                RecordOutcome::Analyzed(outcome) => {
                    let decision = &outcome.analysis.decision;
                    report.push_str(&format!(
                        "  cusum_min={:.3}  change_point={}",
                        decision.cusum_min, decision.change_point
                    ));
                    if let Verdict::Rejected { failed } = decision.verdict {
                        report.push_str(&format!("  failed={}", failed.label()));
                    }
                    if let Some(value) = outcome.replacement_result {
                        report.push_str(&format!("  results={:.3}", value));
                    }
                }
                RecordOutcome::Cusum(summary) => {
                    report.push_str(&format!(
                        "  cusum_min={:.3}  change_point={}",
                        summary.trace.min_value, summary.trace.change_point
                    ));
                }
                RecordOutcome::Skipped { reason } => report.push_str(&format!("  {}", reason)),
                RecordOutcome::Failed { error } => report.push_str(&format!("  {}", error)),
            }
            report.push('\n');
        }

        if !self.records.is_empty() {
            report.push('\n');
        }
        report.push_str(&self.summary.to_report_string(self.mode));
        report
    }
}

/// Per-record seed derived from the run seed and the record ID
pub fn record_seed(seed: u64, id: u64) -> u64 {
    // splitmix64 finalizer
    let mut z = id.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    seed ^ (z ^ (z >> 31))
}

fn cusum_summary(readings: &[f64], config: &FlattenConfig) -> crate::error::Result<CusumSummary> {
    crate::error::validate_readings(readings, 2)?;
    config.validate()?;
    let normalized = normalize(readings, &config.normalize)?;
    let trace = detect(&normalized, config.k)?;
    let negative_slope = trace.min_value < config.threshold;
    Ok(CusumSummary {
        trace,
        negative_slope,
    })
}

/// Run one record through the engine
pub fn process_record(
    record: &CurveRecord,
    mode: Mode,
    config: &FlattenConfig,
    seed: u64,
) -> RecordOutcome {
    if record.readings.len() < config.min_readings {
        tracing::debug!(
            id = record.id,
            readings = record.readings.len(),
            "skipping short record"
        );
        return RecordOutcome::Skipped {
            reason: format!(
                "{} readings, need at least {}",
                record.readings.len(),
                config.min_readings
            ),
        };
    }

    let result = match mode {
        Mode::Flatten => {
            let mut rng = StdRng::seed_from_u64(record_seed(seed, record.id));
            flatten(&record.readings, config, &mut rng).map(RecordOutcome::Analyzed)
        }
        Mode::Inspect => analyze(&record.readings, config).map(|analysis| {
            RecordOutcome::Analyzed(FlattenOutcome {
                analysis,
                corrected: None,
                replacement_result: None,
            })
        }),
        Mode::Cusum => cusum_summary(&record.readings, config).map(RecordOutcome::Cusum),
    };

    match result {
        Ok(outcome) => {
            tracing::debug!(id = record.id, outcome = outcome.label(), "processed record");
            outcome
        }
        Err(e) => {
            tracing::warn!("Record {} failed: {}", record.id, e);
            RecordOutcome::Failed {
                error: e.to_string(),
            }
        }
    }
}

fn worker_count(jobs: usize) -> usize {
    if jobs == 0 {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    } else {
        jobs
    }
}

fn process_all(
    records: &[CurveRecord],
    mode: Mode,
    config: &FlattenConfig,
    seed: u64,
    jobs: usize,
) -> Result<Vec<RecordOutcome>> {
    let workers = worker_count(jobs).min(records.len()).max(1);
    if workers == 1 {
        return Ok(records
            .iter()
            .map(|record| process_record(record, mode, config, seed))
            .collect());
    }

    let chunk_size = records.len().div_ceil(workers);
    crossbeam::thread::scope(|scope| {
        let handles: Vec<_> = records
            .chunks(chunk_size)
            .map(|chunk| {
                scope.spawn(move |_| {
                    chunk
                        .iter()
                        .map(|record| process_record(record, mode, config, seed))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut outcomes = Vec::with_capacity(records.len());
        for handle in handles {
            let chunk = handle
                .join()
                .map_err(|_| anyhow!("Batch worker thread panicked"))?;
            outcomes.extend(chunk);
        }
        Ok::<_, anyhow::Error>(outcomes)
    })
    .map_err(|_| anyhow!("Batch worker scope panicked"))?
}

fn select(records: Vec<CurveRecord>, ids: Option<&[u64]>) -> Vec<CurveRecord> {
    let Some(ids) = ids else {
        return records;
    };
    let wanted: HashSet<u64> = ids.iter().copied().collect();
    let selected: Vec<CurveRecord> = records
        .into_iter()
        .filter(|r| wanted.contains(&r.id))
        .collect();

    let found: HashSet<u64> = selected.iter().map(|r| r.id).collect();
    for id in ids.iter().filter(|id| !found.contains(id)) {
        tracing::warn!("Requested record {} not found in input", id);
    }
    selected
}

fn sort_results(results: &mut [RecordResult], key: SortKey, order: SortOrder) {
    match key {
        SortKey::Id => results.sort_by(|a, b| match order {
            SortOrder::Up => a.record.id.cmp(&b.record.id),
            SortOrder::Down => b.record.id.cmp(&a.record.id),
        }),
        // Records without a CUSUM minimum always sort last
        SortKey::Cusum => results.sort_by(|a, b| {
            match (a.outcome.cusum_min(), b.outcome.cusum_min()) {
                (Some(x), Some(y)) => match order {
                    SortOrder::Up => x.total_cmp(&y),
                    SortOrder::Down => y.total_cmp(&x),
                },
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            }
        }),
    }
}

/// Process a batch of records
///
/// The summary counts every selected record; `only` and `limit` apply to the
/// listed records after sorting.
pub fn run_batch(records: Vec<CurveRecord>, options: &BatchOptions) -> Result<BatchReport> {
    options.config.validate()?;

    let seed = match options.seed {
        Some(seed) => seed,
        None => {
            let seed = rand::random::<u64>();
            tracing::info!(seed, "no seed given, drew a random one");
            seed
        }
    };

    let selected = select(records, options.ids.as_deref());
    tracing::info!(
        records = selected.len(),
        mode = ?options.mode,
        k = options.config.k,
        threshold = options.config.threshold,
        "starting batch"
    );

    let outcomes = process_all(
        &selected,
        options.mode,
        &options.config,
        seed,
        options.jobs,
    )?;
    let mut results: Vec<RecordResult> = selected
        .into_iter()
        .zip(outcomes)
        .map(|(record, outcome)| RecordResult { record, outcome })
        .collect();

    let summary = BatchSummary::from_results(&results, seed);
    tracing::info!(
        processed = summary.processed,
        accepted = summary.accepted,
        rejected = summary.rejected(),
        skipped = summary.skipped,
        failed = summary.failed,
        "batch complete"
    );

    sort_results(&mut results, options.sort_by, options.sort_order);
    if let Some(filter) = options.only {
        results.retain(|r| filter.matches(&r.outcome));
    }
    if let Some(limit) = options.limit {
        results.truncate(limit);
    }

    Ok(BatchReport {
        mode: options.mode,
        summary,
        records: results,
    })
}
