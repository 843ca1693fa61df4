//! CSV output format for batch and comparison results
//!
//! Flatten and inspect runs write the same wide layout the input uses, so a
//! flattened file can be fed straight back in.

use crate::batch::{BatchReport, RecordOutcome, RecordResult};
use crate::compare::ComparisonReport;

/// CSV row for one processed record
#[derive(Debug, Clone, PartialEq)]
pub struct CsvRecordRow {
    pub id: u64,
    pub outcome: String,
    pub cusum_min: Option<f64>,
    pub change_point: Option<usize>,
    pub results: Option<f64>,
    /// Corrected readings when a correction was applied, originals otherwise
    pub readings: Vec<f64>,
}

impl CsvRecordRow {
    pub fn from_result(result: &RecordResult) -> Self {
        let record = &result.record;
        let mut row = CsvRecordRow {
            id: record.id,
            outcome: result.outcome.label().to_string(),
            cusum_min: result.outcome.cusum_min(),
            change_point: result.outcome.decision().map(|d| d.change_point),
            results: record.results,
            readings: record.readings.clone(),
        };

        if let RecordOutcome::Analyzed(outcome) = &result.outcome {
            if let Some(corrected) = &outcome.corrected {
                row.readings = corrected.clone();
            }
            if let Some(value) = outcome.replacement_result {
                row.results = Some(value);
            }
        }
        row
    }
}

fn optional<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn numbered_columns(prefix: &str, count: usize) -> impl Iterator<Item = String> + '_ {
    (0..count).map(move |i| format!("{}{}", prefix, i))
}

/// CSV output formatter for flatten and inspect runs
#[derive(Debug, Default)]
pub struct CsvOutput {
    rows: Vec<CsvRecordRow>,
}

impl CsvOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_report(report: &BatchReport) -> Self {
        Self {
            rows: report.records.iter().map(CsvRecordRow::from_result).collect(),
        }
    }

    pub fn add_row(&mut self, row: CsvRecordRow) {
        self.rows.push(row);
    }

    fn reading_columns(&self) -> usize {
        self.rows.iter().map(|r| r.readings.len()).max().unwrap_or(0)
    }

    /// Header row sized to the longest curve
    fn header(&self) -> String {
        let mut headers: Vec<String> = ["id", "outcome", "cusum_min", "change_point", "results"]
            .iter()
            .map(|h| h.to_string())
            .collect();
        headers.extend(numbered_columns("readings", self.reading_columns()));
        headers.join(",")
    }

    /// Escape CSV field (handle commas, quotes, newlines)
    pub fn escape_field(field: &str) -> String {
        if field.contains(',') || field.contains('"') || field.contains('\n') {
            format!("\"{}\"", field.replace('"', "\"\""))
        } else {
            field.to_string()
        }
    }

    fn format_row(&self, row: &CsvRecordRow, width: usize) -> String {
        let mut fields = vec![
            row.id.to_string(),
            Self::escape_field(&row.outcome),
            optional(row.cusum_min),
            optional(row.change_point),
            optional(row.results),
        ];
        fields.extend(row.readings.iter().map(|v| v.to_string()));
        // Pad short curves with empty trailing cells
        fields.resize(5 + width, String::new());
        fields.join(",")
    }

    /// Generate CSV output as string
    pub fn to_csv(&self) -> String {
        let width = self.reading_columns();
        let mut output = String::new();

        output.push_str(&self.header());
        output.push('\n');

        for row in &self.rows {
            output.push_str(&self.format_row(row, width));
            output.push('\n');
        }

        output
    }
}

/// CSV row for a CUSUM-only run
#[derive(Debug, Clone, PartialEq)]
pub struct CsvCusumRow {
    pub id: u64,
    pub cusum_min: Option<f64>,
    pub negative_slope: Option<bool>,
    pub trace: Vec<f64>,
}

/// CSV output formatter for the `cusum` pass
#[derive(Debug, Default)]
pub struct CsvCusumOutput {
    rows: Vec<CsvCusumRow>,
}

impl CsvCusumOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_report(report: &BatchReport) -> Self {
        let rows = report
            .records
            .iter()
            .map(|result| match &result.outcome {
                RecordOutcome::Cusum(summary) => CsvCusumRow {
                    id: result.record.id,
                    cusum_min: Some(summary.trace.min_value),
                    negative_slope: Some(summary.negative_slope),
                    trace: summary.trace.values.clone(),
                },
                other => CsvCusumRow {
                    id: result.record.id,
                    cusum_min: other.cusum_min(),
                    negative_slope: None,
                    trace: other.trace().map(|t| t.values.clone()).unwrap_or_default(),
                },
            })
            .collect();
        Self { rows }
    }

    pub fn add_row(&mut self, row: CsvCusumRow) {
        self.rows.push(row);
    }

    /// Generate CSV output as string
    pub fn to_csv(&self) -> String {
        let width = self.rows.iter().map(|r| r.trace.len()).max().unwrap_or(0);
        let mut output = String::from("id,cusum_min,negative_slope");
        for column in numbered_columns("cusum", width) {
            output.push(',');
            output.push_str(&column);
        }
        output.push('\n');

        for row in &self.rows {
            let mut fields = vec![
                row.id.to_string(),
                optional(row.cusum_min),
                optional(row.negative_slope),
            ];
            fields.extend(row.trace.iter().map(|v| v.to_string()));
            fields.resize(3 + width, String::new());
            output.push_str(&fields.join(","));
            output.push('\n');
        }

        output
    }
}

/// CSV output for a method comparison
pub fn comparison_to_csv(report: &ComparisonReport) -> String {
    let mut output = String::from(
        "id,change,default_flattened,default_statistic,default_index,\
         test_flattened,test_statistic,test_index\n",
    );
    for c in &report.records {
        output.push_str(&format!(
            "{},{},{},{},{},{},{},{}\n",
            c.id,
            c.change.label(),
            c.default.flattened,
            c.default.statistic,
            c.default.index,
            c.test.flattened,
            c.test.statistic,
            c.test.index
        ));
    }
    output
}
