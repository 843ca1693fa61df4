//! CSV curve records
//!
//! Reads the wide export layout: one row per well, an `id` column, an
//! optional `results` column and `readings0 .. readingsN` columns. Exports
//! pad short curves with empty trailing cells.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// One amplification curve with its identifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurveRecord {
    pub id: u64,
    /// Per-cycle readings in cycle order
    pub readings: Vec<f64>,
    /// Scalar result value carried alongside the readings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<f64>,
}

impl CurveRecord {
    pub fn new(id: u64, readings: Vec<f64>) -> Self {
        Self {
            id,
            readings,
            results: None,
        }
    }

    pub fn with_results(mut self, results: f64) -> Self {
        self.results = Some(results);
        self
    }
}

/// Column positions resolved from the header row
#[derive(Debug)]
struct Columns {
    id: usize,
    results: Option<usize>,
    /// Column index of `readings0`, `readings1`, ... in cycle order
    readings: Vec<usize>,
}

impl Columns {
    fn from_header(fields: &[String]) -> Result<Self> {
        let mut id = None;
        let mut results = None;
        let mut readings: Vec<(usize, usize)> = Vec::new();

        for (column, name) in fields.iter().enumerate() {
            let name = name.trim();
            if name == "id" {
                id = Some(column);
            } else if name.eq_ignore_ascii_case("results") {
                results = Some(column);
            } else if let Some(suffix) = name.strip_prefix("readings") {
                if let Ok(cycle) = suffix.parse::<usize>() {
                    readings.push((cycle, column));
                }
            }
        }

        let Some(id) = id else {
            bail!("CSV header has no 'id' column");
        };
        if readings.is_empty() {
            bail!("CSV header has no readings0..readingsN columns");
        }

        readings.sort_unstable();
        for (expected, (cycle, _)) in readings.iter().enumerate() {
            if *cycle != expected {
                bail!(
                    "CSV header is missing column readings{} (found readings{})",
                    expected,
                    cycle
                );
            }
        }

        Ok(Self {
            id,
            results,
            readings: readings.into_iter().map(|(_, column)| column).collect(),
        })
    }
}

/// Split one CSV line into fields, honouring quotes and `""` escapes
pub fn split_fields(line: &str) -> Result<Vec<String>> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    field.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            }
            '"' if field.is_empty() => in_quotes = true,
            ',' if !in_quotes => fields.push(std::mem::take(&mut field)),
            _ => field.push(c),
        }
    }

    if in_quotes {
        bail!("Unterminated quoted field");
    }
    fields.push(field);
    Ok(fields)
}

fn cell<'a>(fields: &'a [String], column: usize) -> &'a str {
    fields.get(column).map(|f| f.trim()).unwrap_or("")
}

fn parse_row(fields: &[String], columns: &Columns, line_no: usize) -> Result<CurveRecord> {
    let id_text = cell(fields, columns.id);
    let id = id_text
        .parse::<u64>()
        .with_context(|| format!("Line {}: invalid id '{}'", line_no, id_text))?;

    let results = match columns.results.map(|c| cell(fields, c)) {
        None | Some("") => None,
        Some(text) => Some(
            text.parse::<f64>()
                .with_context(|| format!("Line {}: invalid results value '{}'", line_no, text))?,
        ),
    };

    let mut readings = Vec::with_capacity(columns.readings.len());
    let mut first_blank: Option<usize> = None;

    for (cycle, &column) in columns.readings.iter().enumerate() {
        let text = cell(fields, column);
        if text.is_empty() {
            first_blank.get_or_insert(cycle);
            continue;
        }
        if let Some(blank) = first_blank {
            bail!(
                "Line {}: readings{} has a value after empty readings{}",
                line_no,
                cycle,
                blank
            );
        }
        let value = text.parse::<f64>().with_context(|| {
            format!("Line {}: invalid value '{}' in readings{}", line_no, text, cycle)
        })?;
        readings.push(value);
    }

    Ok(CurveRecord {
        id,
        readings,
        results,
    })
}

/// Parse CSV text into curve records
///
/// # Example
/// ```
/// use cusum_flatten::record::parse_records;
///
/// let csv = "id,results,readings0,readings1,readings2\n7,31.5,10,9,\n";
/// let records = parse_records(csv).unwrap();
/// assert_eq!(records[0].id, 7);
/// assert_eq!(records[0].readings, vec![10.0, 9.0]);
/// assert_eq!(records[0].results, Some(31.5));
/// ```
pub fn parse_records(text: &str) -> Result<Vec<CurveRecord>> {
    let mut lines = text
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim_end_matches('\r')))
        .filter(|(_, line)| !line.trim().is_empty());

    let Some((header_no, header)) = lines.next() else {
        bail!("CSV input is empty");
    };
    let header_fields =
        split_fields(header).with_context(|| format!("Line {}: malformed header", header_no))?;
    let columns = Columns::from_header(&header_fields)?;

    let mut records = Vec::new();
    for (line_no, line) in lines {
        let fields = split_fields(line).with_context(|| format!("Line {}: malformed row", line_no))?;
        records.push(parse_row(&fields, &columns, line_no)?);
    }

    tracing::debug!(
        records = records.len(),
        cycles = columns.readings.len(),
        "parsed curve records"
    );
    Ok(records)
}

/// Read curve records from a CSV file
pub fn read_records<P: AsRef<Path>>(path: P) -> Result<Vec<CurveRecord>> {
    let path_ref = path.as_ref();

    if !path_ref.exists() {
        bail!("Input file not found: {}", path_ref.display());
    }

    let contents = fs::read_to_string(path_ref)
        .with_context(|| format!("Failed to read input file {}", path_ref.display()))?;

    parse_records(&contents).with_context(|| format!("Failed to parse {}", path_ref.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_split_plain() {
        assert_eq!(split_fields("1,2,,3").unwrap(), vec!["1", "2", "", "3"]);
    }

    #[test]
    fn test_split_quoted() {
        assert_eq!(
            split_fields("\"a,b\",\"say \"\"hi\"\"\",c").unwrap(),
            vec!["a,b", "say \"hi\"", "c"]
        );
    }

    #[test]
    fn test_split_unterminated_quote() {
        assert!(split_fields("1,\"open").is_err());
    }

    #[test]
    fn test_parse_basic() {
        let csv = "id,readings0,readings1,readings2\n1,10,20,30\n2,5,4,3\n";
        let records = parse_records(csv).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0], CurveRecord::new(1, vec![10.0, 20.0, 30.0]));
        assert_eq!(records[1].readings, vec![5.0, 4.0, 3.0]);
        assert_eq!(records[1].results, None);
    }

    #[test]
    fn test_columns_resolved_by_index_not_position() {
        let csv = "readings1,extra,id,Results,readings0\n20,x,9,33.1,10\n";
        let records = parse_records(csv).unwrap();
        assert_eq!(records[0], CurveRecord::new(9, vec![10.0, 20.0]).with_results(33.1));
    }

    #[test]
    fn test_trailing_blanks_shorten_sequence() {
        let csv = "id,readings0,readings1,readings2,readings3\n4,1.5,2.5,,\n";
        let records = parse_records(csv).unwrap();
        assert_eq!(records[0].readings, vec![1.5, 2.5]);
    }

    #[test]
    fn test_short_row_treated_as_trailing_blanks() {
        let csv = "id,readings0,readings1,readings2\n4,1.5\n";
        let records = parse_records(csv).unwrap();
        assert_eq!(records[0].readings, vec![1.5]);
    }

    #[test]
    fn test_gap_in_readings_is_error() {
        let csv = "id,readings0,readings1,readings2\n4,1.5,,2.5\n";
        let err = parse_records(csv).unwrap_err();
        assert!(format!("{:#}", err).contains("readings2"));
    }

    #[test]
    fn test_non_numeric_reading_is_error() {
        let csv = "id,readings0,readings1\n4,1.5,abc\n";
        let err = parse_records(csv).unwrap_err();
        let message = format!("{:#}", err);
        assert!(message.contains("Line 2"));
        assert!(message.contains("readings1"));
    }

    #[test]
    fn test_missing_id_column() {
        assert!(parse_records("readings0,readings1\n1,2\n").is_err());
    }

    #[test]
    fn test_missing_reading_column() {
        let err = parse_records("id,readings0,readings2\n1,2,3\n").unwrap_err();
        assert!(err.to_string().contains("readings1"));
    }

    #[test]
    fn test_blank_lines_and_crlf() {
        let csv = "id,readings0,readings1\r\n\r\n3,1,2\r\n";
        let records = parse_records(csv).unwrap();
        assert_eq!(records, vec![CurveRecord::new(3, vec![1.0, 2.0])]);
    }

    #[test]
    fn test_empty_input() {
        assert!(parse_records("").is_err());
    }

    #[test]
    fn test_read_records_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "id,results,readings0,readings1").unwrap();
        writeln!(file, "11,,100,90").unwrap();

        let records = read_records(file.path()).unwrap();
        assert_eq!(records, vec![CurveRecord::new(11, vec![100.0, 90.0])]);
    }

    #[test]
    fn test_read_records_missing_file() {
        let err = read_records("/nonexistent/curves.csv").unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
