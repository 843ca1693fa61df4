// Shared fixtures for integration tests
//
// Curve shapes modelled on real runs, and helpers that write them out in the
// wide CSV export layout.

#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Negative sample: baseline drifts down and settles at cycle 10
pub const DRIFTING: [f64; 16] = [
    1000.0, 950.0, 900.0, 850.0, 800.0, 780.0, 770.0, 765.0, 762.0, 760.0, 760.0, 761.0, 760.0,
    762.0, 761.0, 760.0,
];

/// Clean amplification curve
pub const RISING: [f64; 15] = [
    100.0, 101.0, 102.0, 104.0, 108.0, 116.0, 132.0, 164.0, 228.0, 356.0, 600.0, 900.0, 1100.0,
    1200.0, 1250.0,
];

/// Flat well with measurement noise (CUSUM minimum -46.875 at cycle 6)
pub const FLAT_NOISY: [f64; 12] = [
    500.0, 500.5, 499.8, 500.2, 500.1, 499.9, 500.3, 500.0, 499.7, 500.1, 500.2, 500.0,
];

/// Render records as CSV with `id,results,readings0..` columns
pub fn curve_csv(records: &[(u64, &[f64])]) -> String {
    let width = records.iter().map(|(_, r)| r.len()).max().unwrap_or(0);
    let mut csv = String::from("id,results");
    for i in 0..width {
        csv.push_str(&format!(",readings{}", i));
    }
    csv.push('\n');

    for (id, readings) in records {
        csv.push_str(&format!("{},{}", id, 25.0));
        for i in 0..width {
            csv.push(',');
            if let Some(v) = readings.get(i) {
                csv.push_str(&v.to_string());
            }
        }
        csv.push('\n');
    }
    csv
}

/// Standard three-curve input file
pub fn write_sample_input(dir: &TempDir) -> PathBuf {
    write_curves(
        dir,
        "curves.csv",
        &[(1, &DRIFTING[..]), (2, &RISING[..]), (3, &FLAT_NOISY[..])],
    )
}

pub fn write_curves(dir: &TempDir, name: &str, records: &[(u64, &[f64])]) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, curve_csv(records)).expect("write fixture CSV");
    path
}
