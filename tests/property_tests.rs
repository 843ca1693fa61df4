//! Property-based tests for the flattening engine
//!
//! Invariants checked over random curves:
//! 1. Normalized values stay inside the plot height
//! 2. The lower CUSUM starts at zero and never goes positive
//! 3. Non-decreasing curves never produce a negative trace
//! 4. Accepted and rejected decisions always have a change point >= 2
//! 5. Correction preserves length and the tail, and bounds the jitter
//! 6. Seeded runs are reproducible
//! 7. The record parser never panics

use cusum_flatten::correct::{correct_with_noise, noise_scale};
use cusum_flatten::cusum::detect;
use cusum_flatten::decision::{FlattenConfig, SanityChecks, Verdict};
use cusum_flatten::normalize::{normalize, NormalizeConfig};
use cusum_flatten::pipeline::{analyze, flatten};
use cusum_flatten::record::parse_records;
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

fn curve(min_len: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-5000.0f64..5000.0, min_len..48)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_normalized_within_plot_height(readings in curve(2)) {
        let config = NormalizeConfig::default();
        let normalized = normalize(&readings, &config).unwrap();

        prop_assert_eq!(normalized.len(), readings.len());
        for value in normalized {
            prop_assert!(value >= -1e-9);
            prop_assert!(value <= config.plot_height + 1e-9);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_trace_starts_at_zero_and_stays_non_positive(
        readings in curve(2),
        k in 0.0f64..50.0,
    ) {
        let normalized = normalize(&readings, &NormalizeConfig::default()).unwrap();
        let trace = detect(&normalized, k).unwrap();

        prop_assert_eq!(trace.values.len(), readings.len());
        prop_assert_eq!(trace.values[0], 0.0);
        prop_assert!(trace.values.iter().all(|v| *v <= 0.0));
        prop_assert_eq!(trace.values[trace.change_point], trace.min_value);
        // First occurrence of the minimum
        prop_assert!(trace.values[..trace.change_point].iter().all(|v| *v > trace.min_value));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_rising_curve_has_no_drop(
        start in -1000.0f64..1000.0,
        steps in prop::collection::vec(0.0f64..200.0, 1..40),
    ) {
        let mut readings = vec![start];
        for step in steps {
            let last = readings[readings.len() - 1];
            readings.push(last + step);
        }

        let normalized = normalize(&readings, &NormalizeConfig::default()).unwrap();
        let trace = detect(&normalized, 0.0).unwrap();

        // Only rounding noise from the moving average is tolerated
        prop_assert!(trace.min_value > -1e-6);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_early_change_point_never_reaches_checks(
        readings in curve(2),
        threshold in -200.0f64..0.0,
        strict in any::<bool>(),
    ) {
        let config = FlattenConfig {
            threshold,
            sanity_checks: if strict { SanityChecks::all() } else { SanityChecks::none() },
            ..FlattenConfig::default()
        };
        let analysis = analyze(&readings, &config).unwrap();
        let decision = &analysis.decision;

        match decision.verdict {
            Verdict::Accepted | Verdict::Rejected { .. } => {
                prop_assert!(decision.change_point >= 2);
                prop_assert!(decision.cusum_min <= threshold);
            }
            Verdict::NotNeeded { .. } => prop_assert!(decision.checks.is_empty()),
        }
        if matches!(decision.verdict, Verdict::Rejected { .. }) {
            prop_assert!(decision.checks.iter().any(|c| !c.passed));
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_correction_keeps_tail_and_bounds_jitter(
        readings in curve(3),
        cp_seed in any::<usize>(),
        seed in any::<u64>(),
        noise_fraction in 0.0f64..0.01,
    ) {
        let change_point = cp_seed % readings.len();
        let mut rng = StdRng::seed_from_u64(seed);
        let corrected = correct_with_noise(&readings, change_point, noise_fraction, &mut rng).unwrap();

        prop_assert_eq!(corrected.len(), readings.len());
        prop_assert_eq!(&corrected[change_point..], &readings[change_point..]);

        let scale = noise_scale(&readings, noise_fraction);
        let target = readings[change_point];
        for value in &corrected[..change_point] {
            prop_assert!((value - target).abs() <= scale + 1e-9);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    #[test]
    fn prop_seeded_flatten_is_reproducible(readings in curve(10), seed in any::<u64>()) {
        let config = FlattenConfig::permissive();

        let first = flatten(&readings, &config, &mut StdRng::seed_from_u64(seed)).unwrap();
        let second = flatten(&readings, &config, &mut StdRng::seed_from_u64(seed)).unwrap();

        prop_assert_eq!(&first, &second);
        prop_assert_eq!(first.is_corrected(), first.analysis.decision.is_accepted());
        prop_assert_eq!(first.final_readings(&readings).len(), readings.len());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_record_parser_never_panics(input in "[a-z0-9,\"\\.\\n-]{0,200}") {
        let _ = parse_records(&input);
    }

    #[test]
    fn prop_record_parser_reads_written_rows(
        rows in prop::collection::vec(prop::collection::vec(-1000i32..1000, 1..8), 1..6),
    ) {
        let width = rows.iter().map(|r| r.len()).max().unwrap_or(0);
        let mut csv = String::from("id");
        for i in 0..width {
            csv.push_str(&format!(",readings{}", i));
        }
        csv.push('\n');
        for (id, row) in rows.iter().enumerate() {
            csv.push_str(&id.to_string());
            for i in 0..width {
                csv.push(',');
                if let Some(v) = row.get(i) {
                    csv.push_str(&v.to_string());
                }
            }
            csv.push('\n');
        }

        let records = parse_records(&csv).unwrap();
        prop_assert_eq!(records.len(), rows.len());
        for (record, row) in records.iter().zip(&rows) {
            let expected: Vec<f64> = row.iter().map(|v| *v as f64).collect();
            prop_assert_eq!(&record.readings, &expected);
            prop_assert_eq!(record.results, None);
        }
    }
}
