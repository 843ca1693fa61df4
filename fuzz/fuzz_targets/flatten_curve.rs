#![no_main]

use cusum_flatten::decision::FlattenConfig;
use cusum_flatten::pipeline::flatten;
use libfuzzer_sys::fuzz_target;
use rand::rngs::StdRng;
use rand::SeedableRng;

fuzz_target!(|data: &[u8]| {
    let readings: Vec<f64> = data
        .chunks_exact(8)
        .map(|chunk| {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(chunk);
            f64::from_le_bytes(bytes)
        })
        .collect();

    let mut rng = StdRng::seed_from_u64(0);
    if let Ok(outcome) = flatten(&readings, &FlattenConfig::strict(), &mut rng) {
        assert_eq!(outcome.final_readings(&readings).len(), readings.len());
    }
});
