#![no_main]

use libfuzzer_sys::fuzz_target;
use cusum_flatten::record::parse_records;

fuzz_target!(|data: &[u8]| {
    // Arbitrary CSV text must produce records or an error, never a panic
    if let Ok(input) = std::str::from_utf8(data) {
        let _ = parse_records(input);
    }
});
