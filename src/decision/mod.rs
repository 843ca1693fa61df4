// Correction decision engine
//
// Decides, from a CUSUM trace and a threshold, whether a curve's leading
// segment should be flattened:
//
// 1. Threshold test: CUSUM minimum above the threshold => not needed
// 2. Degeneracy guard: change point at index 0 or 1 => not needed
// 3. Plausibility checks (any subset): average comparison, line-of-best-fit
// 4. All enabled checks pass => accepted
//
// The guard in step 2 always runs before any check, so the line-of-best-fit
// never sees fewer than three points when called through `decide`.
//
// Sanity-check rejection is an outcome, not an error. Callers count it
// separately from "not needed".

mod config;
mod sanity;
mod verdict;

pub use config::{FlattenConfig, DEFAULT_MIN_READINGS, DEFAULT_NOISE_FRACTION, DEFAULT_THRESHOLD};
pub use sanity::{CheckEvidence, CheckResult, SanityCheck, SanityChecks};
pub use verdict::{decide, Decision, NotNeededReason, Verdict};
