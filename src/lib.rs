//! cusum-flatten - CUSUM change-point detection and curve flattening for qPCR readings
//!
//! Negative qPCR wells often show a downward baseline drift over the first
//! cycles that downstream classifiers misread. This library detects where the
//! drift ends with a one-sided (lower) CUSUM over a normalized, smoothed copy
//! of the curve, gates the change point with optional plausibility checks, and
//! flattens the leading segment up to it.
//!
//! The engine (`normalize`, `cusum`, `decision`, `correct`, `pipeline`) is
//! pure and does no I/O; all randomness comes from a caller-supplied
//! generator. `record`, `batch`, `compare` and the output modules are the
//! file-based tool built on top of it.

pub mod batch;
pub mod cli;
pub mod compare;
pub mod correct;
pub mod csv_output;
pub mod cusum;
pub mod decision;
pub mod derivative;
pub mod error;
pub mod json_output;
pub mod normalize;
pub mod numeric;
pub mod pipeline;
pub mod record;
