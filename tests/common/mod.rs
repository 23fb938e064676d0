//! Shared fixtures for the integration tests

#![allow(dead_code)]

pub mod builders;
pub mod mock_helpers;

use std::time::Duration;

/// Upper bound for a queued stage to finish its backlog
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Check a reduction output against its expected value, within `tolerance`.
#[track_caller]
pub fn assert_close(actual: f64, expected: f64, tolerance: f64) {
    let diff = (actual - expected).abs();
    if diff > tolerance {
        panic!("reduction output {actual} differs from {expected} by {diff} (tolerance {tolerance})");
    }
}
