//! Tests for utility helpers

use prometheus_pipeline::util::{init_tracing, init_tracing_with, Clock, SystemClock};

#[test]
fn test_init_tracing_is_idempotent() {
    init_tracing();
    init_tracing_with("debug");
}

#[test]
fn test_system_clock_is_monotonic_enough() {
    let a = SystemClock.now();
    let b = SystemClock.now();
    assert!(a <= b);
}
