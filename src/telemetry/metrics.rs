//! Metric instrument factories for expq-rs.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! All instruments are created lazily from the `"expq-rs"` meter.

use opentelemetry::metrics::{Counter, Histogram, Meter};

/// Returns the shared meter for expq-rs instruments.
fn meter() -> Meter {
    opentelemetry::global::meter("expq-rs")
}

/// Counter: experiment document reads.
/// Labels: `operation` ("list" | "get").
pub fn experiment_reads() -> Counter<u64> {
    meter()
        .u64_counter("expq.experiment.reads")
        .with_description("Number of experiment document reads")
        .build()
}

/// Counter: work-queue claim attempts.
/// Labels: `result` ("ok" | "empty").
pub fn experiment_claims() -> Counter<u64> {
    meter()
        .u64_counter("expq.experiment.claims")
        .with_description("Number of experiment claim attempts")
        .build()
}

/// Histogram: operation duration in milliseconds.
/// Labels: `operation` ("experiment.list" | "experiment.get" | "experiment.claim").
pub fn operation_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("expq.operation.duration_ms")
        .with_description("Operation duration in milliseconds")
        .with_unit("ms")
        .build()
}
