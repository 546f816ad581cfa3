//! Metric instrument factories for leadgen-dispatch.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! All instruments are created lazily from the `"leadgen-dispatch"` meter.

use opentelemetry::metrics::{Counter, Histogram, Meter};

/// Returns the shared meter for leadgen-dispatch instruments.
fn meter() -> Meter {
    opentelemetry::global::meter("leadgen-dispatch")
}

/// Counter: individual webhook calls made by the dispatcher.
/// Labels: `target`, `result` ("ok" | "error" | "timeout").
pub fn dispatch_calls() -> Counter<u64> {
    meter()
        .u64_counter("leadgen.dispatch.calls")
        .with_description("Number of per-item webhook calls")
        .build()
}

/// Counter: non-empty batches dispatched.
/// Labels: `target`.
pub fn dispatch_batches() -> Counter<u64> {
    meter()
        .u64_counter("leadgen.dispatch.batches")
        .with_description("Number of dispatched batches")
        .build()
}

/// Histogram: per-item call duration in milliseconds.
/// Labels: `target`, and `http.response.status_code` on non-success.
pub fn call_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("leadgen.dispatch.call_duration_ms")
        .with_description("Per-item webhook call duration in milliseconds")
        .with_unit("ms")
        .build()
}

/// Counter: business scans enqueued or skipped.
/// Labels: `result` ("inserted" | "skipped").
pub fn scans_enqueued() -> Counter<u64> {
    meter()
        .u64_counter("leadgen.scans.enqueued")
        .with_description("Business scan enqueue results")
        .build()
}

/// Counter: scanpoints whose city was backfilled after generation.
pub fn scanpoints_patched() -> Counter<u64> {
    meter()
        .u64_counter("leadgen.scanpoints.patched")
        .with_description("Generated scanpoints with backfilled city")
        .build()
}
