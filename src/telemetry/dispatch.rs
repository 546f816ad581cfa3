//! Span helpers for batch dispatch.
//!
//! One `dispatch.batch` span per batch, with a `dispatch.call` child per
//! item. Outcome counts are declared empty and filled in once the batch
//! has settled.

use tracing::Span;

/// Start a span covering one batch.
pub fn start_batch_span(target: &str, size: usize, concurrency: usize) -> Span {
    tracing::info_span!(
        "dispatch.batch",
        "dispatch.target" = target,
        "dispatch.size" = size,
        "dispatch.concurrency" = concurrency,
        "dispatch.succeeded" = tracing::field::Empty,
        "dispatch.failed" = tracing::field::Empty,
    )
}

/// Start a span for a single item's call.
pub fn start_call_span(target: &str, item_id: &str) -> Span {
    tracing::debug_span!(
        "dispatch.call",
        "dispatch.target" = target,
        "dispatch.item_id" = item_id,
    )
}

/// Record final counts on a batch span.
pub fn record_batch_outcome(span: &Span, succeeded: usize, failed: usize) {
    span.record("dispatch.succeeded", succeeded);
    span.record("dispatch.failed", failed);
}
