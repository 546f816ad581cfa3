//! Business scan enqueueing.
//!
//! A business may have at most one active (`queued` or `processing`) scan.
//! Requests for businesses that already have one are skipped.

use crate::error::Result;
use crate::model::ItemIds;
use crate::telemetry::metrics;
use opentelemetry::KeyValue;
use serde::Serialize;
use std::collections::HashSet;
use std::future::Future;
use tracing::{info, warn};
use uuid::Uuid;

/// Scan states that count as active.
pub const ACTIVE_STATUSES: [&str; 2] = ["queued", "processing"];

/// Provider recorded on scans enqueued from here.
pub const PROVIDER: &str = "dashboard";

/// Write access to the external scan queue tables.
pub trait ScanQueue {
    /// Which of `ids` already have an active scan.
    fn active_scans(&self, ids: &[String]) -> impl Future<Output = Result<HashSet<String>>> + Send;

    /// Insert one queued scan per id. Returns the number inserted.
    fn insert_scans(
        &self,
        ids: &[String],
        requested_by: Option<Uuid>,
    ) -> impl Future<Output = Result<u64>> + Send;

    /// Flag the businesses themselves as queued.
    fn mark_queued(&self, ids: &[String]) -> impl Future<Output = Result<()>> + Send;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EnqueueReport {
    pub inserted: u64,
    pub skipped: u64,
}

/// Queue a scan for every requested business without an active one.
///
/// If the active-scan lookup fails nothing is inserted and the error is
/// returned, so a business never gets a second active scan.
///
/// Failing to flag the businesses as queued is logged, not returned: the
/// scans themselves are already recorded at that point.
pub async fn enqueue_scans<Q>(
    queue: &Q,
    ids: &ItemIds,
    requested_by: Option<Uuid>,
) -> Result<EnqueueReport>
where
    Q: ScanQueue,
{
    if ids.is_empty() {
        return Ok(EnqueueReport::default());
    }

    let active = queue.active_scans(ids.as_slice()).await?;
    let to_insert: Vec<String> = ids
        .iter()
        .filter(|id| !active.contains(*id))
        .cloned()
        .collect();

    let mut inserted = 0;
    if !to_insert.is_empty() {
        inserted = queue.insert_scans(&to_insert, requested_by).await?;
        if let Err(e) = queue.mark_queued(&to_insert).await {
            warn!(error = %e, "failed to mark businesses as queued");
        }
    }

    let report = EnqueueReport {
        inserted,
        skipped: (ids.len() as u64).saturating_sub(inserted),
    };
    metrics::scans_enqueued().add(report.inserted, &[KeyValue::new("result", "inserted")]);
    metrics::scans_enqueued().add(report.skipped, &[KeyValue::new("result", "skipped")]);
    info!(
        inserted = report.inserted,
        skipped = report.skipped,
        "scans enqueued"
    );
    Ok(report)
}
