//! `business_scans` queue writes.

use crate::error::Result;
use crate::scan::{ACTIVE_STATUSES, PROVIDER, ScanQueue};
use std::collections::HashSet;
use uuid::Uuid;

impl ScanQueue for super::Db {
    async fn active_scans(&self, ids: &[String]) -> Result<HashSet<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT DISTINCT business_id::text FROM business_scans
             WHERE business_id::text = ANY($1) AND status::text = ANY($2)",
        )
        .bind(ids)
        .bind(&ACTIVE_STATUSES[..])
        .fetch_all(self.pool())
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn insert_scans(&self, ids: &[String], requested_by: Option<Uuid>) -> Result<u64> {
        // Insert via the businesses table so business_id keeps its native type.
        let inserted = sqlx::query(
            "INSERT INTO business_scans (business_id, status, provider, requested_by)
             SELECT b.id, 'queued', $2, $3 FROM businesses b WHERE b.id::text = ANY($1)",
        )
        .bind(ids)
        .bind(PROVIDER)
        .bind(requested_by)
        .execute(self.pool())
        .await?
        .rows_affected();
        Ok(inserted)
    }

    async fn mark_queued(&self, ids: &[String]) -> Result<()> {
        sqlx::query("UPDATE businesses SET scan_status = 'queued' WHERE id::text = ANY($1)")
            .bind(ids)
            .execute(self.pool())
            .await?;
        Ok(())
    }
}
