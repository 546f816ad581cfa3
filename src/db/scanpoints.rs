//! `scanpoints` city backfill.

use crate::error::Result;
use crate::scanpoint::ScanpointStore;
use chrono::{DateTime, Utc};

impl ScanpointStore for super::Db {
    async fn cityless_since(
        &self,
        since: DateTime<Utc>,
        source: Option<&str>,
    ) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT id::text FROM scanpoints
             WHERE created_at >= $1
               AND (city IS NULL OR city = '')
               AND ($2::text IS NULL OR source = $2)",
        )
        .bind(since)
        .bind(source)
        .fetch_all(self.pool())
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn set_city(&self, ids: &[String], city: &str) -> Result<u64> {
        let updated = sqlx::query("UPDATE scanpoints SET city = $1 WHERE id::text = ANY($2)")
            .bind(city)
            .bind(ids)
            .execute(self.pool())
            .await?
            .rows_affected();
        Ok(updated)
    }
}
