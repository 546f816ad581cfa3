//! `businesses` lookups for place enrichment.

use crate::enrich::BusinessDirectory;
use crate::error::Result;
use crate::model::BusinessPlace;

impl BusinessDirectory for super::Db {
    async fn place_ids(&self, ids: &[String]) -> Result<Vec<BusinessPlace>> {
        let rows = sqlx::query_as::<_, BusinessPlace>(
            "SELECT id::text AS id, place_id FROM businesses WHERE id::text = ANY($1)",
        )
        .bind(ids)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }
}
