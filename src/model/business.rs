//! Rows read from the external `businesses` table.

use serde::{Deserialize, Serialize};

/// A business and the place identifier used to enrich it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct BusinessPlace {
    pub id: String,
    pub place_id: Option<String>,
}

impl BusinessPlace {
    /// The trimmed place id, or `None` if missing or blank.
    pub fn usable_place_id(&self) -> Option<&str> {
        self.place_id
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }
}
