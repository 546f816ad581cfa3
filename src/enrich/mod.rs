//! "Enrich selected" flows built on the batch dispatcher.
//!
//! Two flows, each with one fixed payload shape:
//! - place enrichment posts `{"place_id": ..}` for every business that has one;
//! - AI scoring posts `{"business_id": .., "profile_key": ..}` per business.

use crate::dispatch::{BatchDispatcher, PayloadShape};
use crate::error::{Error, Result};
use crate::model::{BusinessPlace, DispatchOutcome, ItemIds};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use tracing::info;

/// Read access to business rows, provided by the external store.
pub trait BusinessDirectory {
    /// Rows for the given business ids. Unknown ids are simply absent.
    fn place_ids(&self, ids: &[String]) -> impl Future<Output = Result<Vec<BusinessPlace>>> + Send;
}

// ---------------------------------------------------------------------------
// Request parsing
// ---------------------------------------------------------------------------

/// Extract `business_ids` from a JSON request body.
pub fn parse_business_ids(body: &Value) -> Result<ItemIds> {
    let body = body
        .as_object()
        .ok_or_else(|| Error::Validation("Invalid JSON body".to_string()))?;
    ItemIds::from_json(body.get("business_ids").unwrap_or(&Value::Null))
}

/// Extract and trim `profile_key` from a JSON request body.
pub fn parse_profile_key(body: &Value) -> Result<String> {
    let key = body
        .get("profile_key")
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default();
    validate_profile_key(key).map(str::to_string)
}

fn validate_profile_key(key: &str) -> Result<&str> {
    let key = key.trim();
    if key.is_empty() {
        return Err(Error::Validation(
            "profile_key is required and must be a non-empty string".to_string(),
        ));
    }
    Ok(key)
}

// ---------------------------------------------------------------------------
// Place enrichment
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EnrichReport {
    pub requested: usize,
    pub skipped_no_place_id: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub failures: Vec<EnrichFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnrichFailure {
    pub business_id: String,
    pub place_id: String,
    pub reason: String,
}

/// Trigger place enrichment for every requested business with a place id.
///
/// Businesses that are unknown or have a blank place id are counted as
/// skipped. An empty request returns an all-zero report without touching
/// the store.
pub async fn enrich_places<D>(
    directory: &D,
    dispatcher: &BatchDispatcher,
    ids: &ItemIds,
) -> Result<EnrichReport>
where
    D: BusinessDirectory,
{
    let mut report = EnrichReport {
        requested: ids.len(),
        ..Default::default()
    };
    if ids.is_empty() {
        return Ok(report);
    }

    let places: HashMap<String, String> = directory
        .place_ids(ids.as_slice())
        .await?
        .into_iter()
        .filter(|row| ids.contains(&row.id))
        .filter_map(|row| {
            let place = row.usable_place_id()?.to_string();
            Some((row.id, place))
        })
        .collect();

    let with_place: ItemIds = ids
        .iter()
        .filter(|id| places.contains_key(*id))
        .cloned()
        .collect();
    report.skipped_no_place_id = ids.len() - with_place.len();
    if with_place.is_empty() {
        info!(
            requested = report.requested,
            "no requested business has a place id"
        );
        return Ok(report);
    }

    let shape = PayloadShape::new("place_id");
    let outcome = dispatcher
        .dispatch(&with_place, |id| {
            shape.build(places.get(id).map(String::as_str).unwrap_or_default())
        })
        .await;

    report.succeeded = outcome.succeeded_count();
    report.failed = outcome.failed_count();
    report.failures = outcome
        .failed
        .into_iter()
        .map(|f| EnrichFailure {
            place_id: places.get(&f.id).cloned().unwrap_or_default(),
            business_id: f.id,
            reason: f.reason,
        })
        .collect();
    Ok(report)
}

// ---------------------------------------------------------------------------
// AI scoring
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScoringReport {
    pub requested: usize,
    pub succeeded: usize,
    pub failed: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<ScoringFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoringFailure {
    pub business_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    pub reason: String,
}

impl ScoringReport {
    fn from_outcome(requested: usize, outcome: DispatchOutcome) -> Self {
        Self {
            requested,
            succeeded: outcome.succeeded_count(),
            failed: outcome.failed_count(),
            failures: outcome
                .failed
                .into_iter()
                .map(|f| ScoringFailure {
                    business_id: f.id,
                    status: f.status,
                    reason: f.reason,
                })
                .collect(),
        }
    }

    /// Summary line for callers that surface partial failure as an error.
    pub fn failure_summary(&self) -> Option<String> {
        (self.failed > 0).then(|| {
            format!(
                "{} of {} webhook call(s) failed",
                self.failed, self.requested
            )
        })
    }
}

/// Ask the AI scoring workflow to score each business against a profile.
///
/// Unlike place enrichment, an empty id list is a validation error here.
pub async fn score_businesses(
    dispatcher: &BatchDispatcher,
    ids: &ItemIds,
    profile_key: &str,
) -> Result<ScoringReport> {
    let profile_key = validate_profile_key(profile_key)?;
    if ids.is_empty() {
        return Err(Error::Validation(
            "No valid business IDs provided".to_string(),
        ));
    }

    info!(count = ids.len(), profile_key, "sending ids for scoring");
    let shape = PayloadShape::new("business_id").with_context("profile_key", profile_key);
    let outcome = dispatcher.dispatch(ids, |id| shape.build(id)).await;
    Ok(ScoringReport::from_outcome(ids.len(), outcome))
}
