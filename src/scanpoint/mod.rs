//! Scanpoint workflow triggers.
//!
//! `run` asks the workflow engine to process one scanpoint (or the next
//! pending one). `generate` asks it to create scanpoints around a location
//! and then backfills `city` on the rows it just created, since the
//! generator leaves it empty.

use crate::dispatch::WebhookClient;
use crate::error::{Error, Result};
use crate::model::batch::preview;
use crate::telemetry::metrics;
use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use serde_json::{Value, json};
use std::future::Future;
use std::ops::RangeInclusive;
use std::time::Duration;
use tracing::{info, warn};

pub const DEFAULT_RADIUS: u32 = 3000;
pub const RADIUS_RANGE: RangeInclusive<u32> = 100..=50_000;

/// `source` value written by the generator workflow.
pub const GENERATOR_SOURCE: &str = "n8n_generator";

/// How far back to look for freshly generated scanpoints.
pub fn backfill_window() -> TimeDelta {
    TimeDelta::minutes(2)
}

/// Default wait before backfilling, giving the generator time to insert.
pub const DEFAULT_SETTLE: Duration = Duration::from_secs(2);

/// Access to the external `scanpoints` table.
pub trait ScanpointStore {
    /// Ids of scanpoints created at or after `since` with no city,
    /// optionally restricted to one `source`.
    fn cityless_since(
        &self,
        since: DateTime<Utc>,
        source: Option<&str>,
    ) -> impl Future<Output = Result<Vec<String>>> + Send;

    /// Set `city` on the given scanpoints. Returns the number updated.
    fn set_city(&self, ids: &[String], city: &str) -> impl Future<Output = Result<u64>> + Send;
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

/// Payload for the run webhook.
pub fn run_payload(scanpoint_id: Option<&str>) -> Value {
    match scanpoint_id.map(str::trim).filter(|id| !id.is_empty()) {
        Some(id) => json!({"mode": "id", "scanpoint_id": id}),
        None => json!({"mode": "next"}),
    }
}

/// Trigger a scanpoint run and return the workflow's response.
///
/// A JSON body is returned parsed; anything else comes back as a string.
pub async fn run_scanpoint(client: &WebhookClient, scanpoint_id: Option<&str>) -> Result<Value> {
    let (status, body) = client.post_for_body(&run_payload(scanpoint_id)).await?;
    if !status.is_success() {
        warn!(status = status.as_u16(), "scanpoint run webhook failed");
        return Err(Error::Webhook {
            status: status.as_u16(),
            details: preview(&body),
        });
    }
    Ok(parse_body(&body))
}

fn parse_body(body: &str) -> Value {
    if body.is_empty() {
        return Value::Null;
    }
    serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.to_string()))
}

// ---------------------------------------------------------------------------
// Generate
// ---------------------------------------------------------------------------

/// A validated request to generate scanpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerateRequest {
    pub location: String,
    pub radius: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub place_type: Option<String>,
}

impl GenerateRequest {
    pub fn new(
        location: &str,
        radius: Option<i64>,
        query: Option<&str>,
        place_type: Option<&str>,
    ) -> Result<Self> {
        let location = location.trim();
        if location.is_empty() {
            return Err(Error::Validation("location required".to_string()));
        }

        let radius = match radius {
            None => DEFAULT_RADIUS,
            Some(r) => u32::try_from(r)
                .ok()
                .filter(|r| RADIUS_RANGE.contains(r))
                .ok_or_else(radius_error)?,
        };

        let non_blank = |v: Option<&str>| v.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string);
        let query = non_blank(query);
        let place_type = non_blank(place_type);
        if query.is_none() && place_type.is_none() {
            return Err(Error::Validation(
                "At least one of query or type must be provided".to_string(),
            ));
        }

        Ok(Self {
            location: location.to_string(),
            radius,
            query,
            place_type,
        })
    }

    /// Validate a JSON request body.
    ///
    /// `radius` may be a number or numeric string and is floored; blank or
    /// missing means the default. Scalar `location`, `query` and `type`
    /// values are stringified.
    pub fn from_json(body: &Value) -> Result<Self> {
        let body = body
            .as_object()
            .ok_or_else(|| Error::Validation("Invalid JSON body".to_string()))?;

        let location = body.get("location").and_then(scalar_string).unwrap_or_default();
        let radius = match body.get("radius") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if s.trim().is_empty() => None,
            Some(Value::String(s)) => Some(floor_radius(s.trim().parse().ok())?),
            Some(Value::Number(n)) => Some(floor_radius(n.as_f64())?),
            Some(_) => return Err(radius_error()),
        };
        let query = body.get("query").and_then(scalar_string);
        let place_type = body.get("type").and_then(scalar_string);

        Self::new(&location, radius, query.as_deref(), place_type.as_deref())
    }

    /// Body sent to the generator webhook.
    pub fn payload(&self) -> Value {
        let mut payload = serde_json::to_value(self).unwrap_or_else(|_| json!({}));
        if let Value::Object(ref mut map) = payload {
            map.insert(
                "location_label".to_string(),
                Value::String(self.location.clone()),
            );
        }
        payload
    }
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn floor_radius(value: Option<f64>) -> Result<i64> {
    value
        .filter(|v| v.is_finite())
        .map(|v| v.floor() as i64)
        .ok_or_else(radius_error)
}

fn radius_error() -> Error {
    Error::Validation(format!(
        "radius must be an integer between {} and {}",
        RADIUS_RANGE.start(),
        RADIUS_RANGE.end()
    ))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GenerateReport {
    pub ok: bool,
    pub patched: u64,
}

/// Trigger scanpoint generation, then backfill city on the new rows.
///
/// Only the webhook call can fail this; backfill problems are logged and
/// reported as `patched: 0`.
pub async fn generate_scanpoints<S>(
    client: &WebhookClient,
    store: &S,
    request: &GenerateRequest,
    settle: Duration,
) -> Result<GenerateReport>
where
    S: ScanpointStore,
{
    let (status, body) = client.post_for_body(&request.payload()).await?;
    if !status.is_success() {
        warn!(status = status.as_u16(), "scanpoint generator webhook failed");
        return Err(Error::Webhook {
            status: status.as_u16(),
            details: preview(&body),
        });
    }

    tokio::time::sleep(settle).await;
    let since = Utc::now() - backfill_window();
    let patched = backfill_city(store, &request.location, since).await;
    Ok(GenerateReport { ok: true, patched })
}

/// Set `city` on cityless scanpoints created since `since`.
///
/// Rows tagged with the generator's source are preferred; if there are
/// none, any cityless row in the window is patched.
pub async fn backfill_city<S>(store: &S, city: &str, since: DateTime<Utc>) -> u64
where
    S: ScanpointStore,
{
    let rows = match store.cityless_since(since, Some(GENERATOR_SOURCE)).await {
        Ok(rows) if !rows.is_empty() => rows,
        _ => match store.cityless_since(since, None).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %e, "scanpoint backfill select failed");
                return 0;
            }
        },
    };
    if rows.is_empty() {
        return 0;
    }

    match store.set_city(&rows, city).await {
        Ok(patched) => {
            metrics::scanpoints_patched().add(patched, &[]);
            info!(patched, city, "scanpoint city backfilled");
            patched
        }
        Err(e) => {
            warn!(error = %e, "scanpoint backfill update failed");
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_payload_modes() {
        assert_eq!(
            run_payload(Some("sp-1")),
            json!({"mode": "id", "scanpoint_id": "sp-1"})
        );
        assert_eq!(run_payload(None), json!({"mode": "next"}));
        assert_eq!(run_payload(Some(" ")), json!({"mode": "next"}));
    }

    #[test]
    fn parse_body_falls_back_to_text() {
        assert_eq!(parse_body(""), Value::Null);
        assert_eq!(parse_body(r#"{"ok":true}"#), json!({"ok": true}));
        assert_eq!(parse_body("queued"), json!("queued"));
    }

    #[test]
    fn payload_includes_location_label_and_skips_blank_fields() {
        let req = GenerateRequest::new("Utrecht", None, Some("bakery"), None).unwrap();
        assert_eq!(
            req.payload(),
            json!({
                "location": "Utrecht",
                "radius": 3000,
                "query": "bakery",
                "location_label": "Utrecht"
            })
        );
    }
}
