//! Outbound webhook calls to the workflow engine.

use crate::error::Result;
use crate::model::{CallError, CallResult};
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Value};
use std::fmt;
use tracing::debug;

/// Header carrying the shared secret the receiver authenticates with.
pub const SECRET_HEADER: &str = "x-webhook-secret";

/// The webhooks this backend knows how to call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WebhookKind {
    PlaceEnrich,
    AiScore,
    ScanpointRun,
    ScanpointGenerate,
}

impl WebhookKind {
    /// Environment variable holding this webhook's URL.
    pub fn env_var(self) -> &'static str {
        match self {
            Self::PlaceEnrich => "N8N_BUSINESS_ENRICH_WEBHOOK_URL",
            Self::AiScore => "N8N_AI_ENRICH_WEBHOOK_URL",
            Self::ScanpointRun => "N8N_SCANPOINT_WEBHOOK_URL",
            Self::ScanpointGenerate => "N8N_GENERATE_SCANPOINTS_WEBHOOK_URL",
        }
    }

    /// Short label used in spans and metric attributes.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PlaceEnrich => "place_enrich",
            Self::AiScore => "ai_score",
            Self::ScanpointRun => "scanpoint_run",
            Self::ScanpointGenerate => "scanpoint_generate",
        }
    }
}

impl fmt::Display for WebhookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A configured webhook endpoint. Fixed for the lifetime of the process.
#[derive(Debug, Clone)]
pub struct WebhookTarget {
    pub kind: WebhookKind,
    pub url: String,
    pub secret: Option<SecretString>,
}

impl WebhookTarget {
    pub fn new(kind: WebhookKind, url: impl Into<String>, secret: Option<SecretString>) -> Self {
        Self {
            kind,
            url: url.into(),
            secret,
        }
    }
}

/// JSON body shape for per-item calls: `{ <item_key>: <id>, ...context }`.
///
/// Context fields are forwarded unchanged with every item. The item key
/// wins if a context field shares its name.
#[derive(Debug, Clone)]
pub struct PayloadShape {
    item_key: String,
    context: Map<String, Value>,
}

impl PayloadShape {
    pub fn new(item_key: impl Into<String>) -> Self {
        Self {
            item_key: item_key.into(),
            context: Map::new(),
        }
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn item_key(&self) -> &str {
        &self.item_key
    }

    pub fn build(&self, id: &str) -> Value {
        let mut body = self.context.clone();
        body.insert(self.item_key.clone(), Value::String(id.to_string()));
        Value::Object(body)
    }
}

/// HTTP client bound to one webhook target.
///
/// Cloning is cheap; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct WebhookClient {
    http: reqwest::Client,
    target: WebhookTarget,
}

impl WebhookClient {
    pub fn new(target: WebhookTarget) -> Self {
        Self::with_client(reqwest::Client::new(), target)
    }

    pub fn with_client(http: reqwest::Client, target: WebhookTarget) -> Self {
        Self { http, target }
    }

    pub fn target(&self) -> &WebhookTarget {
        &self.target
    }

    fn request(&self, payload: &Value) -> reqwest::RequestBuilder {
        let mut request = self.http.post(&self.target.url).json(payload);
        if let Some(ref secret) = self.target.secret {
            request = request.header(SECRET_HEADER, secret.expose_secret());
        }
        request
    }

    /// Send one per-item call. Never errors: failures come back as [`CallError`].
    pub async fn post(&self, payload: &Value) -> CallResult {
        debug!(target_kind = %self.target.kind, "posting webhook");
        let response = self
            .request(payload)
            .send()
            .await
            .map_err(|e| CallError::transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(CallError::status(status.as_u16(), &body))
    }

    /// Send a single-shot call and return the status and raw body.
    ///
    /// Transport failures are errors; non-success statuses are not.
    pub async fn post_for_body(&self, payload: &Value) -> Result<(StatusCode, String)> {
        debug!(target_kind = %self.target.kind, "posting webhook");
        let response = self.request(payload).send().await?;
        let status = response.status();
        let body = response.text().await?;
        Ok((status, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn payload_carries_item_and_context() {
        let shape = PayloadShape::new("business_id").with_context("profile_key", "bakery");
        assert_eq!(
            shape.build("b-1"),
            json!({"business_id": "b-1", "profile_key": "bakery"})
        );
    }

    #[test]
    fn item_key_overrides_context() {
        let shape = PayloadShape::new("place_id").with_context("place_id", "stale");
        assert_eq!(shape.build("p-9"), json!({"place_id": "p-9"}));
    }
}
