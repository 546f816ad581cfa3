//! Batch dispatcher: dedup, chunk, call with timeout, aggregate.

use super::bounded::run_chunked;
use super::webhook::{WebhookClient, WebhookKind, WebhookTarget};
use crate::config::{Config, DEFAULT_CALL_TIMEOUT, DEFAULT_CONCURRENCY};
use crate::error::Result;
use crate::model::{CallError, CallErrorKind, CallResult, DispatchOutcome, ItemIds};
use crate::telemetry::dispatch::{record_batch_outcome, start_batch_span, start_call_span};
use crate::telemetry::metrics;
use opentelemetry::KeyValue;
use serde_json::Value;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{Instrument, debug, info, warn};

/// Concurrency limit and per-call timeout, fixed at process start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSettings {
    /// Maximum calls in flight; also the chunk size.
    pub concurrency: usize,
    /// Upper bound on each individual call.
    pub call_timeout: Duration,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }
}

/// Fans per-item webhook calls out in chunks of `concurrency`.
///
/// Item failures are collected into the outcome and never abort the batch.
/// There are no retries: callers re-submit the failed subset if they want one.
#[derive(Debug, Clone)]
pub struct BatchDispatcher {
    settings: DispatchSettings,
    webhook: WebhookClient,
}

impl BatchDispatcher {
    pub fn new(settings: &DispatchSettings, target: &WebhookTarget) -> Self {
        Self::with_client(settings, WebhookClient::new(target.clone()))
    }

    pub fn with_client(settings: &DispatchSettings, webhook: WebhookClient) -> Self {
        Self {
            settings: *settings,
            webhook,
        }
    }

    /// Build a dispatcher for one configured webhook.
    ///
    /// Fails with a configuration error if that webhook's URL is unset.
    pub fn from_config(config: &Config, kind: WebhookKind) -> Result<Self> {
        let target = config.webhook(kind)?;
        Ok(Self::new(&config.dispatch, target))
    }

    pub fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    pub fn kind(&self) -> WebhookKind {
        self.webhook.target().kind
    }

    /// POST `payload(id)` to the configured webhook for every id.
    pub async fn dispatch<P>(&self, ids: &ItemIds, payload: P) -> DispatchOutcome
    where
        P: Fn(&str) -> Value,
    {
        let webhook = &self.webhook;
        self.dispatch_with(ids, |id| {
            let body = payload(&id);
            async move { webhook.post(&body).await }
        })
        .await
    }

    /// Run an arbitrary per-item call for every id under the same
    /// concurrency and timeout rules as [`dispatch`](Self::dispatch).
    pub async fn dispatch_with<F, Fut>(&self, ids: &ItemIds, call: F) -> DispatchOutcome
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = CallResult>,
    {
        let mut outcome = DispatchOutcome::default();
        if ids.is_empty() {
            debug!(target_kind = %self.kind(), "empty batch, nothing to dispatch");
            return outcome;
        }

        let kind = self.kind();
        let timeout = self.settings.call_timeout;
        let batch_span = start_batch_span(kind.as_str(), ids.len(), self.settings.concurrency);
        let started = Instant::now();

        let results = run_chunked(ids.as_slice().to_vec(), self.settings.concurrency, |id| {
            let call_span = start_call_span(kind.as_str(), &id);
            let pending = call(id.clone());
            async move {
                let call_started = Instant::now();
                let result = match tokio::time::timeout(timeout, pending).await {
                    Ok(result) => result,
                    Err(_) => Err(CallError::timeout(timeout)),
                };
                record_call(kind, &result, call_started.elapsed());
                (id, result)
            }
            .instrument(call_span)
        })
        .instrument(batch_span.clone())
        .await;

        for (id, result) in results {
            if let Err(ref e) = result {
                warn!(target_kind = %kind, id = %id, reason = %e.reason, "webhook call failed");
            }
            outcome.record(id, result);
        }

        record_batch_outcome(
            &batch_span,
            outcome.succeeded_count(),
            outcome.failed_count(),
        );
        metrics::dispatch_batches().add(1, &[KeyValue::new("target", kind.as_str())]);
        info!(
            target_kind = %kind,
            requested = ids.len(),
            succeeded = outcome.succeeded_count(),
            failed = outcome.failed_count(),
            duration_ms = started.elapsed().as_millis() as u64,
            "batch dispatched"
        );

        outcome
    }
}

/// `result` label for the call counter.
fn result_label(result: &CallResult) -> &'static str {
    match result {
        Ok(()) => "ok",
        Err(e) => match e.kind {
            CallErrorKind::Timeout => "timeout",
            CallErrorKind::Status | CallErrorKind::Transport => "error",
        },
    }
}

fn record_call(kind: WebhookKind, result: &CallResult, elapsed: Duration) {
    metrics::dispatch_calls().add(
        1,
        &[
            KeyValue::new("target", kind.as_str()),
            KeyValue::new("result", result_label(result)),
        ],
    );

    let mut attributes = vec![KeyValue::new("target", kind.as_str())];
    if let Err(CallError {
        status: Some(status),
        ..
    }) = result
    {
        attributes.push(KeyValue::new(
            opentelemetry_semantic_conventions::attribute::HTTP_RESPONSE_STATUS_CODE,
            i64::from(*status),
        ));
    }
    metrics::call_duration_ms().record(elapsed.as_secs_f64() * 1000.0, &attributes);
}
