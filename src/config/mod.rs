//! Typed configuration from environment variables.
//!
//! Loads once at startup and is then passed by reference to whatever needs
//! it. Nothing is required up front: each flow asks for the value it needs
//! and fails with [`Error::Config`] before doing any work if it is absent.
//! Sensitive values are wrapped in secrecy::SecretString to prevent log leaks.

use crate::dispatch::{DispatchSettings, WebhookKind, WebhookTarget};
use crate::error::{Error, Result};
use secrecy::SecretString;
use std::time::Duration;

pub const DEFAULT_CONCURRENCY: usize = 3;
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug)]
pub struct Config {
    pub database_url: Option<SecretString>,
    pub place_enrich_webhook: Option<WebhookTarget>,
    pub ai_score_webhook: Option<WebhookTarget>,
    pub scanpoint_run_webhook: Option<WebhookTarget>,
    pub scanpoint_generate_webhook: Option<WebhookTarget>,
    pub dispatch: DispatchSettings,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// Blank values are treated as unset.
    pub fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let secret = var("N8N_WEBHOOK_SECRET").map(SecretString::from);
        let target = |kind: WebhookKind| {
            var(kind.env_var()).map(|url| WebhookTarget::new(kind, url, secret.clone()))
        };

        let concurrency = match var("DISPATCH_CONCURRENCY") {
            Some(raw) => parse_var::<usize>("DISPATCH_CONCURRENCY", &raw)?,
            None => DEFAULT_CONCURRENCY,
        };
        if concurrency == 0 {
            return Err(Error::Config(
                "DISPATCH_CONCURRENCY must be at least 1".to_string(),
            ));
        }
        let call_timeout = match var("DISPATCH_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(parse_var::<u64>("DISPATCH_TIMEOUT_SECS", &raw)?),
            None => DEFAULT_CALL_TIMEOUT,
        };

        Ok(Self {
            database_url: var("DATABASE_URL").map(SecretString::from),
            place_enrich_webhook: target(WebhookKind::PlaceEnrich),
            ai_score_webhook: target(WebhookKind::AiScore),
            scanpoint_run_webhook: target(WebhookKind::ScanpointRun),
            scanpoint_generate_webhook: target(WebhookKind::ScanpointGenerate),
            dispatch: DispatchSettings {
                concurrency,
                call_timeout,
            },
            otel_endpoint: var("OTEL_ENDPOINT"),
            log_level: var("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// The target for `kind`, or a configuration error naming its variable.
    pub fn webhook(&self, kind: WebhookKind) -> Result<&WebhookTarget> {
        let target = match kind {
            WebhookKind::PlaceEnrich => &self.place_enrich_webhook,
            WebhookKind::AiScore => &self.ai_score_webhook,
            WebhookKind::ScanpointRun => &self.scanpoint_run_webhook,
            WebhookKind::ScanpointGenerate => &self.scanpoint_generate_webhook,
        };
        target.as_ref().ok_or_else(|| missing(kind.env_var()))
    }

    /// The database URL, or a configuration error naming the variable.
    pub fn require_database_url(&self) -> Result<&SecretString> {
        self.database_url
            .as_ref()
            .ok_or_else(|| missing("DATABASE_URL"))
    }
}

/// Error for a required variable that is not set.
pub fn missing(name: &str) -> Error {
    Error::Config(format!("{name} not configured"))
}

fn parse_var<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.parse()
        .map_err(|_| Error::Config(format!("{name} has invalid value {raw:?}")))
}
