//! Batch input and outcome types.

use crate::error::{Error, Result};
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::time::Duration;

/// Maximum characters of a response body kept in a failure reason.
pub const PREVIEW_CHARS: usize = 200;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// Trimmed, non-blank, deduplicated identifiers for one batch.
///
/// Deduplication is by value. First-occurrence order is kept so logs are
/// stable, but nothing depends on it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemIds(Vec<String>);

impl ItemIds {
    pub fn new<I, S>(raw: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let ids = raw
            .into_iter()
            .map(|id| id.as_ref().trim().to_string())
            .filter(|id| !id.is_empty())
            .filter(|id| seen.insert(id.clone()))
            .collect();
        Self(ids)
    }

    /// Parse a JSON array of strings.
    ///
    /// Anything other than an array whose elements are all strings is a
    /// validation error; blank strings are dropped afterwards.
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        let invalid = || Error::Validation("business_ids must be an array of strings".to_string());
        let items = value.as_array().ok_or_else(invalid)?;
        let ids = items
            .iter()
            .map(|item| item.as_str().ok_or_else(invalid))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(ids))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn contains(&self, id: &str) -> bool {
        self.0.iter().any(|x| x == id)
    }
}

impl FromIterator<String> for ItemIds {
    fn from_iter<T: IntoIterator<Item = String>>(iter: T) -> Self {
        Self::new(iter)
    }
}

impl IntoIterator for ItemIds {
    type Item = String;
    type IntoIter = std::vec::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

// ---------------------------------------------------------------------------
// Per-call result
// ---------------------------------------------------------------------------

/// How a single item's call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallErrorKind {
    /// The receiver answered with a non-success status.
    Status,
    /// No answer within the per-call timeout.
    Timeout,
    /// The request never got a response (connect, TLS, send).
    Transport,
}

/// Why a single item's call failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallError {
    pub kind: CallErrorKind,
    /// HTTP status, when the receiver answered at all.
    pub status: Option<u16>,
    pub reason: String,
}

impl CallError {
    /// Non-success HTTP status with a truncated body preview.
    pub fn status(status: u16, body: &str) -> Self {
        Self {
            kind: CallErrorKind::Status,
            status: Some(status),
            reason: format!("HTTP {status}: {}", preview(body)),
        }
    }

    pub fn timeout(after: Duration) -> Self {
        Self {
            kind: CallErrorKind::Timeout,
            status: None,
            reason: format!("timed out after {after:?}"),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            kind: CallErrorKind::Transport,
            status: None,
            reason: message.into(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == CallErrorKind::Timeout
    }
}

impl fmt::Display for CallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason)
    }
}

impl std::error::Error for CallError {}

pub type CallResult = std::result::Result<(), CallError>;

/// First [`PREVIEW_CHARS`] characters of `body`, with `...` if cut.
pub fn preview(body: &str) -> String {
    match body.char_indices().nth(PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &body[..cut]),
        None => body.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// One failed identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    pub reason: String,
}

impl Failure {
    pub fn new(id: impl Into<String>, error: CallError) -> Self {
        Self {
            id: id.into(),
            status: error.status,
            reason: error.reason,
        }
    }
}

/// Aggregated result of one batch.
///
/// Every dispatched identifier is in exactly one of `succeeded` or `failed`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchOutcome {
    pub succeeded: BTreeSet<String>,
    pub failed: Vec<Failure>,
}

impl DispatchOutcome {
    pub fn record(&mut self, id: String, result: CallResult) {
        match result {
            Ok(()) => {
                self.succeeded.insert(id);
            }
            Err(error) => self.failed.push(Failure::new(id, error)),
        }
    }

    pub fn succeeded_count(&self) -> usize {
        self.succeeded.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn failed_ids(&self) -> impl Iterator<Item = &str> {
        self.failed.iter().map(|f| f.id.as_str())
    }
}
