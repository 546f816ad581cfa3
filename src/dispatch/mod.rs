//! Bounded-concurrency webhook fan-out.
//!
//! [`BatchDispatcher`] sends one call per identifier, at most `concurrency`
//! at a time, each bounded by its own timeout, and folds the per-item
//! results into a [`DispatchOutcome`](crate::model::DispatchOutcome).

pub mod bounded;
pub mod dispatcher;
pub mod webhook;

pub use dispatcher::{BatchDispatcher, DispatchSettings};
pub use webhook::{PayloadShape, SECRET_HEADER, WebhookClient, WebhookKind, WebhookTarget};

pub use crate::model::{CallError, CallErrorKind, CallResult};
