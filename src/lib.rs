//! # leadgen-dispatch
//!
//! Backend for the lead-generation dashboard: fans "enrich selected"
//! requests out to workflow-engine webhooks with bounded concurrency, and
//! triggers the scan and scanpoint workflows.
//!
//! The dispatcher core lives in [`dispatch`]; [`enrich`], [`scan`] and
//! [`scanpoint`] are the flows built on it, with [`db`] providing the
//! Postgres-backed stores they read from.

pub mod address;
pub mod config;
pub mod db;
pub mod dispatch;
pub mod enrich;
pub mod error;
pub mod model;
pub mod scan;
pub mod scanpoint;
pub mod telemetry;
