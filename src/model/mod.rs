//! Core data model.
//!
//! A batch is a set of opaque identifiers; dispatching it yields an outcome
//! that accounts for every identifier exactly once.

pub mod batch;
pub mod business;

pub use batch::{CallError, CallErrorKind, CallResult, DispatchOutcome, Failure, ItemIds};
pub use business::BusinessPlace;
