//! The worker dispatcher: the orchestration point that turns one queued
//! [`CanonicalEvent`] into a posted forge review (or a documented skip).
//!
//! [`Dispatcher::dispatch_one`] runs the full pipeline for a single
//! message: idempotency claim, forge-app authentication, PR/file fetch,
//! skip-policy evaluation, repo policy load, context building, the
//! two-stage LLM pipeline, sanitization, verdict derivation, rendering,
//! and posting. [`Dispatcher::dispatch_batch`] drives a batch of messages
//! through it and reports which ones failed, in the shape a FIFO queue's
//! batch-processing handler returns to drive redelivery of only the
//! failed subset.

mod dispatch;
mod error;

pub use dispatch::{DispatchOutcome, Dispatcher};
pub use error::DispatchError;
