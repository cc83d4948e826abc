//! Bounded retry with backoff.
//!
//! Used where the harness tolerates transient failures (local time sync).
//! Download iterations are deliberately not retried.

mod policy;
mod run;

pub use policy::{RetryDecision, RetryPolicy};
pub use run::run_with_retry;
