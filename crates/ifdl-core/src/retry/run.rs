//! Retry loop: run a closure until success or policy says stop.

use super::policy::{RetryDecision, RetryPolicy};
use crate::poll::Sleeper;

/// Runs `f` until it succeeds or the policy says to stop. `on_failure` sees
/// every failed attempt together with the decision taken for it, so callers
/// can log "will retry" and "giving up" differently.
pub fn run_with_retry<T, E, F, L>(
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
    mut f: F,
    mut on_failure: L,
) -> Result<T, E>
where
    F: FnMut(u32) -> Result<T, E>,
    L: FnMut(u32, &E, RetryDecision),
{
    let mut attempt = 1u32;
    loop {
        match f(attempt) {
            Ok(v) => return Ok(v),
            Err(e) => {
                let decision = policy.decide(attempt);
                on_failure(attempt, &e, decision);
                match decision {
                    RetryDecision::NoRetry => return Err(e),
                    RetryDecision::RetryAfter(d) => {
                        if !d.is_zero() {
                            sleeper.sleep(d);
                        }
                        attempt += 1;
                    }
                }
            }
        }
    }
}
