//! Retry loop: run a closure until success, exhaustion or cancellation.

use super::classify;
use super::error::FetchError;
use super::policy::{ErrorKind, RetryDecision, RetryPolicy};
use crate::control::AbortToken;

/// The last error once the policy gave up (or the job was cancelled).
#[derive(Debug)]
pub struct Exhausted {
    pub error: FetchError,
    pub attempts: u32,
}

/// Runs `attempt` (given the 1-based attempt number) until it succeeds or the
/// policy says stop. `on_failure` sees every failed attempt with its
/// classification and the decision taken, before any sleep.
pub fn run_with_retry<T, F, R>(
    policy: &RetryPolicy,
    abort: &AbortToken,
    mut attempt: F,
    mut on_failure: R,
) -> Result<T, Exhausted>
where
    F: FnMut(u32) -> Result<T, FetchError>,
    R: FnMut(u32, &FetchError, ErrorKind, RetryDecision),
{
    let mut n = 1u32;
    loop {
        if abort.is_aborted() {
            return Err(Exhausted {
                error: FetchError::Aborted,
                attempts: n - 1,
            });
        }
        let e = match attempt(n) {
            Ok(v) => return Ok(v),
            Err(e) => e,
        };
        let kind = classify::classify(&e);
        let decision = policy.decide(n, kind);
        on_failure(n, &e, kind, decision);
        match decision {
            RetryDecision::NoRetry => return Err(Exhausted { error: e, attempts: n }),
            RetryDecision::RetryAfter(d) => {
                if !abort.sleep(d) {
                    return Err(Exhausted {
                        error: FetchError::Aborted,
                        attempts: n,
                    });
                }
                n += 1;
            }
        }
    }
}
