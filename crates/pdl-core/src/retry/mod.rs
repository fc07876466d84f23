//! Per-chunk retry policy.
//!
//! Error classification (timeouts, throttling, connection, HTTP status,
//! storage) and the fixed-interval retry loop shared by the chunk workers.
//! Sleeps between attempts go through [`AbortToken::sleep`](crate::control::AbortToken::sleep)
//! so cancellation is observed mid-wait.

mod classify;
mod error;
mod policy;
mod run;

pub use classify::{classify, classify_http_status, classify_transport};
pub use error::FetchError;
pub use policy::{ErrorKind, RetryDecision, RetryPolicy};
pub use run::{run_with_retry, Exhausted};
