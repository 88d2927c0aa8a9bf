//! Batch retry coordination.
//!
//! A call starts with every mutation pending. Each round submits the
//! pending entries as one request, then keeps only those that came back
//! with a retryable status (or whose round failed outright). Rounds are
//! strictly sequential and separated by [`Backoff`] delays; the call
//! resolves once nothing is pending or the retry ceiling is reached.

mod backoff;
mod coordinator;
mod failure;
mod round;

pub use backoff::Backoff;
pub use coordinator::BatchMutator;
pub use failure::{FailedEntry, FailureCause, PartialFailureError};
