use crate::mutation::Mutation;
use std::fmt;
use thiserror::Error;

/// Why an entry did not reach a successful status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureCause {
    /// Non-retryable status reported for the entry.
    Status { code: i32 },
    /// The round failed as a whole (connection loss, bad top-level response).
    Transport { message: String },
    /// The round ended without a status for the entry.
    MissingStatus,
    /// Still retryable when the retry ceiling was reached.
    RetriesExhausted { rounds: u32, last: Box<FailureCause> },
    /// Still retryable when the call's deadline would have been crossed.
    DeadlineExceeded { elapsed_ms: u64, last: Box<FailureCause> },
}

impl FailureCause {
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::Status { .. })
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::RetriesExhausted { .. } | Self::DeadlineExceeded { .. })
    }

    /// The entry status code behind this cause, if one was reported.
    pub fn code(&self) -> Option<i32> {
        match self {
            Self::Status { code } => Some(*code),
            Self::RetriesExhausted { last, .. } | Self::DeadlineExceeded { last, .. } => {
                last.code()
            }
            Self::Transport { .. } | Self::MissingStatus => None,
        }
    }
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Status { code } => write!(f, "status code {}", code),
            Self::Transport { message } => write!(f, "transport failure: {}", message),
            Self::MissingStatus => write!(f, "no status reported"),
            Self::RetriesExhausted { rounds, last } => {
                write!(f, "retries exhausted after {} rounds ({})", rounds, last)
            }
            Self::DeadlineExceeded { elapsed_ms, last } => {
                write!(f, "deadline exceeded after {}ms ({})", elapsed_ms, last)
            }
        }
    }
}

/// An entry that never succeeded, identified by its position in the
/// caller's original list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedEntry {
    pub index: usize,
    pub entry: Mutation,
    pub cause: FailureCause,
}

/// Returned when at least one mutation of a batch never succeeded.
///
/// `failures` is ordered by original index.
#[derive(Debug, Clone, Error)]
#[error("{} of {total} mutations failed after {rounds} round(s)", .failures.len())]
pub struct PartialFailureError {
    pub failures: Vec<FailedEntry>,
    pub total: usize,
    pub rounds: u32,
}

impl PartialFailureError {
    pub fn name(&self) -> &'static str {
        "PartialFailureError"
    }

    pub fn indexes(&self) -> Vec<usize> {
        self.failures.iter().map(|failure| failure.index).collect()
    }
}
