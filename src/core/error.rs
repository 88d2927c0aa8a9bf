use crate::batch::PartialFailureError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MutateError {
    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Decoding error: {0}")]
    Decoding(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    PartialFailure(#[from] PartialFailureError),

    #[error("Lock error: {0}")]
    LockError(String),
}

impl MutateError {
    /// Stable error name, matching the names callers of the wire client check against.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Encoding(_) => "EncodingError",
            Self::Decoding(_) => "DecodingError",
            Self::Transport(_) => "TransportError",
            Self::InvalidConfig(_) => "InvalidConfigError",
            Self::PartialFailure(_) => "PartialFailureError",
            Self::LockError(_) => "LockError",
        }
    }

    pub fn as_partial_failure(&self) -> Option<&PartialFailureError> {
        match self {
            Self::PartialFailure(err) => Some(err),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, MutateError>;

impl<T> From<std::sync::PoisonError<T>> for MutateError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}

impl From<serde_json::Error> for MutateError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidConfig(err.to_string())
    }
}
