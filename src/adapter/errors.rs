//! # Adapter Errors
//!
//! Rejection reasons for adapter futures. Engine failures keep their
//! original payload; the adapter never wraps the event envelope.

use thiserror::Error;

/// Result type for adapter futures
pub type AdapterResult<T, E> = Result<T, AdapterError<E>>;

/// Why an adapter future rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdapterError<E> {
    /// The operation reported an error
    #[error("Operation failed: {0}")]
    Operation(E),

    /// An exclusive-resource handle could not proceed
    #[error("Operation blocked: {0}")]
    Blocked(E),

    /// The enclosing scope aborted or reported an error
    #[error("Transaction aborted: {0}")]
    Aborted(E),

    /// The scope completed before the operation delivered its result
    #[error("Scope completed without a result from the operation")]
    MissingResult,

    /// The handle was dropped without a terminal signal
    #[error("Handle dropped before delivering a terminal signal")]
    Abandoned,
}

impl<E> AdapterError<E> {
    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            AdapterError::Operation(_) => "OPERATION_FAILED",
            AdapterError::Blocked(_) => "BLOCKED",
            AdapterError::Aborted(_) => "ABORTED",
            AdapterError::MissingResult => "MISSING_RESULT",
            AdapterError::Abandoned => "ABANDONED",
        }
    }

    /// The engine payload, if the engine reported one
    pub fn payload(&self) -> Option<&E> {
        match self {
            AdapterError::Operation(e) | AdapterError::Blocked(e) | AdapterError::Aborted(e) => {
                Some(e)
            }
            AdapterError::MissingResult | AdapterError::Abandoned => None,
        }
    }

    /// Consume the error, returning the engine payload
    pub fn into_inner(self) -> Option<E> {
        match self {
            AdapterError::Operation(e) | AdapterError::Blocked(e) | AdapterError::Aborted(e) => {
                Some(e)
            }
            AdapterError::MissingResult | AdapterError::Abandoned => None,
        }
    }
}
