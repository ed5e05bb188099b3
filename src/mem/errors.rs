//! # Reference Backend Errors
//!
//! Errors carry the exception name a browser engine would report, so
//! callers can match on `name()` the way they would match on
//! `err.name === "ConstraintError"`.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use serde::Serialize;
use thiserror::Error;

use crate::handle::ErrorSignal;

/// Result type for backend calls
pub type EngineResult<T> = Result<T, EngineError>;

/// Exception names reported by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorName {
    /// Transaction aborted
    AbortError,
    /// Other connections hold the database open
    BlockedError,
    /// Uniqueness or existence constraint violated
    ConstraintError,
    /// Invalid key or key path result
    DataError,
    /// Empty or otherwise unusable scope
    InvalidAccessError,
    /// Handle used in the wrong state
    InvalidStateError,
    /// Unknown store, index or database
    NotFoundError,
    /// Write attempted in a read-only transaction
    ReadOnlyError,
    /// Request placed on a finished transaction
    TransactionInactiveError,
    /// Invalid argument
    TypeError,
    /// Requested version is lower than the stored one
    VersionError,
}

impl ErrorName {
    /// Returns the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorName::AbortError => "AbortError",
            ErrorName::BlockedError => "BlockedError",
            ErrorName::ConstraintError => "ConstraintError",
            ErrorName::DataError => "DataError",
            ErrorName::InvalidAccessError => "InvalidAccessError",
            ErrorName::InvalidStateError => "InvalidStateError",
            ErrorName::NotFoundError => "NotFoundError",
            ErrorName::ReadOnlyError => "ReadOnlyError",
            ErrorName::TransactionInactiveError => "TransactionInactiveError",
            ErrorName::TypeError => "TypeError",
            ErrorName::VersionError => "VersionError",
        }
    }
}

impl fmt::Display for ErrorName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A backend failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{name}: {message}")]
pub struct EngineError {
    name: ErrorName,
    message: String,
}

impl EngineError {
    /// Create an error with the given name
    pub fn new(name: ErrorName, message: impl Into<String>) -> Self {
        Self {
            name,
            message: message.into(),
        }
    }

    /// `AbortError`
    pub fn abort(message: impl Into<String>) -> Self {
        Self::new(ErrorName::AbortError, message)
    }

    /// `BlockedError`
    pub fn blocked(message: impl Into<String>) -> Self {
        Self::new(ErrorName::BlockedError, message)
    }

    /// `ConstraintError`
    pub fn constraint(message: impl Into<String>) -> Self {
        Self::new(ErrorName::ConstraintError, message)
    }

    /// `DataError`
    pub fn data(message: impl Into<String>) -> Self {
        Self::new(ErrorName::DataError, message)
    }

    /// `InvalidAccessError`
    pub fn invalid_access(message: impl Into<String>) -> Self {
        Self::new(ErrorName::InvalidAccessError, message)
    }

    /// `InvalidStateError`
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::new(ErrorName::InvalidStateError, message)
    }

    /// `NotFoundError`
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorName::NotFoundError, message)
    }

    /// `ReadOnlyError`
    pub fn read_only(message: impl Into<String>) -> Self {
        Self::new(ErrorName::ReadOnlyError, message)
    }

    /// `TransactionInactiveError`
    pub fn inactive(message: impl Into<String>) -> Self {
        Self::new(ErrorName::TransactionInactiveError, message)
    }

    /// `TypeError`
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(ErrorName::TypeError, message)
    }

    /// `VersionError`
    pub fn version(message: impl Into<String>) -> Self {
        Self::new(ErrorName::VersionError, message)
    }

    /// Exception name
    pub fn name(&self) -> ErrorName {
        self.name
    }

    /// Human-readable message
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Envelope delivered on error, blocked and abort channels
///
/// Clones share one "default prevented" flag, so a listener further down
/// the dispatch chain sees what earlier listeners decided.
#[derive(Debug, Clone)]
pub struct ErrorEvent {
    error: EngineError,
    default_prevented: Rc<Cell<bool>>,
}

impl ErrorEvent {
    pub(crate) fn new(error: EngineError) -> Self {
        Self {
            error,
            default_prevented: Rc::new(Cell::new(false)),
        }
    }

    /// The carried error
    pub fn error(&self) -> &EngineError {
        &self.error
    }

    /// Whether some listener suppressed default handling
    pub fn default_prevented(&self) -> bool {
        self.default_prevented.get()
    }
}

impl ErrorSignal for ErrorEvent {
    type Error = EngineError;

    fn prevent_default(&self) {
        self.default_prevented.set(true);
    }

    fn into_error(self) -> EngineError {
        self.error
    }
}

/// The event loop ran out of work while a future was still pending
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Event loop drained after {turns} turns with the future still pending")]
pub struct Stalled {
    /// Turns run before the loop drained
    pub turns: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EngineError::constraint("key 1 already exists");
        assert_eq!(err.to_string(), "ConstraintError: key 1 already exists");
        assert_eq!(err.name(), ErrorName::ConstraintError);
    }

    #[test]
    fn test_event_clones_share_prevention() {
        let event = ErrorEvent::new(EngineError::data("bad key"));
        let clone = event.clone();

        assert!(!event.default_prevented());
        clone.prevent_default();
        assert!(event.default_prevented());
        assert_eq!(event.into_error().name(), ErrorName::DataError);
    }

    #[test]
    fn test_stalled_display() {
        assert!(Stalled { turns: 3 }.to_string().contains("3 turns"));
    }
}
