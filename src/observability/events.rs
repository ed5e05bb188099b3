//! Observable events
//!
//! Every log line emitted by the adapter or the reference backend names
//! one of these events.

use std::fmt;

use super::logger::Severity;

/// Observable events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    // Adapter
    /// A future resolved with a value
    RequestResolved,
    /// A future rejected with an error
    RequestRejected,
    /// An exclusive-resource handle reported contention
    RequestBlocked,
    /// A scoped result was captured and awaits scope completion
    ResultDeferred,
    /// A scope completed
    ScopeCommitted,
    /// A scope aborted or reported an error
    ScopeAborted,
    /// A traversal reached end of sequence
    CursorExhausted,
    /// A step callback stopped a traversal early
    CursorStopped,
    /// A repeated key was skipped in a unique traversal
    DuplicateSkipped,
    /// An error signal's default propagation was suppressed
    ErrorSuppressed,

    // Reference backend
    /// A connection was opened
    DatabaseOpened,
    /// A database moved to a new version
    DatabaseUpgraded,
    /// A database was deleted
    DatabaseDeleted,
    /// An open or delete request is waiting on other connections
    OpenBlocked,
    /// A transaction committed
    TransactionCommitted,
    /// A transaction aborted and rolled back
    TransactionAborted,
    /// An error event reached the global channel
    UnhandledError,
}

impl Event {
    /// Returns the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::RequestResolved => "REQUEST_RESOLVED",
            Event::RequestRejected => "REQUEST_REJECTED",
            Event::RequestBlocked => "REQUEST_BLOCKED",
            Event::ResultDeferred => "RESULT_DEFERRED",
            Event::ScopeCommitted => "SCOPE_COMMITTED",
            Event::ScopeAborted => "SCOPE_ABORTED",
            Event::CursorExhausted => "CURSOR_EXHAUSTED",
            Event::CursorStopped => "CURSOR_STOPPED",
            Event::DuplicateSkipped => "DUPLICATE_SKIPPED",
            Event::ErrorSuppressed => "ERROR_SUPPRESSED",
            Event::DatabaseOpened => "DATABASE_OPENED",
            Event::DatabaseUpgraded => "DATABASE_UPGRADED",
            Event::DatabaseDeleted => "DATABASE_DELETED",
            Event::OpenBlocked => "OPEN_BLOCKED",
            Event::TransactionCommitted => "TRANSACTION_COMMITTED",
            Event::TransactionAborted => "TRANSACTION_ABORTED",
            Event::UnhandledError => "UNHANDLED_ERROR",
        }
    }

    /// Severity the event is logged at
    pub fn severity(&self) -> Severity {
        match self {
            Event::RequestBlocked | Event::OpenBlocked | Event::UnhandledError => Severity::Warn,
            Event::DatabaseOpened
            | Event::DatabaseUpgraded
            | Event::DatabaseDeleted
            | Event::TransactionAborted
            | Event::ScopeAborted => Severity::Info,
            _ => Severity::Trace,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names_are_screaming_snake_case() {
        let events = [
            Event::RequestResolved,
            Event::RequestRejected,
            Event::DuplicateSkipped,
            Event::TransactionCommitted,
            Event::UnhandledError,
        ];
        for event in events {
            let name = event.as_str();
            assert!(name.chars().all(|c| c.is_ascii_uppercase() || c == '_'));
        }
    }

    #[test]
    fn test_contention_is_a_warning() {
        assert_eq!(Event::RequestBlocked.severity(), Severity::Warn);
        assert_eq!(Event::OpenBlocked.severity(), Severity::Warn);
        assert_eq!(Event::UnhandledError.severity(), Severity::Warn);
    }

    #[test]
    fn test_per_request_events_are_trace() {
        assert_eq!(Event::RequestResolved.severity(), Severity::Trace);
        assert_eq!(Event::DuplicateSkipped.severity(), Severity::Trace);
    }
}
