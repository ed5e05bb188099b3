//! Metrics registry
//!
//! - Counters only
//! - Monotonic increase
//! - Thread-safe but lock-free

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Operational counters for one adapter
///
/// All counters use Relaxed ordering; values are exact once the
/// observed futures have settled.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    /// Futures resolved with a value
    requests_resolved: AtomicU64,
    /// Futures rejected with an error
    requests_rejected: AtomicU64,
    /// Blocked signals observed
    requests_blocked: AtomicU64,
    /// Scopes observed completing
    scopes_committed: AtomicU64,
    /// Scopes observed aborting
    scopes_aborted: AtomicU64,
    /// Positions forwarded to step callbacks
    cursor_steps: AtomicU64,
    /// Traversals that reached end of sequence
    cursors_exhausted: AtomicU64,
    /// Traversals stopped by their step callback
    cursors_stopped: AtomicU64,
    /// Positions skipped by the unique-key filter
    duplicates_skipped: AtomicU64,
    /// Error signals whose default propagation was suppressed
    errors_suppressed: AtomicU64,
}

impl MetricsRegistry {
    /// Create a new metrics registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment resolved futures
    pub fn increment_resolved(&self) {
        self.requests_resolved.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment rejected futures
    pub fn increment_rejected(&self) {
        self.requests_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment blocked signals
    pub fn increment_blocked(&self) {
        self.requests_blocked.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment committed scopes
    pub fn increment_scopes_committed(&self) {
        self.scopes_committed.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment aborted scopes
    pub fn increment_scopes_aborted(&self) {
        self.scopes_aborted.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment forwarded cursor steps
    pub fn increment_cursor_steps(&self) {
        self.cursor_steps.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment exhausted traversals
    pub fn increment_cursors_exhausted(&self) {
        self.cursors_exhausted.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment stopped traversals
    pub fn increment_cursors_stopped(&self) {
        self.cursors_stopped.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment skipped duplicates
    pub fn increment_duplicates_skipped(&self) {
        self.duplicates_skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment suppressed error signals
    pub fn increment_errors_suppressed(&self) {
        self.errors_suppressed.fetch_add(1, Ordering::Relaxed);
    }

    /// Get all metrics as a snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_resolved: self.requests_resolved.load(Ordering::Relaxed),
            requests_rejected: self.requests_rejected.load(Ordering::Relaxed),
            requests_blocked: self.requests_blocked.load(Ordering::Relaxed),
            scopes_committed: self.scopes_committed.load(Ordering::Relaxed),
            scopes_aborted: self.scopes_aborted.load(Ordering::Relaxed),
            cursor_steps: self.cursor_steps.load(Ordering::Relaxed),
            cursors_exhausted: self.cursors_exhausted.load(Ordering::Relaxed),
            cursors_stopped: self.cursors_stopped.load(Ordering::Relaxed),
            duplicates_skipped: self.duplicates_skipped.load(Ordering::Relaxed),
            errors_suppressed: self.errors_suppressed.load(Ordering::Relaxed),
        }
    }

    /// Get current snapshot of all metrics as JSON
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.snapshot()).unwrap_or_else(|_| "{}".to_string())
    }
}

/// A point-in-time snapshot of all metrics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub requests_resolved: u64,
    pub requests_rejected: u64,
    pub requests_blocked: u64,
    pub scopes_committed: u64,
    pub scopes_aborted: u64,
    pub cursor_steps: u64,
    pub cursors_exhausted: u64,
    pub cursors_stopped: u64,
    pub duplicates_skipped: u64,
    pub errors_suppressed: u64,
}
