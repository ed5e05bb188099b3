//! Observability subsystem
//!
//! This module provides:
//! - Structured logging (JSON lines)
//! - Counter metrics
//! - A closed set of observable events
//!
//! # Principles
//!
//! 1. Observability is read-only
//! 2. No side effects on settlement
//! 3. No background threads
//! 4. Deterministic output
//!
//! # Usage
//!
//! ```ignore
//! use idb_settle::observability::{Event, MetricsRegistry, Severity};
//!
//! idb_settle::observability::log_event(Severity::Trace, Event::CursorExhausted, &[]);
//!
//! let metrics = MetricsRegistry::new();
//! metrics.increment_cursor_steps();
//! ```

mod events;
mod logger;
mod metrics;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{MetricsRegistry, MetricsSnapshot};

/// Log an event if its severity reaches `threshold`
pub fn log_event(threshold: Severity, event: Event, fields: &[(&str, &str)]) {
    Logger::log_filtered(threshold, event.severity(), event.as_str(), fields);
}
