//! # Adapter
//!
//! Converts event-driven storage handles into single-settlement futures.
//!
//! ## Entry points
//!
//! - [`Adapter::request`]: one operation, resolves on its success
//! - [`Adapter::request_in`]: one operation inside a scope, resolves with
//!   the operation's value once the scope completes
//! - [`Adapter::request_transaction`]: resolves when a scope commits
//! - [`Adapter::request_cursor`]: drives a caller-advanced traversal to
//!   end of sequence
//! - [`Adapter::map_cursor`]: traversal that collects into a `Vec`
//!
//! Every entry point attaches listeners and returns immediately. Nothing
//! settles until the engine delivers a signal on a later turn.
//!
//! ## Error policy
//!
//! Error, blocked and abort signals have their default propagation
//! suppressed before the future rejects with the signal's payload.

mod cursor;
mod dedup;
mod errors;
mod request;
mod settle;
mod transaction;

#[cfg(test)]
mod testing;

use std::future::Future;
use std::ops::ControlFlow;
use std::sync::Arc;

pub use dedup::{Stepped, UniqueIndexDeduplicator};
pub use errors::{AdapterError, AdapterResult};
pub use settle::{Pending, SettleState};

use crate::config::AdapterConfig;
use crate::handle::{CursorPosition, ErrorSignal, OperationHandle, SignalError, TransactionScope};
use crate::observability::{log_event, Event, MetricsRegistry};

/// Configured adapter
///
/// Cloning is cheap; clones share one metrics registry.
#[derive(Debug, Clone, Default)]
pub struct Adapter {
    config: AdapterConfig,
    metrics: Arc<MetricsRegistry>,
}

impl Adapter {
    /// Create an adapter with the given configuration
    pub fn new(config: AdapterConfig) -> Self {
        Self {
            config,
            metrics: Arc::new(MetricsRegistry::new()),
        }
    }

    /// The adapter's configuration
    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    /// Counters recorded by this adapter and its clones
    pub fn metrics(&self) -> &MetricsRegistry {
        &self.metrics
    }

    pub(crate) fn observe(&self, event: Event, fields: &[(&str, &str)]) {
        log_event(self.config.log_severity, event, fields);
    }

    pub(crate) fn record(&self, update: impl FnOnce(&MetricsRegistry)) {
        if self.config.record_metrics {
            update(&self.metrics);
        }
    }
}

/// [`Adapter::request`] with the default configuration
pub fn request<H>(operation: &H) -> Pending<H::Output, SignalError<H>>
where
    H: OperationHandle,
    H::Output: 'static,
    H::Signal: 'static,
    SignalError<H>: 'static,
{
    Adapter::default().request(operation)
}

/// [`Adapter::request_in`] with the default configuration
pub fn request_in<H, S>(operation: &H, scope: &S) -> Pending<H::Output, SignalError<H>>
where
    H: OperationHandle,
    H::Output: 'static,
    H::Signal: 'static,
    SignalError<H>: 'static,
    S: TransactionScope,
    S::Signal: ErrorSignal<Error = SignalError<H>> + 'static,
{
    Adapter::default().request_in(operation, scope)
}

/// [`Adapter::request_transaction`] with the default configuration
pub fn request_transaction<S>(
    scope: &S,
) -> Pending<(), <S::Signal as ErrorSignal>::Error>
where
    S: TransactionScope,
    S::Signal: 'static,
    <S::Signal as ErrorSignal>::Error: 'static,
{
    Adapter::default().request_transaction(scope)
}

/// [`Adapter::request_cursor`] with the default configuration
pub fn request_cursor<H, C, F>(operation: &H, step: F) -> Pending<(), SignalError<H>>
where
    H: OperationHandle<Output = Option<C>>,
    H::Signal: 'static,
    SignalError<H>: 'static,
    C: CursorPosition<Error = SignalError<H>> + 'static,
    F: FnMut(&C) -> ControlFlow<()> + 'static,
{
    Adapter::default().request_cursor(operation, step)
}

/// [`Adapter::map_cursor`] with the default configuration
pub fn map_cursor<H, C, T, F>(
    operation: &H,
    step: F,
) -> impl Future<Output = AdapterResult<Vec<T>, SignalError<H>>>
where
    H: OperationHandle<Output = Option<C>>,
    H::Signal: 'static,
    SignalError<H>: 'static,
    C: CursorPosition<Error = SignalError<H>> + 'static,
    T: 'static,
    F: FnMut(&C, &mut Vec<T>) -> ControlFlow<()> + 'static,
{
    Adapter::default().map_cursor(operation, step)
}
