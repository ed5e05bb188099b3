//! Single-settlement state shared by an adapter future and the listeners
//! that feed it.
//!
//! Listeners hold [`Settlement`] clones; the caller holds the matching
//! [`Pending`]. The first `resolve` or `reject` wins and every later call
//! is a no-op. When the last settlement clone is dropped without settling
//! (the engine discarded the handle), the future yields
//! [`AdapterError::Abandoned`].

use std::cell::{Cell, RefCell};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use super::errors::{AdapterError, AdapterResult};
use super::Adapter;
use crate::observability::Event;

/// Observable state of an adapter future
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleState {
    /// No terminal signal observed yet
    Pending,
    /// Resolved with a value
    Resolved,
    /// Rejected with an error
    Rejected,
}

impl SettleState {
    /// Whether the future has settled either way
    pub fn is_settled(&self) -> bool {
        !matches!(self, SettleState::Pending)
    }
}

struct Shared<T, E> {
    sender: RefCell<Option<oneshot::Sender<AdapterResult<T, E>>>>,
    state: Rc<Cell<SettleState>>,
    adapter: Adapter,
    operation: &'static str,
}

/// Write side of an adapter future
pub(crate) struct Settlement<T, E> {
    shared: Rc<Shared<T, E>>,
}

impl<T, E> Clone for Settlement<T, E> {
    fn clone(&self) -> Self {
        Self {
            shared: Rc::clone(&self.shared),
        }
    }
}

impl<T, E> Settlement<T, E> {
    /// Create a settlement and the future it feeds
    pub(crate) fn new(adapter: &Adapter, operation: &'static str) -> (Self, Pending<T, E>) {
        let (sender, receiver) = oneshot::channel();
        let state = Rc::new(Cell::new(SettleState::Pending));

        let settlement = Self {
            shared: Rc::new(Shared {
                sender: RefCell::new(Some(sender)),
                state: Rc::clone(&state),
                adapter: adapter.clone(),
                operation,
            }),
        };

        (settlement, Pending { receiver, state })
    }

    pub(crate) fn adapter(&self) -> &Adapter {
        &self.shared.adapter
    }

    pub(crate) fn operation(&self) -> &'static str {
        self.shared.operation
    }

    pub(crate) fn is_settled(&self) -> bool {
        self.shared.state.get().is_settled()
    }

    /// Resolve the future. Returns false if it had already settled.
    pub(crate) fn resolve(&self, value: T) -> bool {
        let Some(sender) = self.shared.sender.borrow_mut().take() else {
            return false;
        };
        self.shared.state.set(SettleState::Resolved);

        let adapter = &self.shared.adapter;
        adapter.record(|m| m.increment_resolved());
        adapter.observe(Event::RequestResolved, &[("operation", self.shared.operation)]);

        // The caller may have dropped the future; the outcome is still final
        let _ = sender.send(Ok(value));
        true
    }

    /// Reject the future. Returns false if it had already settled.
    pub(crate) fn reject(&self, error: AdapterError<E>) -> bool {
        let Some(sender) = self.shared.sender.borrow_mut().take() else {
            return false;
        };
        self.shared.state.set(SettleState::Rejected);

        let adapter = &self.shared.adapter;
        adapter.record(|m| m.increment_rejected());
        adapter.observe(
            Event::RequestRejected,
            &[("code", error.code()), ("operation", self.shared.operation)],
        );

        let _ = sender.send(Err(error));
        true
    }
}

/// Future returned by every adapter entry point
///
/// Executor-agnostic: it holds no engine state and may be awaited from
/// any executor that drives the engine's event loop.
pub struct Pending<T, E> {
    receiver: oneshot::Receiver<AdapterResult<T, E>>,
    state: Rc<Cell<SettleState>>,
}

impl<T, E> Pending<T, E> {
    /// Current settlement state
    pub fn state(&self) -> SettleState {
        self.state.get()
    }
}

impl<T, E> Future for Pending<T, E> {
    type Output = AdapterResult<T, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        Pin::new(&mut this.receiver)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(AdapterError::Abandoned)))
    }
}

impl<T, E> fmt::Debug for Pending<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pending").field("state", &self.state.get()).finish()
    }
}
