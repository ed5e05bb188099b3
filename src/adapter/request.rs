//! Operation handles as futures
//!
//! An unscoped request resolves on the operation's own success signal.
//! A scoped request captures that value and resolves only when the scope
//! reports completion, so callers never observe uncommitted results.

use std::cell::RefCell;
use std::rc::Rc;

use super::errors::AdapterError;
use super::settle::{Pending, Settlement};
use super::Adapter;
use crate::handle::{ErrorSignal, OperationHandle, SignalError, TransactionScope};
use crate::observability::Event;

impl Adapter {
    /// Convert an operation handle into a future of its success value.
    pub fn request<H>(&self, operation: &H) -> Pending<H::Output, SignalError<H>>
    where
        H: OperationHandle,
        H::Output: 'static,
        H::Signal: 'static,
        SignalError<H>: 'static,
    {
        let (settlement, pending) = Settlement::new(self, "request");
        self.attach_failure_listeners(operation, &settlement);

        operation.add_success_listener(Box::new(move |value| {
            settlement.resolve(value);
        }));

        pending
    }

    /// Convert an operation handle into a future that resolves with the
    /// operation's success value once `scope` completes.
    ///
    /// Rejects if the operation fails, or if the scope aborts first.
    pub fn request_in<H, S>(&self, operation: &H, scope: &S) -> Pending<H::Output, SignalError<H>>
    where
        H: OperationHandle,
        H::Output: 'static,
        H::Signal: 'static,
        SignalError<H>: 'static,
        S: TransactionScope,
        S::Signal: ErrorSignal<Error = SignalError<H>> + 'static,
    {
        let (settlement, pending) = Settlement::new(self, "request_in");
        self.attach_failure_listeners(operation, &settlement);

        let captured: Rc<RefCell<Option<H::Output>>> = Rc::new(RefCell::new(None));

        let slot = Rc::clone(&captured);
        let adapter = self.clone();
        operation.add_success_listener(Box::new(move |value| {
            adapter.observe(Event::ResultDeferred, &[("operation", "request_in")]);
            *slot.borrow_mut() = Some(value);
        }));

        let on_complete = settlement.clone();
        let adapter = self.clone();
        scope.add_complete_listener(Box::new(move |()| {
            if on_complete.is_settled() {
                return;
            }
            adapter.record(|m| m.increment_scopes_committed());
            adapter.observe(Event::ScopeCommitted, &[("operation", "request_in")]);

            let value = captured.borrow_mut().take();
            match value {
                Some(value) => on_complete.resolve(value),
                None => on_complete.reject(AdapterError::MissingResult),
            };
        }));

        let on_abort = settlement;
        scope.add_abort_listener(Box::new(move |signal: S::Signal| {
            if on_abort.is_settled() {
                return;
            }
            suppress(on_abort.adapter(), &signal, on_abort.operation());
            on_abort.adapter().record(|m| m.increment_scopes_aborted());
            on_abort.adapter().observe(Event::ScopeAborted, &[("operation", "request_in")]);
            on_abort.reject(AdapterError::Aborted(signal.into_error()));
        }));

        pending
    }

    /// Attach the error listener, and the blocked listener when the handle
    /// has a blocked channel. Both reject the settlement.
    pub(crate) fn attach_failure_listeners<H, T>(
        &self,
        operation: &H,
        settlement: &Settlement<T, SignalError<H>>,
    ) where
        H: OperationHandle,
        H::Signal: 'static,
        SignalError<H>: 'static,
        T: 'static,
    {
        let on_error = settlement.clone();
        operation.add_error_listener(Box::new(move |signal: H::Signal| {
            if on_error.is_settled() {
                return;
            }
            suppress(on_error.adapter(), &signal, on_error.operation());
            on_error.reject(AdapterError::Operation(signal.into_error()));
        }));

        if operation.has_blocked_channel() {
            let on_blocked = settlement.clone();
            operation.add_blocked_listener(Box::new(move |signal: H::Signal| {
                if on_blocked.is_settled() {
                    return;
                }
                suppress(on_blocked.adapter(), &signal, on_blocked.operation());
                on_blocked.adapter().record(|m| m.increment_blocked());
                on_blocked
                    .adapter()
                    .observe(Event::RequestBlocked, &[("operation", on_blocked.operation())]);
                on_blocked.reject(AdapterError::Blocked(signal.into_error()));
            }));
        }
    }
}

/// Acknowledge an error signal so the engine does not report it elsewhere.
pub(crate) fn suppress<S: ErrorSignal>(adapter: &Adapter, signal: &S, operation: &str) {
    signal.prevent_default();
    adapter.record(|m| m.increment_errors_suppressed());
    adapter.observe(Event::ErrorSuppressed, &[("operation", operation)]);
}
