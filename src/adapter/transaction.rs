//! Transaction scopes as futures

use super::errors::AdapterError;
use super::request::suppress;
use super::settle::{Pending, Settlement};
use super::Adapter;
use crate::handle::{ErrorSignal, TransactionScope};
use crate::observability::Event;

impl Adapter {
    /// Convert a scope into a future that resolves when it commits and
    /// rejects when it reports an error or aborts.
    pub fn request_transaction<S>(&self, scope: &S) -> Pending<(), <S::Signal as ErrorSignal>::Error>
    where
        S: TransactionScope,
        S::Signal: 'static,
        <S::Signal as ErrorSignal>::Error: 'static,
    {
        let (settlement, pending) = Settlement::new(self, "request_transaction");

        let on_complete = settlement.clone();
        scope.add_complete_listener(Box::new(move |()| {
            if on_complete.is_settled() {
                return;
            }
            let adapter = on_complete.adapter();
            adapter.record(|m| m.increment_scopes_committed());
            adapter.observe(Event::ScopeCommitted, &[("operation", "request_transaction")]);
            on_complete.resolve(());
        }));

        let on_error = settlement.clone();
        scope.add_error_listener(Box::new(move |signal: S::Signal| {
            reject_scope(&on_error, signal);
        }));

        let on_abort = settlement;
        scope.add_abort_listener(Box::new(move |signal: S::Signal| {
            reject_scope(&on_abort, signal);
        }));

        pending
    }
}

fn reject_scope<S: ErrorSignal>(settlement: &Settlement<(), S::Error>, signal: S) {
    if settlement.is_settled() {
        return;
    }
    let adapter = settlement.adapter();
    suppress(adapter, &signal, settlement.operation());
    adapter.record(|m| m.increment_scopes_aborted());
    adapter.observe(Event::ScopeAborted, &[("operation", settlement.operation())]);
    settlement.reject(AdapterError::Aborted(signal.into_error()));
}
