//! Caller-driven traversals as futures
//!
//! The iterator never advances a cursor on its own: the step callback
//! receives each position and must call one of its continuation
//! capabilities to receive the next. The only exception is the unique-key
//! filter, which continues past repeated keys itself.
//!
//! A step returning `ControlFlow::Break(())` ends the traversal early and
//! resolves the future. A step that neither continues nor breaks leaves
//! the future pending until the engine drops the handle.

use std::cell::RefCell;
use std::future::Future;
use std::ops::ControlFlow;
use std::rc::Rc;

use super::dedup::{Stepped, UniqueIndexDeduplicator};
use super::errors::{AdapterError, AdapterResult};
use super::settle::{Pending, Settlement};
use super::Adapter;
use crate::handle::{CursorPosition, OperationHandle, SignalError};
use crate::observability::Event;

impl Adapter {
    /// Drive a cursor handle to end of sequence, calling `step` once per
    /// position.
    pub fn request_cursor<H, C, F>(&self, operation: &H, step: F) -> Pending<(), SignalError<H>>
    where
        H: OperationHandle<Output = Option<C>>,
        H::Signal: 'static,
        SignalError<H>: 'static,
        C: CursorPosition<Error = SignalError<H>> + 'static,
        F: FnMut(&C) -> ControlFlow<()> + 'static,
    {
        let (settlement, pending) = Settlement::new(self, "request_cursor");
        self.attach_failure_listeners(operation, &settlement);

        let mut filter = self
            .config()
            .dedupe_unique_cursors
            .then(UniqueIndexDeduplicator::new);
        let mut step = step;

        operation.add_success_listener(Box::new(move |payload: Option<C>| {
            if settlement.is_settled() {
                return;
            }

            let Some(position) = payload else {
                let adapter = settlement.adapter();
                adapter.record(|m| m.increment_cursors_exhausted());
                adapter.observe(Event::CursorExhausted, &[("operation", "request_cursor")]);
                settlement.resolve(());
                return;
            };

            let stepped = match filter.as_mut() {
                Some(filter) => filter.step(&position, &mut step),
                None => Ok(Stepped::Forwarded(step(&position))),
            };

            let adapter = settlement.adapter();
            match stepped {
                Ok(Stepped::Forwarded(flow)) => {
                    adapter.record(|m| m.increment_cursor_steps());
                    if flow.is_break() {
                        adapter.record(|m| m.increment_cursors_stopped());
                        adapter.observe(Event::CursorStopped, &[("operation", "request_cursor")]);
                        settlement.resolve(());
                    }
                }
                Ok(Stepped::Skipped) => {
                    adapter.record(|m| m.increment_duplicates_skipped());
                    adapter.observe(
                        Event::DuplicateSkipped,
                        &[("direction", position.direction().as_str())],
                    );
                }
                Err(err) => {
                    settlement.reject(AdapterError::Operation(err));
                }
            }
        }));

        pending
    }

    /// Drive a cursor handle to end of sequence, collecting whatever `step`
    /// pushes into the accumulator.
    ///
    /// Resolves to the accumulated values in traversal order, including
    /// after an early stop.
    pub fn map_cursor<H, C, T, F>(
        &self,
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
        let accumulator: Rc<RefCell<Vec<T>>> = Rc::new(RefCell::new(Vec::new()));

        let sink = Rc::clone(&accumulator);
        let mut step = step;
        let traversal = self.request_cursor(operation, move |position: &C| {
            step(position, &mut sink.borrow_mut())
        });

        async move {
            traversal.await?;
            let values = std::mem::take(&mut *accumulator.borrow_mut());
            Ok(values)
        }
    }
}
