//! Single-threaded task queue
//!
//! Every backend signal is delivered from a task on this queue, never from
//! inside the call that registered the work. `block_on` interleaves polling
//! a future with running tasks, so continuations issued after an `await`
//! land before the next engine task runs.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::rc::Rc;
use std::task::{Context, Poll};

use futures_util::pin_mut;
use futures_util::task::noop_waker_ref;

use super::errors::Stalled;

type Task = Box<dyn FnOnce()>;

#[derive(Default)]
struct Queue {
    tasks: RefCell<VecDeque<Task>>,
    turns: Cell<u64>,
}

/// FIFO task queue shared by a factory and everything it creates
#[derive(Clone, Default)]
pub struct EventLoop {
    queue: Rc<Queue>,
}

impl EventLoop {
    /// Empty loop with no tasks queued
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn schedule(&self, task: impl FnOnce() + 'static) {
        self.queue.tasks.borrow_mut().push_back(Box::new(task));
    }

    /// Run the oldest queued task. Returns false when the queue is empty.
    pub fn turn(&self) -> bool {
        let task = self.queue.tasks.borrow_mut().pop_front();
        match task {
            Some(task) => {
                self.queue.turns.set(self.queue.turns.get() + 1);
                task();
                true
            }
            None => false,
        }
    }

    /// Run tasks until the queue is empty, returning how many ran
    pub fn run_until_idle(&self) -> u64 {
        let mut ran = 0;
        while self.turn() {
            ran += 1;
        }
        ran
    }

    /// Tasks waiting to run
    pub fn pending_tasks(&self) -> usize {
        self.queue.tasks.borrow().len()
    }

    /// Tasks run since creation
    pub fn turns(&self) -> u64 {
        self.queue.turns.get()
    }

    /// Drive `future` to completion, running one task between polls.
    ///
    /// Fails with [`Stalled`] if the queue drains while the future is
    /// still pending; nothing else could ever wake it.
    pub fn block_on<F: Future>(&self, future: F) -> Result<F::Output, Stalled> {
        pin_mut!(future);
        let mut cx = Context::from_waker(noop_waker_ref());
        let started = self.turns();

        loop {
            if let Poll::Ready(output) = future.as_mut().poll(&mut cx) {
                return Ok(output);
            }
            if !self.turn() {
                return Err(Stalled {
                    turns: self.turns() - started,
                });
            }
        }
    }
}

impl fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLoop")
            .field("pending_tasks", &self.pending_tasks())
            .field("turns", &self.turns())
            .finish()
    }
}
