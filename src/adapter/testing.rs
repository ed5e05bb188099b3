//! Scripted handles for adapter unit tests
//!
//! Signals fire only when a test calls `succeed`, `fail`, `complete` or
//! `pump`, which stands in for the engine's later turns.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::handle::{
    CursorDirection, CursorPosition, ErrorSignal, Key, Listener, OperationHandle, TransactionScope,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FakeError {
    pub name: String,
}

impl FakeError {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

impl fmt::Display for FakeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct FakeSignal {
    error: FakeError,
    prevented: Rc<Cell<bool>>,
}

impl FakeSignal {
    fn new(error: FakeError) -> Self {
        Self {
            error,
            prevented: Rc::new(Cell::new(false)),
        }
    }

    pub fn was_prevented(&self) -> bool {
        self.prevented.get()
    }
}

impl ErrorSignal for FakeSignal {
    type Error = FakeError;

    fn prevent_default(&self) {
        self.prevented.set(true);
    }

    fn into_error(self) -> FakeError {
        self.error
    }
}

struct Channel<T> {
    listeners: RefCell<Vec<Listener<T>>>,
}

impl<T: Clone> Channel<T> {
    fn new() -> Self {
        Self {
            listeners: RefCell::new(Vec::new()),
        }
    }

    fn add(&self, listener: Listener<T>) {
        self.listeners.borrow_mut().push(listener);
    }

    fn len(&self) -> usize {
        self.listeners.borrow().len()
    }

    fn fire(&self, payload: T) {
        let mut current = std::mem::take(&mut *self.listeners.borrow_mut());
        for listener in current.iter_mut() {
            listener(payload.clone());
        }
        let mut listeners = self.listeners.borrow_mut();
        current.append(&mut listeners);
        *listeners = current;
    }
}

pub(crate) struct FakeOperation<T> {
    success: Channel<T>,
    error: Channel<FakeSignal>,
    blocked: Option<Channel<FakeSignal>>,
}

impl<T: Clone> FakeOperation<T> {
    pub fn new() -> Self {
        Self {
            success: Channel::new(),
            error: Channel::new(),
            blocked: None,
        }
    }

    pub fn exclusive() -> Self {
        Self {
            blocked: Some(Channel::new()),
            ..Self::new()
        }
    }

    pub fn succeed(&self, value: T) {
        self.success.fire(value);
    }

    pub fn fail(&self, error: FakeError) -> FakeSignal {
        let signal = FakeSignal::new(error);
        self.error.fire(signal.clone());
        signal
    }

    pub fn block(&self, error: FakeError) -> FakeSignal {
        let signal = FakeSignal::new(error);
        if let Some(blocked) = &self.blocked {
            blocked.fire(signal.clone());
        }
        signal
    }

    pub fn success_listeners(&self) -> usize {
        self.success.len()
    }

    pub fn error_listeners(&self) -> usize {
        self.error.len()
    }

    pub fn blocked_listeners(&self) -> usize {
        self.blocked.as_ref().map(Channel::len).unwrap_or(0)
    }
}

impl<T: Clone> OperationHandle for FakeOperation<T> {
    type Output = T;
    type Signal = FakeSignal;

    fn add_success_listener(&self, listener: Listener<T>) {
        self.success.add(listener);
    }

    fn add_error_listener(&self, listener: Listener<FakeSignal>) {
        self.error.add(listener);
    }

    fn has_blocked_channel(&self) -> bool {
        self.blocked.is_some()
    }

    fn add_blocked_listener(&self, listener: Listener<FakeSignal>) {
        if let Some(blocked) = &self.blocked {
            blocked.add(listener);
        }
    }
}

pub(crate) struct FakeScope {
    complete: Channel<()>,
    error: Channel<FakeSignal>,
    abort: Channel<FakeSignal>,
}

impl FakeScope {
    pub fn new() -> Self {
        Self {
            complete: Channel::new(),
            error: Channel::new(),
            abort: Channel::new(),
        }
    }

    pub fn complete(&self) {
        self.complete.fire(());
    }

    pub fn error(&self, error: FakeError) -> FakeSignal {
        let signal = FakeSignal::new(error);
        self.error.fire(signal.clone());
        signal
    }

    pub fn abort(&self, error: FakeError) -> FakeSignal {
        let signal = FakeSignal::new(error);
        self.abort.fire(signal.clone());
        signal
    }
}

impl TransactionScope for FakeScope {
    type Signal = FakeSignal;

    fn add_complete_listener(&self, listener: Listener<()>) {
        self.complete.add(listener);
    }

    fn add_error_listener(&self, listener: Listener<FakeSignal>) {
        self.error.add(listener);
    }

    fn add_abort_listener(&self, listener: Listener<FakeSignal>) {
        self.abort.add(listener);
    }
}

struct Script {
    keys: Vec<Key>,
    direction: CursorDirection,
    multi_entry: bool,
    continues: Cell<usize>,
    /// Index of the next position to deliver once the cursor is continued
    queued: Cell<Option<usize>>,
}

/// A cursor handle replaying a fixed key sequence, values are indexes
pub(crate) struct ScriptedCursor {
    operation: FakeOperation<Option<FakePosition>>,
    script: Rc<Script>,
}

#[derive(Clone)]
pub(crate) struct FakePosition {
    index: usize,
    key: Key,
    value: usize,
    live: Rc<Cell<bool>>,
    script: Rc<Script>,
}

impl FakePosition {
    fn continued(&self) -> bool {
        !self.live.get()
    }
}

impl CursorPosition for FakePosition {
    type Value = usize;
    type Error = FakeError;

    fn key(&self) -> &Key {
        &self.key
    }

    fn primary_key(&self) -> &Key {
        &self.key
    }

    fn value(&self) -> &usize {
        &self.value
    }

    fn direction(&self) -> CursorDirection {
        self.script.direction
    }

    fn source_is_multi_entry(&self) -> bool {
        self.script.multi_entry
    }

    fn continue_(&self) -> Result<(), FakeError> {
        self.advance(1)
    }

    fn continue_to(&self, key: &Key) -> Result<(), FakeError> {
        if !self.live.replace(false) {
            return Err(FakeError::named("InvalidStateError"));
        }
        self.script.continues.set(self.script.continues.get() + 1);
        let target = self.script.keys[self.index + 1..]
            .iter()
            .position(|k| k >= key)
            .map(|offset| self.index + 1 + offset)
            .unwrap_or(self.script.keys.len());
        self.script.queued.set(Some(target));
        Ok(())
    }

    fn advance(&self, count: u32) -> Result<(), FakeError> {
        if !self.live.replace(false) {
            return Err(FakeError::named("InvalidStateError"));
        }
        self.script.continues.set(self.script.continues.get() + 1);
        self.script.queued.set(Some(self.index + count as usize));
        Ok(())
    }
}

impl ScriptedCursor {
    pub fn new(keys: Vec<Key>, direction: CursorDirection, multi_entry: bool) -> Self {
        Self {
            operation: FakeOperation::new(),
            script: Rc::new(Script {
                keys,
                direction,
                multi_entry,
                continues: Cell::new(0),
                queued: Cell::new(Some(0)),
            }),
        }
    }

    pub fn position_at(&self, index: usize) -> FakePosition {
        FakePosition {
            index,
            key: self.script.keys[index].clone(),
            value: index,
            live: Rc::new(Cell::new(true)),
            script: Rc::clone(&self.script),
        }
    }

    pub fn first(&self) -> Option<FakePosition> {
        self.script.queued.set(None);
        (!self.script.keys.is_empty()).then(|| self.position_at(0))
    }

    /// The position after `current`, if `current` was continued
    pub fn following(&self, current: &FakePosition) -> Option<FakePosition> {
        if !current.continued() {
            return None;
        }
        let next = self.script.queued.take()?;
        (next < self.script.keys.len()).then(|| self.position_at(next))
    }

    /// Total continuation calls made against this cursor
    pub fn continues(&self) -> usize {
        self.script.continues.get()
    }

    /// Deliver queued positions until the cursor stops being continued.
    /// Returns the number of success signals fired.
    pub fn pump(&self) -> usize {
        let mut fired = 0;
        while let Some(index) = self.script.queued.take() {
            let payload = (index < self.script.keys.len()).then(|| self.position_at(index));
            self.operation.succeed(payload);
            fired += 1;
        }
        fired
    }

    pub fn fail(&self, error: FakeError) -> FakeSignal {
        self.operation.fail(error)
    }
}

impl OperationHandle for ScriptedCursor {
    type Output = Option<FakePosition>;
    type Signal = FakeSignal;

    fn add_success_listener(&self, listener: Listener<Option<FakePosition>>) {
        self.operation.add_success_listener(listener);
    }

    fn add_error_listener(&self, listener: Listener<FakeSignal>) {
        self.operation.add_error_listener(listener);
    }
}
