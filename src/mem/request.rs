//! Request handles

use std::fmt;
use std::rc::Rc;

use crate::handle::{Listener, OperationHandle};

use super::database::{Connection, UpgradeEvent};
use super::errors::ErrorEvent;
use super::listeners::ListenerSet;

struct Channels<T> {
    success: ListenerSet<T>,
    error: ListenerSet<ErrorEvent>,
    blocked: Option<ListenerSet<ErrorEvent>>,
}

/// A pending backend operation
///
/// Clones refer to the same request.
pub struct MemRequest<T> {
    channels: Rc<Channels<T>>,
}

impl<T> Clone for MemRequest<T> {
    fn clone(&self) -> Self {
        Self {
            channels: Rc::clone(&self.channels),
        }
    }
}

impl<T: Clone> MemRequest<T> {
    pub(crate) fn new() -> Self {
        Self::with_blocked(None)
    }

    /// A request for exclusive access, with a blocked channel
    pub(crate) fn exclusive() -> Self {
        Self::with_blocked(Some(ListenerSet::new()))
    }

    fn with_blocked(blocked: Option<ListenerSet<ErrorEvent>>) -> Self {
        Self {
            channels: Rc::new(Channels {
                success: ListenerSet::new(),
                error: ListenerSet::new(),
                blocked,
            }),
        }
    }

    pub(crate) fn fire_success(&self, value: T) {
        self.channels.success.fire(value);
    }

    pub(crate) fn fire_error(&self, event: ErrorEvent) {
        self.channels.error.fire(event);
    }

    pub(crate) fn fire_blocked(&self, event: ErrorEvent) {
        if let Some(blocked) = &self.channels.blocked {
            blocked.fire(event);
        }
    }
}

impl<T> fmt::Debug for MemRequest<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemRequest")
            .field("exclusive", &self.channels.blocked.is_some())
            .finish()
    }
}

impl<T: Clone> OperationHandle for MemRequest<T> {
    type Output = T;
    type Signal = ErrorEvent;

    fn add_success_listener(&self, listener: Listener<T>) {
        self.channels.success.add(listener);
    }

    fn add_error_listener(&self, listener: Listener<ErrorEvent>) {
        self.channels.error.add(listener);
    }

    fn has_blocked_channel(&self) -> bool {
        self.channels.blocked.is_some()
    }

    fn add_blocked_listener(&self, listener: Listener<ErrorEvent>) {
        if let Some(blocked) = &self.channels.blocked {
            blocked.add(listener);
        }
    }
}

/// Pending open of a database connection
///
/// Resolves to a [`Connection`] once any upgrade has committed.
#[derive(Clone)]
pub struct OpenRequest {
    request: MemRequest<Connection>,
    upgrade: Rc<ListenerSet<UpgradeEvent>>,
}

impl OpenRequest {
    pub(crate) fn new() -> Self {
        Self {
            request: MemRequest::exclusive(),
            upgrade: Rc::new(ListenerSet::new()),
        }
    }

    /// Register a callback for schema changes.
    ///
    /// Fires when the requested version is above the stored one, with a
    /// versionchange transaction that may create stores and indexes.
    pub fn on_upgrade_needed(&self, listener: impl FnMut(UpgradeEvent) + 'static) {
        self.upgrade.add(Box::new(listener));
    }

    pub(crate) fn request(&self) -> &MemRequest<Connection> {
        &self.request
    }

    pub(crate) fn fire_upgrade(&self, event: UpgradeEvent) {
        self.upgrade.fire(event);
    }
}

impl fmt::Debug for OpenRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenRequest")
            .field("upgrade_listeners", &!self.upgrade.is_empty())
            .finish()
    }
}

impl OperationHandle for OpenRequest {
    type Output = Connection;
    type Signal = ErrorEvent;

    fn add_success_listener(&self, listener: Listener<Connection>) {
        self.request.add_success_listener(listener);
    }

    fn add_error_listener(&self, listener: Listener<ErrorEvent>) {
        self.request.add_error_listener(listener);
    }

    fn has_blocked_channel(&self) -> bool {
        true
    }

    fn add_blocked_listener(&self, listener: Listener<ErrorEvent>) {
        self.request.add_blocked_listener(listener);
    }
}

/// Fire an error on a request that has no transaction to bubble to.
///
/// Returns whether some listener prevented the default.
pub(crate) fn fire_unscoped_error<T: Clone>(request: &MemRequest<T>, event: &ErrorEvent) -> bool {
    request.fire_error(event.clone());
    event.default_prevented()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::ErrorSignal;
    use crate::mem::errors::EngineError;
    use std::cell::RefCell;

    #[test]
    fn test_plain_request_has_no_blocked_channel() {
        let request: MemRequest<u32> = MemRequest::new();
        assert!(!request.has_blocked_channel());
        assert!(MemRequest::<u32>::exclusive().has_blocked_channel());
    }

    #[test]
    fn test_clones_share_listeners() {
        let request: MemRequest<u32> = MemRequest::new();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let log = Rc::clone(&seen);
        request.add_success_listener(Box::new(move |v| log.borrow_mut().push(v)));
        request.clone().fire_success(9);

        assert_eq!(*seen.borrow(), vec![9]);
    }

    #[test]
    fn test_unscoped_error_reports_prevention() {
        let request: MemRequest<u32> = MemRequest::new();
        let event = ErrorEvent::new(EngineError::version("too low"));
        assert!(!fire_unscoped_error(&request, &event));

        request.add_error_listener(Box::new(|e: ErrorEvent| e.prevent_default()));
        let event = ErrorEvent::new(EngineError::version("too low"));
        assert!(fire_unscoped_error(&request, &event));
    }
}
