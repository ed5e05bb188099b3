//! Additive listener lists

use std::cell::RefCell;

use crate::handle::Listener;

/// Listeners for one signal channel
///
/// Listeners added while the channel is firing are kept, but only see
/// later firings.
pub(crate) struct ListenerSet<T> {
    listeners: RefCell<Vec<Listener<T>>>,
}

impl<T: Clone> ListenerSet<T> {
    pub fn new() -> Self {
        Self {
            listeners: RefCell::new(Vec::new()),
        }
    }

    pub fn add(&self, listener: Listener<T>) {
        self.listeners.borrow_mut().push(listener);
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.borrow().is_empty()
    }

    pub fn fire(&self, payload: T) {
        let mut current = std::mem::take(&mut *self.listeners.borrow_mut());
        for listener in current.iter_mut() {
            listener(payload.clone());
        }
        let mut listeners = self.listeners.borrow_mut();
        current.append(&mut listeners);
        *listeners = current;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn test_fire_reaches_every_listener() {
        let set = ListenerSet::new();
        let hits = Rc::new(RefCell::new(Vec::new()));

        for tag in ["a", "b"] {
            let hits = Rc::clone(&hits);
            set.add(Box::new(move |n: u32| hits.borrow_mut().push((tag, n))));
        }
        set.fire(1);

        assert_eq!(*hits.borrow(), vec![("a", 1), ("b", 1)]);
    }

    #[test]
    fn test_listener_added_during_fire_waits() {
        let set = Rc::new(ListenerSet::new());
        let hits = Rc::new(RefCell::new(0));

        let inner = Rc::clone(&set);
        let counter = Rc::clone(&hits);
        set.add(Box::new(move |()| {
            let counter = Rc::clone(&counter);
            inner.add(Box::new(move |()| *counter.borrow_mut() += 1));
        }));

        set.fire(());
        assert_eq!(*hits.borrow(), 0);
        set.fire(());
        assert_eq!(*hits.borrow(), 1);
    }
}
