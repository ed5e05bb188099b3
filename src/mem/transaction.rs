//! # Transactions
//!
//! A transaction stays alive while it has outstanding requests. After each
//! request completes, and once right after creation, a commit check is
//! queued; if it finds nothing outstanding the transaction commits.
//!
//! Request errors are delivered to the request, then to the transaction's
//! error listeners. If no listener prevented the default, the error is
//! recorded as unhandled and the transaction aborts, rolling back every
//! store it touched.
//!
//! Transactions whose scopes overlap run one after another, in creation
//! order, unless both are read-only. A transaction that has to wait holds
//! its requests until every earlier conflicting transaction has finished,
//! so a rollback only ever discards its own writes.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::handle::{Listener, TransactionScope};
use crate::observability::Event;

use super::database::{Connection, DatabaseState, StoreData};
use super::errors::{EngineError, EngineResult, ErrorEvent};
use super::listeners::ListenerSet;
use super::request::MemRequest;
use super::store::{ObjectStore, StoreParams};

/// Transaction access mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionMode {
    /// Reads only; shares its stores with other readers
    ReadOnly,
    /// Reads and writes records in its scope
    ReadWrite,
    /// Schema changes during an upgrade
    VersionChange,
}

impl TransactionMode {
    /// Mode name as IndexedDB spells it
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionMode::ReadOnly => "readonly",
            TransactionMode::ReadWrite => "readwrite",
            TransactionMode::VersionChange => "versionchange",
        }
    }

    /// Whether requests in this mode may write
    pub fn is_writable(&self) -> bool {
        !matches!(self, TransactionMode::ReadOnly)
    }
}

/// Lifecycle of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Accepting requests, or waiting for its turn to run them
    Active,
    /// Every request succeeded and the writes are kept
    Committed,
    /// Writes were rolled back
    Aborted,
}

type Task = Box<dyn FnOnce()>;

enum Snapshot {
    /// Copies of the stores in a readwrite scope, taken when it starts
    Scoped(Vec<(String, StoreData)>),
    /// The whole schema, taken when a versionchange transaction is created
    Schema {
        version: u32,
        stores: BTreeMap<String, StoreData>,
    },
}

struct TransactionInner {
    id: Uuid,
    connection: Connection,
    scope: Vec<String>,
    mode: TransactionMode,
    state: Cell<TransactionState>,
    started: Cell<bool>,
    outstanding: Cell<usize>,
    deferred: RefCell<Vec<Task>>,
    snapshot: RefCell<Option<Snapshot>>,
    error: RefCell<Option<EngineError>>,
    complete: ListenerSet<()>,
    errors: ListenerSet<ErrorEvent>,
    aborts: ListenerSet<ErrorEvent>,
}

/// A group of requests that commit or roll back together
#[derive(Clone)]
pub struct Transaction {
    inner: Rc<TransactionInner>,
}

impl Transaction {
    pub(crate) fn begin(connection: &Connection, scope: Vec<String>, mode: TransactionMode) -> Self {
        // schema changes apply as soon as they are made
        let snapshot = match mode {
            TransactionMode::VersionChange => {
                let state = connection.db().borrow();
                Some(Snapshot::Schema {
                    version: state.version,
                    stores: state.stores.clone(),
                })
            }
            _ => None,
        };

        let transaction = Self {
            inner: Rc::new(TransactionInner {
                id: Uuid::new_v4(),
                connection: connection.clone(),
                scope,
                mode,
                state: Cell::new(TransactionState::Active),
                started: Cell::new(false),
                outstanding: Cell::new(0),
                deferred: RefCell::new(Vec::new()),
                snapshot: RefCell::new(snapshot),
                error: RefCell::new(None),
                complete: ListenerSet::new(),
                errors: ListenerSet::new(),
                aborts: ListenerSet::new(),
            }),
        };
        connection.db().borrow_mut().transactions.push(transaction.clone());
        transaction.try_start();
        transaction
    }

    /// Unique id, used in log lines
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// Access mode
    pub fn mode(&self) -> TransactionMode {
        self.inner.mode
    }

    /// Current lifecycle state
    pub fn state(&self) -> TransactionState {
        self.inner.state.get()
    }

    /// Connection the transaction was started on
    pub fn database(&self) -> &Connection {
        &self.inner.connection
    }

    /// Store names in scope. Versionchange transactions cover every store.
    pub fn object_store_names(&self) -> Vec<String> {
        match self.inner.mode {
            TransactionMode::VersionChange => self.inner.connection.object_store_names(),
            _ => self.inner.scope.clone(),
        }
    }

    /// The error that aborted the transaction, if any
    pub fn error(&self) -> Option<EngineError> {
        self.inner.error.borrow().clone()
    }

    /// Handle to a store in scope
    pub fn object_store(&self, name: &str) -> EngineResult<ObjectStore> {
        if self.state() != TransactionState::Active {
            return Err(EngineError::invalid_state("transaction has finished"));
        }
        if !self.covers(name) {
            return Err(EngineError::not_found(format!(
                "object store '{}' is not in the transaction scope",
                name
            )));
        }
        self.inner.connection.db().borrow().store(name)?;
        Ok(ObjectStore::new(self.clone(), name))
    }

    /// Create a store. Only valid during an upgrade.
    pub fn create_object_store(&self, name: &str, params: StoreParams) -> EngineResult<ObjectStore> {
        self.ensure_upgrade()?;
        if params.auto_increment && params.key_path.as_deref() == Some("") {
            return Err(EngineError::invalid_access(
                "auto-increment stores need a non-empty key path",
            ));
        }
        self.inner.connection.create_store(name, &params)?;
        Ok(ObjectStore::new(self.clone(), name))
    }

    /// Delete a store. Only valid during an upgrade.
    pub fn delete_object_store(&self, name: &str) -> EngineResult<()> {
        self.ensure_upgrade()?;
        let mut state = self.inner.connection.db().borrow_mut();
        state.store(name)?;
        state.stores.remove(name);
        Ok(())
    }

    /// Abort the transaction, discarding its writes
    pub fn abort(&self) -> EngineResult<()> {
        if self.state() != TransactionState::Active {
            return Err(EngineError::invalid_state("transaction has finished"));
        }
        self.abort_with(EngineError::abort("transaction was aborted"));
        Ok(())
    }

    /// Whether the transaction has left the wait queue
    pub fn is_started(&self) -> bool {
        self.inner.started.get()
    }

    pub(crate) fn covers(&self, name: &str) -> bool {
        self.inner.mode == TransactionMode::VersionChange
            || self.inner.scope.iter().any(|s| s == name)
    }

    pub(crate) fn ensure_active(&self) -> EngineResult<()> {
        if self.state() == TransactionState::Active {
            Ok(())
        } else {
            Err(EngineError::inactive("transaction has finished"))
        }
    }

    pub(crate) fn ensure_writable(&self) -> EngineResult<()> {
        self.ensure_active()?;
        if self.inner.mode.is_writable() {
            Ok(())
        } else {
            Err(EngineError::read_only("transaction is read-only"))
        }
    }

    pub(crate) fn ensure_upgrade(&self) -> EngineResult<()> {
        if self.inner.mode != TransactionMode::VersionChange {
            return Err(EngineError::invalid_state(
                "schema changes need a versionchange transaction",
            ));
        }
        self.ensure_active()
    }

    pub(crate) fn db(&self) -> &Rc<RefCell<DatabaseState>> {
        self.inner.connection.db()
    }

    /// Queue `operation` against the database and deliver its outcome on
    /// `request` from a later turn.
    pub(crate) fn run_request<T, F>(&self, request: &MemRequest<T>, operation: F)
    where
        T: Clone + 'static,
        F: FnOnce(&mut DatabaseState) -> EngineResult<T> + 'static,
    {
        self.inner.outstanding.set(self.inner.outstanding.get() + 1);

        let transaction = self.clone();
        let request = request.clone();
        let task = move || {
            let inner = &transaction.inner;
            inner.outstanding.set(inner.outstanding.get() - 1);

            if transaction.state() != TransactionState::Active {
                request.fire_error(ErrorEvent::new(EngineError::abort(
                    "transaction aborted before the request ran",
                )));
                return;
            }

            let outcome = operation(&mut transaction.db().borrow_mut());
            match outcome {
                Ok(value) => request.fire_success(value),
                Err(error) => transaction.dispatch_request_error(&request, error),
            }
            transaction.schedule_commit_check();
        };

        if self.inner.started.get() {
            self.inner.connection.engine().event_loop.schedule(task);
        } else {
            self.inner.deferred.borrow_mut().push(Box::new(task));
        }
    }

    /// Start running requests unless an earlier live transaction still
    /// conflicts with this one.
    fn try_start(&self) {
        if self.inner.started.get() || self.state() != TransactionState::Active {
            return;
        }

        let waiting = {
            let state = self.db().borrow();
            state
                .transactions
                .iter()
                .take_while(|earlier| !Rc::ptr_eq(&earlier.inner, &self.inner))
                .any(|earlier| earlier.conflicts_with(self))
        };
        if waiting {
            return;
        }

        self.inner.started.set(true);
        if self.inner.mode == TransactionMode::ReadWrite {
            let state = self.db().borrow();
            let stores = self
                .inner
                .scope
                .iter()
                .filter_map(|name| state.stores.get(name).map(|data| (name.clone(), data.clone())))
                .collect();
            *self.inner.snapshot.borrow_mut() = Some(Snapshot::Scoped(stores));
        }

        self.schedule_commit_check();
        self.flush_deferred();
    }

    fn conflicts_with(&self, other: &Transaction) -> bool {
        if !self.inner.mode.is_writable() && !other.inner.mode.is_writable() {
            return false;
        }
        self.inner.mode == TransactionMode::VersionChange
            || other.inner.mode == TransactionMode::VersionChange
            || self.inner.scope.iter().any(|name| other.covers(name))
    }

    fn flush_deferred(&self) {
        let deferred = std::mem::take(&mut *self.inner.deferred.borrow_mut());
        let event_loop = &self.inner.connection.engine().event_loop;
        for task in deferred {
            event_loop.schedule(task);
        }
    }

    /// Leave the live list and start whichever waiting transactions no
    /// longer conflict.
    fn release(&self) {
        let waiting: Vec<Transaction> = {
            let mut state = self.db().borrow_mut();
            state
                .transactions
                .retain(|live| !Rc::ptr_eq(&live.inner, &self.inner));
            state
                .transactions
                .iter()
                .filter(|live| !live.inner.started.get())
                .cloned()
                .collect()
        };
        for transaction in waiting {
            transaction.try_start();
        }
    }

    fn dispatch_request_error<T: Clone>(&self, request: &MemRequest<T>, error: EngineError) {
        let event = ErrorEvent::new(error.clone());
        request.fire_error(event.clone());
        self.inner.errors.fire(event.clone());

        if !event.default_prevented() {
            self.inner.connection.engine().report_unhandled(&error);
            self.abort_with(error);
        }
    }

    pub(crate) fn abort_with(&self, error: EngineError) {
        if self.state() != TransactionState::Active {
            return;
        }
        self.inner.state.set(TransactionState::Aborted);
        *self.inner.error.borrow_mut() = Some(error.clone());
        self.rollback();
        // requests held while waiting fail ahead of the abort event
        self.flush_deferred();
        self.release();

        let engine = self.inner.connection.engine();
        engine.observe(
            Event::TransactionAborted,
            &[
                ("error", error.name().as_str()),
                ("id", &self.inner.id.to_string()),
                ("mode", self.inner.mode.as_str()),
            ],
        );

        // queued behind requests already waiting, which fail first
        let transaction = self.clone();
        engine.event_loop.schedule(move || {
            transaction.inner.aborts.fire(ErrorEvent::new(error));
        });
    }

    fn rollback(&self) {
        let Some(snapshot) = self.inner.snapshot.borrow_mut().take() else {
            return;
        };
        let mut state = self.db().borrow_mut();
        match snapshot {
            Snapshot::Scoped(stores) => {
                for (name, data) in stores {
                    state.stores.insert(name, data);
                }
            }
            Snapshot::Schema { version, stores } => {
                state.version = version;
                state.stores = stores;
            }
        }
    }

    fn schedule_commit_check(&self) {
        let transaction = self.clone();
        self.inner.connection.engine().event_loop.schedule(move || {
            transaction.try_commit();
        });
    }

    fn try_commit(&self) {
        let inner = &self.inner;
        if inner.state.get() != TransactionState::Active
            || !inner.started.get()
            || inner.outstanding.get() > 0
        {
            return;
        }
        inner.state.set(TransactionState::Committed);
        inner.snapshot.borrow_mut().take();
        self.release();

        inner.connection.engine().observe(
            Event::TransactionCommitted,
            &[("id", &inner.id.to_string()), ("mode", inner.mode.as_str())],
        );
        inner.complete.fire(());
    }
}

impl TransactionScope for Transaction {
    type Signal = ErrorEvent;

    fn add_complete_listener(&self, listener: Listener<()>) {
        self.inner.complete.add(listener);
    }

    fn add_error_listener(&self, listener: Listener<ErrorEvent>) {
        self.inner.errors.add(listener);
    }

    fn add_abort_listener(&self, listener: Listener<ErrorEvent>) {
        self.inner.aborts.add(listener);
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.inner.id)
            .field("mode", &self.inner.mode)
            .field("state", &self.state())
            .field("started", &self.inner.started.get())
            .field("outstanding", &self.inner.outstanding.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mem::testing::library;
    use crate::mem::ErrorName;
    use serde_json::json;

    #[test]
    fn test_commits_when_idle() {
        let (events, db) = library();
        let tx = db.transaction(&["books"], TransactionMode::ReadOnly).unwrap();

        assert_eq!(tx.state(), TransactionState::Active);
        events.run_until_idle();
        assert_eq!(tx.state(), TransactionState::Committed);
        assert_eq!(tx.error(), None);
    }

    #[test]
    fn test_finished_transaction_rejects_requests() {
        let (events, db) = library();
        let tx = db.transaction(&["books"], TransactionMode::ReadWrite).unwrap();
        let store = tx.object_store("books").unwrap();
        events.run_until_idle();

        let err = store.put(json!({"isbn": 1, "title": "Late"})).unwrap_err();
        assert_eq!(err.name(), ErrorName::TransactionInactiveError);
    }

    #[test]
    fn test_abort_rolls_back() {
        let (events, db) = library();
        let tx = db.transaction(&["books"], TransactionMode::ReadWrite).unwrap();
        let store = tx.object_store("books").unwrap();
        store.put(json!({"isbn": 1, "title": "Gone"})).unwrap();
        // commit check, then the put
        events.turn();
        events.turn();
        assert_eq!(db.db().borrow().stores["books"].records.len(), 1);

        tx.abort().unwrap();
        events.run_until_idle();
        assert_eq!(tx.state(), TransactionState::Aborted);
        assert_eq!(tx.error().map(|e| e.name()), Some(ErrorName::AbortError));
        assert!(db.db().borrow().stores["books"].records.is_empty());
        assert!(tx.abort().is_err());
    }

    #[test]
    fn test_scope_checks() {
        let (_events, db) = library();
        let tx = db.transaction(&["books"], TransactionMode::ReadOnly).unwrap();

        assert_eq!(
            tx.object_store("authors").unwrap_err().name(),
            ErrorName::NotFoundError
        );
        assert_eq!(
            db.transaction(&[], TransactionMode::ReadOnly).unwrap_err().name(),
            ErrorName::InvalidAccessError
        );
        assert_eq!(
            db.transaction(&["books"], TransactionMode::VersionChange)
                .unwrap_err()
                .name(),
            ErrorName::TypeError
        );
        assert_eq!(
            tx.create_object_store("authors", StoreParams::default())
                .unwrap_err()
                .name(),
            ErrorName::InvalidStateError
        );
    }

    #[test]
    fn test_read_only_rejects_writes() {
        let (_events, db) = library();
        let tx = db.transaction(&["books"], TransactionMode::ReadOnly).unwrap();
        let store = tx.object_store("books").unwrap();

        let err = store.put(json!({"isbn": 1})).unwrap_err();
        assert_eq!(err.name(), ErrorName::ReadOnlyError);
    }

    #[test]
    fn test_mode_names() {
        assert_eq!(TransactionMode::ReadWrite.as_str(), "readwrite");
        assert_eq!(
            serde_json::to_string(&TransactionMode::VersionChange).unwrap(),
            "\"versionchange\""
        );
    }
}
