//! Database state and connections

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

use serde_json::Value;

use crate::handle::Key;

use super::errors::{EngineError, EngineResult};
use super::factory::Engine;
use super::listeners::ListenerSet;
use super::store::StoreParams;
use super::transaction::{Transaction, TransactionMode};

pub(crate) type Shared<T> = Rc<RefCell<T>>;

/// Largest key a generator hands out
const MAX_GENERATED_KEY: u64 = 1 << 53;

#[derive(Debug, Clone)]
pub(crate) struct IndexSchema {
    pub key_path: String,
    pub unique: bool,
    pub multi_entry: bool,
}

/// Records of one object store, ordered by primary key
#[derive(Debug, Clone)]
pub(crate) struct StoreData {
    pub key_path: Option<String>,
    pub auto_increment: bool,
    pub next_key: u64,
    pub records: BTreeMap<Key, Value>,
    pub indexes: BTreeMap<String, IndexSchema>,
}

impl StoreData {
    pub fn new(params: &StoreParams) -> Self {
        Self {
            key_path: params.key_path.clone(),
            auto_increment: params.auto_increment,
            next_key: 1,
            records: BTreeMap::new(),
            indexes: BTreeMap::new(),
        }
    }

    pub fn generate_key(&mut self) -> EngineResult<Key> {
        if self.next_key > MAX_GENERATED_KEY {
            return Err(EngineError::constraint("key generator exhausted"));
        }
        let key = Key::Number(self.next_key as f64);
        self.next_key += 1;
        Ok(key)
    }

    /// Keep the generator ahead of explicitly supplied numeric keys
    pub fn observe_key(&mut self, key: &Key) {
        if !self.auto_increment {
            return;
        }
        if let Some(n) = key.as_number() {
            if n >= self.next_key as f64 {
                self.next_key = if n >= MAX_GENERATED_KEY as f64 {
                    MAX_GENERATED_KEY + 1
                } else {
                    n.floor() as u64 + 1
                };
            }
        }
    }

    pub fn index(&self, name: &str) -> EngineResult<&IndexSchema> {
        self.indexes
            .get(name)
            .ok_or_else(|| EngineError::not_found(format!("no index named '{}'", name)))
    }
}

type Task = Box<dyn FnOnce()>;

/// Everything stored under one database name
pub(crate) struct DatabaseState {
    pub name: String,
    pub version: u32,
    pub stores: BTreeMap<String, StoreData>,
    /// Unfinished transactions, oldest first
    pub transactions: Vec<Transaction>,
    connections: Vec<Weak<ConnectionInner>>,
    waiting: Vec<Task>,
}

impl DatabaseState {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            version: 0,
            stores: BTreeMap::new(),
            transactions: Vec::new(),
            connections: Vec::new(),
            waiting: Vec::new(),
        }
    }

    pub fn store(&self, name: &str) -> EngineResult<&StoreData> {
        self.stores
            .get(name)
            .ok_or_else(|| EngineError::not_found(format!("no object store named '{}'", name)))
    }

    pub fn store_mut(&mut self, name: &str) -> EngineResult<&mut StoreData> {
        self.stores
            .get_mut(name)
            .ok_or_else(|| EngineError::not_found(format!("no object store named '{}'", name)))
    }

    pub fn open_connections(&mut self) -> Vec<Connection> {
        self.connections.retain(|weak| {
            weak.upgrade()
                .map_or(false, |inner| !inner.closed.get())
        });
        self.connections
            .iter()
            .filter_map(Weak::upgrade)
            .map(|inner| Connection { inner })
            .collect()
    }

    /// Park work until every connection has closed
    pub fn wait_for_close(&mut self, task: impl FnOnce() + 'static) {
        self.waiting.push(Box::new(task));
    }

    fn take_waiting(&mut self) -> Vec<Task> {
        if self.open_connections().is_empty() {
            std::mem::take(&mut self.waiting)
        } else {
            Vec::new()
        }
    }
}

/// Delivered to open connections when another party needs exclusive access
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionChangeEvent {
    /// Version the connection is at
    pub old_version: u32,
    /// `None` when the database is being deleted
    pub new_version: Option<u32>,
}

/// Delivered to upgrade-needed callbacks
#[derive(Debug, Clone)]
pub struct UpgradeEvent {
    /// The connection being opened
    pub database: Connection,
    /// Versionchange transaction for schema changes
    pub transaction: Transaction,
    /// Stored version before the upgrade; 0 for a new database
    pub old_version: u32,
    /// Version being opened
    pub new_version: u32,
}

pub(crate) struct ConnectionInner {
    engine: Rc<Engine>,
    db: Shared<DatabaseState>,
    name: String,
    version: Cell<u32>,
    closed: Cell<bool>,
    version_change: ListenerSet<VersionChangeEvent>,
}

/// An open connection to a database
#[derive(Clone)]
pub struct Connection {
    inner: Rc<ConnectionInner>,
}

impl Connection {
    pub(crate) fn open(engine: &Rc<Engine>, db: &Shared<DatabaseState>, version: u32) -> Self {
        let name = db.borrow().name.clone();
        let inner = Rc::new(ConnectionInner {
            engine: Rc::clone(engine),
            db: Rc::clone(db),
            name,
            version: Cell::new(version),
            closed: Cell::new(false),
            version_change: ListenerSet::new(),
        });
        db.borrow_mut().connections.push(Rc::downgrade(&inner));
        Self { inner }
    }

    /// Database name
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Version this connection was opened at
    pub fn version(&self) -> u32 {
        self.inner.version.get()
    }

    /// Whether `close` has been called
    pub fn is_closed(&self) -> bool {
        self.inner.closed.get()
    }

    /// Store names in sorted order
    pub fn object_store_names(&self) -> Vec<String> {
        self.inner.db.borrow().stores.keys().cloned().collect()
    }

    /// Start a transaction over `stores`
    ///
    /// Versionchange transactions are only created by the factory during
    /// an upgrade.
    pub fn transaction(&self, stores: &[&str], mode: TransactionMode) -> EngineResult<Transaction> {
        if self.is_closed() {
            return Err(EngineError::invalid_state("connection is closed"));
        }
        if mode == TransactionMode::VersionChange {
            return Err(EngineError::type_error(
                "versionchange transactions are created by upgrades",
            ));
        }
        if stores.is_empty() {
            return Err(EngineError::invalid_access("transaction scope is empty"));
        }

        let mut scope = Vec::with_capacity(stores.len());
        {
            let state = self.inner.db.borrow();
            for name in stores {
                state.store(name)?;
                if !scope.iter().any(|s: &String| s.as_str() == *name) {
                    scope.push(name.to_string());
                }
            }
        }
        Ok(Transaction::begin(self, scope, mode))
    }

    /// Close the connection. Exclusive requests waiting on it resume once
    /// no other connection is open.
    pub fn close(&self) {
        if self.inner.closed.replace(true) {
            return;
        }
        let waiting = self.inner.db.borrow_mut().take_waiting();
        for task in waiting {
            self.inner.engine.event_loop.schedule(task);
        }
    }

    /// Register a listener for version change notifications.
    pub fn on_version_change(&self, listener: impl FnMut(VersionChangeEvent) + 'static) {
        self.inner.version_change.add(Box::new(listener));
    }

    /// Close this connection whenever another party needs exclusive access.
    pub fn close_on_version_change(&self) {
        let weak = Rc::downgrade(&self.inner);
        self.on_version_change(move |_| {
            if let Some(inner) = weak.upgrade() {
                Connection { inner }.close();
            }
        });
    }

    pub(crate) fn fire_version_change(&self, event: VersionChangeEvent) {
        if !self.is_closed() {
            self.inner.version_change.fire(event);
        }
    }

    pub(crate) fn engine(&self) -> &Rc<Engine> {
        &self.inner.engine
    }

    pub(crate) fn db(&self) -> &Shared<DatabaseState> {
        &self.inner.db
    }

    pub(crate) fn create_store(&self, name: &str, params: &StoreParams) -> EngineResult<()> {
        let mut state = self.inner.db.borrow_mut();
        if state.stores.contains_key(name) {
            return Err(EngineError::constraint(format!(
                "object store '{}' already exists",
                name
            )));
        }
        state.stores.insert(name.to_string(), StoreData::new(params));
        Ok(())
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("name", &self.inner.name)
            .field("version", &self.version())
            .field("closed", &self.is_closed())
            .finish()
    }
}
