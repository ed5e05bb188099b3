//! # Database Factory
//!
//! Entry point of the reference backend. Opening at a higher version than
//! the stored one runs an upgrade inside a versionchange transaction; the
//! open request succeeds only after that transaction commits.
//!
//! Upgrades and deletions need exclusive access. Open connections are sent
//! a version change notification first; any still open afterwards cause a
//! `blocked` signal, and the request resumes once the last one closes.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::handle::TransactionScope;
use crate::observability::{log_event, Event};

use super::config::EngineConfig;
use super::database::{Connection, DatabaseState, Shared, UpgradeEvent, VersionChangeEvent};
use super::errors::{EngineError, EngineResult, ErrorEvent};
use super::event_loop::EventLoop;
use super::request::{fire_unscoped_error, MemRequest, OpenRequest};
use super::transaction::{Transaction, TransactionMode};

/// State shared by a factory and every handle it creates
pub(crate) struct Engine {
    pub(crate) event_loop: EventLoop,
    pub(crate) config: EngineConfig,
    databases: RefCell<BTreeMap<String, Shared<DatabaseState>>>,
    unhandled: RefCell<Vec<EngineError>>,
}

impl Engine {
    pub(crate) fn observe(&self, event: Event, fields: &[(&str, &str)]) {
        log_event(self.config.log_severity, event, fields);
    }

    pub(crate) fn report_unhandled(&self, error: &EngineError) {
        self.observe(
            Event::UnhandledError,
            &[("error", error.message()), ("name", error.name().as_str())],
        );
        self.unhandled.borrow_mut().push(error.clone());
    }

    fn database(&self, name: &str) -> Shared<DatabaseState> {
        let mut databases = self.databases.borrow_mut();
        let db = databases
            .entry(name.to_string())
            .or_insert_with(|| Rc::new(RefCell::new(DatabaseState::new(name))));
        Rc::clone(db)
    }

    fn existing(&self, name: &str) -> Option<Shared<DatabaseState>> {
        self.databases.borrow().get(name).cloned()
    }
}

/// Opens and deletes databases
#[derive(Clone)]
pub struct Factory {
    engine: Rc<Engine>,
}

impl Factory {
    /// Backend that schedules its events on `event_loop`
    pub fn new(event_loop: &EventLoop, config: EngineConfig) -> Self {
        Self {
            engine: Rc::new(Engine {
                event_loop: event_loop.clone(),
                config,
                databases: RefCell::new(BTreeMap::new()),
                unhandled: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Loop the backend schedules on
    pub fn event_loop(&self) -> &EventLoop {
        &self.engine.event_loop
    }

    /// Backend configuration
    pub fn config(&self) -> &EngineConfig {
        &self.engine.config
    }

    /// Open a connection, upgrading first if `version` is above the stored
    /// version. `None` opens at the current version, or 1 for a new
    /// database.
    pub fn open(&self, name: &str, version: Option<u32>) -> EngineResult<OpenRequest> {
        if version == Some(0) {
            return Err(EngineError::type_error("version must be at least 1"));
        }

        let request = OpenRequest::new();
        let engine = Rc::clone(&self.engine);
        let name = name.to_string();
        let pending = request.clone();
        self.engine
            .event_loop
            .schedule(move || run_open(&engine, &name, version, &pending));
        Ok(request)
    }

    /// Delete a database and everything in it
    pub fn delete_database(&self, name: &str) -> MemRequest<()> {
        let request = MemRequest::exclusive();
        let engine = Rc::clone(&self.engine);
        let name = name.to_string();
        let pending = request.clone();
        self.engine
            .event_loop
            .schedule(move || run_delete(&engine, &name, &pending));
        request
    }

    /// Names of databases that have been created, in sorted order
    pub fn database_names(&self) -> Vec<String> {
        self.engine
            .databases
            .borrow()
            .iter()
            .filter(|(_, db)| db.borrow().version > 0)
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Errors no listener prevented, oldest first
    pub fn unhandled_errors(&self) -> Vec<EngineError> {
        self.engine.unhandled.borrow().clone()
    }
}

impl fmt::Debug for Factory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Factory")
            .field("databases", &self.database_names())
            .field("config", &self.engine.config)
            .finish()
    }
}

fn run_open(engine: &Rc<Engine>, name: &str, version: Option<u32>, request: &OpenRequest) {
    let db = engine.database(name);
    let current = db.borrow().version;
    let requested = version.unwrap_or_else(|| current.max(1));

    if requested < current {
        let error = EngineError::version(format!(
            "requested version {} is below the stored version {}",
            requested, current
        ));
        fail_unscoped(engine, request.request(), error);
        return;
    }

    if requested == current {
        let connection = Connection::open(engine, &db, current);
        engine.observe(
            Event::DatabaseOpened,
            &[("name", name), ("version", &current.to_string())],
        );
        request.request().fire_success(connection);
        return;
    }

    let retry = {
        let engine = Rc::clone(engine);
        let name = name.to_string();
        let request = request.clone();
        move || run_open(&engine, &name, version, &request)
    };
    if acquire_exclusive(engine, &db, Some(requested), request.request(), retry) {
        run_upgrade(engine, &db, requested, request);
    }
}

fn run_upgrade(engine: &Rc<Engine>, db: &Shared<DatabaseState>, requested: u32, request: &OpenRequest) {
    let old_version = db.borrow().version;
    let connection = Connection::open(engine, db, requested);
    let transaction = Transaction::begin(&connection, Vec::new(), TransactionMode::VersionChange);
    db.borrow_mut().version = requested;

    request.fire_upgrade(UpgradeEvent {
        database: connection.clone(),
        transaction: transaction.clone(),
        old_version,
        new_version: requested,
    });

    let on_commit = {
        let engine = Rc::clone(engine);
        let request = request.clone();
        let connection = connection.clone();
        move |()| {
            engine.observe(
                Event::DatabaseUpgraded,
                &[
                    ("name", connection.name()),
                    ("new_version", &requested.to_string()),
                    ("old_version", &old_version.to_string()),
                ],
            );
            request.request().fire_success(connection.clone());
        }
    };
    transaction.add_complete_listener(Box::new(on_commit));

    let on_abort = {
        let engine = Rc::clone(engine);
        let request = request.clone();
        move |_: ErrorEvent| {
            connection.close();
            fail_unscoped(
                &engine,
                request.request(),
                EngineError::abort("upgrade transaction was aborted"),
            );
        }
    };
    transaction.add_abort_listener(Box::new(on_abort));
}

fn run_delete(engine: &Rc<Engine>, name: &str, request: &MemRequest<()>) {
    let Some(db) = engine.existing(name) else {
        request.fire_success(());
        return;
    };

    let retry = {
        let engine = Rc::clone(engine);
        let name = name.to_string();
        let request = request.clone();
        move || run_delete(&engine, &name, &request)
    };
    if !acquire_exclusive(engine, &db, None, request, retry) {
        return;
    }

    engine.databases.borrow_mut().remove(name);
    engine.observe(Event::DatabaseDeleted, &[("name", name)]);
    request.fire_success(());
}

/// Ask open connections to close. Returns true when none remain open;
/// otherwise parks `retry` until they do and signals `blocked`.
fn acquire_exclusive<T: Clone>(
    engine: &Rc<Engine>,
    db: &Shared<DatabaseState>,
    new_version: Option<u32>,
    request: &MemRequest<T>,
    retry: impl FnOnce() + 'static,
) -> bool {
    let old_version = db.borrow().version;
    let open = db.borrow_mut().open_connections();
    for connection in &open {
        connection.fire_version_change(VersionChangeEvent {
            old_version,
            new_version,
        });
    }
    drop(open);

    let still_open = db.borrow_mut().open_connections().len();
    if still_open == 0 {
        return true;
    }

    let name = db.borrow().name.clone();
    engine.observe(
        Event::OpenBlocked,
        &[("name", &name), ("open_connections", &still_open.to_string())],
    );
    db.borrow_mut().wait_for_close(retry);
    request.fire_blocked(ErrorEvent::new(EngineError::blocked(format!(
        "{} connection(s) to '{}' are still open",
        still_open, name
    ))));
    false
}

fn fail_unscoped<T: Clone>(engine: &Engine, request: &MemRequest<T>, error: EngineError) {
    let event = ErrorEvent::new(error.clone());
    if !fire_unscoped_error(request, &event) {
        engine.report_unhandled(&error);
    }
}
