//! Fixtures for backend unit tests

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::json;

use crate::handle::OperationHandle;

use super::{
    Connection, EngineConfig, EventLoop, Factory, IndexParams, StoreParams, TransactionMode,
    TransactionState, UpgradeEvent,
};

/// A "library" database at version 2 with `books` (in-line `isbn` keys,
/// indexes `by_title` unique, `by_author`, `by_tag` multi-entry) and `notes`
/// (generated `id` keys)
pub(crate) fn library() -> (EventLoop, Connection) {
    library_with(EngineConfig::default())
}

pub(crate) fn library_with(config: EngineConfig) -> (EventLoop, Connection) {
    let events = EventLoop::new();
    let factory = Factory::new(&events, config);
    let request = factory.open("library", Some(2)).unwrap();

    request.on_upgrade_needed(|upgrade: UpgradeEvent| {
        let tx = &upgrade.transaction;
        let books = tx
            .create_object_store("books", StoreParams::key_path("isbn"))
            .unwrap();
        books
            .create_index("by_title", "title", IndexParams::unique())
            .unwrap();
        books
            .create_index("by_author", "author", IndexParams::default())
            .unwrap();
        books
            .create_index("by_tag", "tags", IndexParams::multi_entry())
            .unwrap();
        tx.create_object_store("notes", StoreParams::key_path("id").with_auto_increment())
            .unwrap();
    });

    let opened = Rc::new(RefCell::new(None));
    let sink = Rc::clone(&opened);
    request.add_success_listener(Box::new(move |db| *sink.borrow_mut() = Some(db)));
    events.run_until_idle();

    let db = opened.borrow_mut().take().unwrap();
    (events, db)
}

/// Commit three books
pub(crate) fn seed(events: &EventLoop, db: &Connection) {
    let tx = db
        .transaction(&["books"], TransactionMode::ReadWrite)
        .unwrap();
    let books = tx.object_store("books").unwrap();
    for record in [
        json!({"isbn": 123456, "title": "Quarry Memories", "author": "Fred", "tags": ["classic", "stone"]}),
        json!({"isbn": 234567, "title": "Water Buffaloes", "author": "Fred", "tags": ["water", "classic"]}),
        json!({"isbn": 345678, "title": "Bedrock Nights", "author": "Barney", "tags": []}),
    ] {
        books.put(record).unwrap();
    }
    events.run_until_idle();
    assert_eq!(tx.state(), TransactionState::Committed);
}
