//! Shared fixtures for integration tests
//!
//! Every test gets its own event loop and backend, so nothing leaks
//! between tests.

#![allow(dead_code)]

use std::future::Future;

use idb_settle::mem::{
    Connection, EngineConfig, EventLoop, Factory, IndexParams, StoreParams, TransactionMode,
    UpgradeEvent,
};
use idb_settle::{request, request_transaction};
use serde_json::{json, Value};

/// Drive `future` on the loop, panicking if the loop drains first
pub fn settle<F: Future>(events: &EventLoop, future: F) -> F::Output {
    events.block_on(future).expect("event loop stalled")
}

/// Create the "library" database at version 2:
///
/// - `books`: in-line `isbn` keys; indexes `by_title` (unique),
///   `by_author`, `by_tag` (multi-entry)
/// - `notes`: generated `id` keys
pub fn open_library(config: EngineConfig) -> (EventLoop, Factory, Connection) {
    let events = EventLoop::new();
    let factory = Factory::new(&events, config);

    let open = factory.open("library", Some(2)).unwrap();
    open.on_upgrade_needed(|upgrade: UpgradeEvent| {
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

    let db = settle(&events, request(&open)).unwrap();
    (events, factory, db)
}

pub fn books() -> Vec<Value> {
    vec![
        json!({"isbn": 123456, "title": "Quarry Memories", "author": "Fred", "tags": ["classic", "stone"]}),
        json!({"isbn": 234567, "title": "Water Buffaloes", "author": "Fred", "tags": ["water", "classic"]}),
        json!({"isbn": 345678, "title": "Bedrock Nights", "author": "Barney", "tags": []}),
    ]
}

/// Library with the three books committed
pub fn seeded_library(config: EngineConfig) -> (EventLoop, Factory, Connection) {
    let (events, factory, db) = open_library(config);

    let tx = db.transaction(&["books"], TransactionMode::ReadWrite).unwrap();
    let store = tx.object_store("books").unwrap();
    for book in books() {
        store.put(book).unwrap();
    }
    settle(&events, request_transaction(&tx)).unwrap();

    (events, factory, db)
}

/// Backend that repeats keys in unique traversals of plain indexes
pub fn duplicating() -> EngineConfig {
    EngineConfig {
        duplicate_unique_steps: true,
        ..EngineConfig::default()
    }
}
