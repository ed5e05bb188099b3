//! Object stores and indexes
//!
//! Argument problems (read-only transaction, finished transaction, unusable
//! key) are reported from the call itself. Everything that depends on the
//! stored data (constraint violations, generator exhaustion) arrives later
//! on the request's error channel.

use std::collections::BTreeSet;
use std::fmt;

use serde_json::Value;

use crate::handle::{CursorDirection, Key};

use super::cursor::{entries, CursorSource, MemCursor};
use super::database::{DatabaseState, IndexSchema, StoreData};
use super::errors::{EngineError, EngineResult};
use super::key_path::{extract_key, index_keys, inject_key};
use super::range::{in_range, KeyRange};
use super::request::MemRequest;
use super::transaction::{Transaction, TransactionState};

/// Options for [`Transaction::create_object_store`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreParams {
    /// In-line key location; `None` for out-of-line keys
    pub key_path: Option<String>,
    /// Generate keys for records that lack one
    pub auto_increment: bool,
}

impl StoreParams {
    /// In-line keys read from `path`
    pub fn key_path(path: &str) -> Self {
        Self {
            key_path: Some(path.to_string()),
            auto_increment: false,
        }
    }

    /// Out-of-line keys from a generator
    pub fn auto_increment() -> Self {
        Self {
            key_path: None,
            auto_increment: true,
        }
    }

    /// Generate keys for records missing one
    pub fn with_auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }
}

/// Options for [`ObjectStore::create_index`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexParams {
    /// No two records may share an index key
    pub unique: bool,
    /// Array values contribute one index entry per element
    pub multi_entry: bool,
}

impl IndexParams {
    /// Unique index
    pub fn unique() -> Self {
        Self {
            unique: true,
            multi_entry: false,
        }
    }

    /// Multi-entry index
    pub fn multi_entry() -> Self {
        Self {
            unique: false,
            multi_entry: true,
        }
    }
}

/// A store within a transaction
#[derive(Clone)]
pub struct ObjectStore {
    transaction: Transaction,
    name: String,
}

impl ObjectStore {
    pub(crate) fn new(transaction: Transaction, name: &str) -> Self {
        Self {
            transaction,
            name: name.to_string(),
        }
    }

    /// Store name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Transaction the handle belongs to
    pub fn transaction(&self) -> &Transaction {
        &self.transaction
    }

    /// Key path, or `None` for out-of-line keys
    pub fn key_path(&self) -> Option<String> {
        self.read(|data| data.key_path.clone()).ok().flatten()
    }

    /// Whether the store generates keys
    pub fn auto_increment(&self) -> bool {
        self.read(|data| data.auto_increment).unwrap_or(false)
    }

    /// Index names in sorted order
    pub fn index_names(&self) -> Vec<String> {
        self.read(|data| data.indexes.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn read<T>(&self, view: impl FnOnce(&StoreData) -> T) -> EngineResult<T> {
        let state = self.transaction.db().borrow();
        state.store(&self.name).map(view)
    }

    /// Insert or replace a record, resolving to its key
    pub fn put(&self, record: Value) -> EngineResult<MemRequest<Key>> {
        self.write(record, None, false)
    }

    /// Insert or replace a record stored under an out-of-line key
    pub fn put_with_key(&self, record: Value, key: impl Into<Key>) -> EngineResult<MemRequest<Key>> {
        self.write(record, Some(key.into()), false)
    }

    /// Insert a record. The request fails with `ConstraintError` if the
    /// key is taken.
    pub fn add(&self, record: Value) -> EngineResult<MemRequest<Key>> {
        self.write(record, None, true)
    }

    /// [`ObjectStore::add`] with an out-of-line key
    pub fn add_with_key(&self, record: Value, key: impl Into<Key>) -> EngineResult<MemRequest<Key>> {
        self.write(record, Some(key.into()), true)
    }

    fn write(
        &self,
        record: Value,
        key: Option<Key>,
        no_overwrite: bool,
    ) -> EngineResult<MemRequest<Key>> {
        self.transaction.ensure_writable()?;
        self.read(|data| validate_write(data, &record, key.as_ref()))??;

        let request = MemRequest::new();
        let name = self.name.clone();
        self.transaction.run_request(&request, move |state| {
            store_record(state, &name, record, key, no_overwrite)
        });
        Ok(request)
    }

    /// Record stored under `key`, if any
    pub fn get(&self, key: impl Into<Key>) -> EngineResult<MemRequest<Option<Value>>> {
        let key = valid_key(key.into())?;
        self.query(move |data| Ok(data.records.get(&key).cloned()))
    }

    /// Records in key order
    pub fn get_all(&self, range: Option<KeyRange>) -> EngineResult<MemRequest<Vec<Value>>> {
        self.query(move |data| {
            Ok(data
                .records
                .iter()
                .filter(|(key, _)| in_range(range.as_ref(), key))
                .map(|(_, record)| record.clone())
                .collect())
        })
    }

    /// Count records within `range`
    pub fn count(&self, range: Option<KeyRange>) -> EngineResult<MemRequest<u64>> {
        self.query(move |data| {
            Ok(data
                .records
                .keys()
                .filter(|key| in_range(range.as_ref(), key))
                .count() as u64)
        })
    }

    /// Delete the record under `key`
    pub fn delete(&self, key: impl Into<Key>) -> EngineResult<MemRequest<()>> {
        self.transaction.ensure_writable()?;
        let key = valid_key(key.into())?;
        self.mutate(move |data| {
            data.records.remove(&key);
            Ok(())
        })
    }

    /// Delete every record
    pub fn clear(&self) -> EngineResult<MemRequest<()>> {
        self.transaction.ensure_writable()?;
        self.mutate(|data| {
            data.records.clear();
            Ok(())
        })
    }

    fn query<T, F>(&self, view: F) -> EngineResult<MemRequest<T>>
    where
        T: Clone + 'static,
        F: FnOnce(&StoreData) -> EngineResult<T> + 'static,
    {
        self.transaction.ensure_active()?;
        self.read(|_| ())?;

        let request = MemRequest::new();
        let name = self.name.clone();
        self.transaction
            .run_request(&request, move |state| view(state.store(&name)?));
        Ok(request)
    }

    fn mutate<F>(&self, change: F) -> EngineResult<MemRequest<()>>
    where
        F: FnOnce(&mut StoreData) -> EngineResult<()> + 'static,
    {
        self.read(|_| ())?;

        let request = MemRequest::new();
        let name = self.name.clone();
        self.transaction
            .run_request(&request, move |state| change(state.store_mut(&name)?));
        Ok(request)
    }

    /// Traverse records in primary key order
    pub fn open_cursor(
        &self,
        range: Option<KeyRange>,
        direction: CursorDirection,
    ) -> EngineResult<MemRequest<Option<MemCursor>>> {
        MemCursor::open(
            &self.transaction,
            CursorSource::Store(self.name.clone()),
            range,
            direction,
        )
    }

    /// Handle to a named index
    pub fn index(&self, name: &str) -> EngineResult<Index> {
        if self.transaction.state() != TransactionState::Active {
            return Err(EngineError::invalid_state("transaction has finished"));
        }
        self.read(|data| data.index(name).map(|_| ()))??;
        Ok(Index {
            store: self.clone(),
            name: name.to_string(),
        })
    }

    /// Create an index. Only valid during an upgrade.
    ///
    /// Fails with `ConstraintError` if the name is taken, or if the index
    /// is unique and existing records already repeat a key.
    pub fn create_index(&self, name: &str, key_path: &str, params: IndexParams) -> EngineResult<Index> {
        self.transaction.ensure_upgrade()?;
        {
            let mut state = self.transaction.db().borrow_mut();
            let data = state.store_mut(&self.name)?;
            if data.indexes.contains_key(name) {
                return Err(EngineError::constraint(format!(
                    "index '{}' already exists",
                    name
                )));
            }

            let schema = IndexSchema {
                key_path: key_path.to_string(),
                unique: params.unique,
                multi_entry: params.multi_entry,
            };
            if schema.unique {
                let mut seen = BTreeSet::new();
                for record in data.records.values() {
                    for key in index_keys(record, &schema) {
                        if !seen.insert(key.clone()) {
                            return Err(EngineError::constraint(format!(
                                "existing records repeat key {} for unique index '{}'",
                                key, name
                            )));
                        }
                    }
                }
            }
            data.indexes.insert(name.to_string(), schema);
        }
        self.index(name)
    }

    /// Delete an index. Only valid during an upgrade.
    pub fn delete_index(&self, name: &str) -> EngineResult<()> {
        self.transaction.ensure_upgrade()?;
        let mut state = self.transaction.db().borrow_mut();
        let data = state.store_mut(&self.name)?;
        data.index(name)?;
        data.indexes.remove(name);
        Ok(())
    }
}

impl fmt::Debug for ObjectStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectStore")
            .field("name", &self.name)
            .field("transaction", &self.transaction.id())
            .finish()
    }
}

/// A secondary ordering over a store's records
#[derive(Clone)]
pub struct Index {
    store: ObjectStore,
    name: String,
}

impl Index {
    /// Index name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Store the index belongs to
    pub fn object_store(&self) -> &ObjectStore {
        &self.store
    }

    /// Key path the index reads
    pub fn key_path(&self) -> Option<String> {
        self.schema().map(|schema| schema.key_path)
    }

    /// Whether index keys are unique
    pub fn unique(&self) -> bool {
        self.schema().map_or(false, |schema| schema.unique)
    }

    /// Whether array values are spread into one entry per element
    pub fn multi_entry(&self) -> bool {
        self.schema().map_or(false, |schema| schema.multi_entry)
    }

    fn schema(&self) -> Option<IndexSchema> {
        self.store
            .read(|data| data.indexes.get(&self.name).cloned())
            .ok()
            .flatten()
    }

    fn source(&self) -> CursorSource {
        CursorSource::Index {
            store: self.store.name.clone(),
            index: self.name.clone(),
        }
    }

    fn query<T, F>(&self, range: Option<KeyRange>, view: F) -> EngineResult<MemRequest<T>>
    where
        T: Clone + 'static,
        F: FnOnce(Vec<super::cursor::Entry>) -> T + 'static,
    {
        let transaction = &self.store.transaction;
        transaction.ensure_active()?;
        self.schema()
            .ok_or_else(|| EngineError::not_found(format!("no index named '{}'", self.name)))?;

        let request = MemRequest::new();
        let source = self.source();
        transaction.run_request(&request, move |state| {
            Ok(view(entries(state, &source, range.as_ref())?))
        });
        Ok(request)
    }

    /// First record (lowest primary key) with index key `key`
    pub fn get(&self, key: impl Into<Key>) -> EngineResult<MemRequest<Option<Value>>> {
        let key = valid_key(key.into())?;
        self.query(Some(KeyRange::only(key)), |found| {
            found.into_iter().next().map(|entry| entry.value)
        })
    }

    /// Primary key of the first record with index key `key`
    pub fn get_key(&self, key: impl Into<Key>) -> EngineResult<MemRequest<Option<Key>>> {
        let key = valid_key(key.into())?;
        self.query(Some(KeyRange::only(key)), |found| {
            found.into_iter().next().map(|entry| entry.primary_key)
        })
    }

    /// Records in index order
    pub fn get_all(&self, range: Option<KeyRange>) -> EngineResult<MemRequest<Vec<Value>>> {
        self.query(range, |found| found.into_iter().map(|entry| entry.value).collect())
    }

    /// Index entries in range; multi-entry records count once per key
    pub fn count(&self, range: Option<KeyRange>) -> EngineResult<MemRequest<u64>> {
        self.query(range, |found| found.len() as u64)
    }

    /// Traverse records in index key order
    pub fn open_cursor(
        &self,
        range: Option<KeyRange>,
        direction: CursorDirection,
    ) -> EngineResult<MemRequest<Option<MemCursor>>> {
        MemCursor::open(&self.store.transaction, self.source(), range, direction)
    }
}

impl fmt::Debug for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Index")
            .field("store", &self.store.name)
            .field("name", &self.name)
            .finish()
    }
}

fn valid_key(key: Key) -> EngineResult<Key> {
    if key.is_valid() {
        Ok(key)
    } else {
        Err(EngineError::data(format!("{} is not a valid key", key)))
    }
}

fn validate_write(data: &StoreData, record: &Value, key: Option<&Key>) -> EngineResult<()> {
    match (&data.key_path, key) {
        (Some(_), Some(_)) => Err(EngineError::data(
            "store uses in-line keys, an explicit key is not allowed",
        )),
        (Some(path), None) => match extract_key(record, path)? {
            Some(_) => Ok(()),
            None if data.auto_increment => {
                let mut probe = record.clone();
                inject_key(&mut probe, path, &Key::Number(1.0))
            }
            None => Err(EngineError::data(format!(
                "record has no key at key path '{}'",
                path
            ))),
        },
        (None, Some(key)) => valid_key(key.clone()).map(|_| ()),
        (None, None) if data.auto_increment => Ok(()),
        (None, None) => Err(EngineError::data(
            "store uses out-of-line keys and has no key generator",
        )),
    }
}

fn store_record(
    state: &mut DatabaseState,
    name: &str,
    mut record: Value,
    key: Option<Key>,
    no_overwrite: bool,
) -> EngineResult<Key> {
    let data = state.store_mut(name)?;

    let key = match (key, data.key_path.clone()) {
        (Some(key), _) => key,
        (None, Some(path)) => match extract_key(&record, &path)? {
            Some(key) => key,
            None => {
                let key = data.generate_key()?;
                inject_key(&mut record, &path, &key)?;
                key
            }
        },
        (None, None) => data.generate_key()?,
    };

    if no_overwrite && data.records.contains_key(&key) {
        return Err(EngineError::constraint(format!(
            "key {} already exists in '{}'",
            key, name
        )));
    }
    check_unique(data, &key, &record)?;

    data.observe_key(&key);
    data.records.insert(key.clone(), record);
    Ok(key)
}

fn check_unique(data: &StoreData, key: &Key, record: &Value) -> EngineResult<()> {
    for (index_name, index) in data.indexes.iter().filter(|(_, index)| index.unique) {
        let keys = index_keys(record, index);
        if keys.is_empty() {
            continue;
        }
        for (primary_key, other) in &data.records {
            if primary_key == key {
                continue;
            }
            if let Some(taken) = index_keys(other, index)
                .into_iter()
                .find(|k| keys.contains(k))
            {
                return Err(EngineError::constraint(format!(
                    "unique index '{}' already contains key {}",
                    index_name, taken
                )));
            }
        }
    }
    Ok(())
}
