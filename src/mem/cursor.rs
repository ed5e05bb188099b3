//! # Cursors
//!
//! Each position is a snapshot of one (key, primary key, record) entry. A
//! continuation queues a seek on the transaction; the next position, or
//! `None` at the end, arrives on the same request that opened the cursor.
//!
//! Unique directions visit only the first record (lowest primary key) per
//! key. With `EngineConfig::duplicate_unique_steps` set, unique traversals
//! of non-multi-entry indexes visit every record instead, the way some
//! engines do.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use crate::handle::{CursorDirection, CursorPosition, Key};

use super::database::DatabaseState;
use super::errors::{EngineError, EngineResult};
use super::key_path::index_keys;
use super::range::{in_range, KeyRange};
use super::request::MemRequest;
use super::transaction::Transaction;

#[derive(Debug, Clone)]
pub(crate) enum CursorSource {
    Store(String),
    Index { store: String, index: String },
}

impl CursorSource {
    fn multi_entry(&self, state: &DatabaseState) -> EngineResult<bool> {
        match self {
            CursorSource::Store(store) => state.store(store).map(|_| false),
            CursorSource::Index { store, index } => {
                Ok(state.store(store)?.index(index)?.multi_entry)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Entry {
    pub key: Key,
    pub primary_key: Key,
    pub value: Value,
}

/// Entries of `source` within `range`, sorted by key then primary key
pub(crate) fn entries(
    state: &DatabaseState,
    source: &CursorSource,
    range: Option<&KeyRange>,
) -> EngineResult<Vec<Entry>> {
    match source {
        CursorSource::Store(store) => Ok(state
            .store(store)?
            .records
            .iter()
            .filter(|(key, _)| in_range(range, key))
            .map(|(key, value)| Entry {
                key: key.clone(),
                primary_key: key.clone(),
                value: value.clone(),
            })
            .collect()),
        CursorSource::Index { store, index } => {
            let data = state.store(store)?;
            let schema = data.index(index)?;

            let mut found = Vec::new();
            for (primary_key, value) in &data.records {
                for key in index_keys(value, schema) {
                    if in_range(range, &key) {
                        found.push(Entry {
                            key,
                            primary_key: primary_key.clone(),
                            value: value.clone(),
                        });
                    }
                }
            }
            found.sort_by(|a, b| {
                a.key
                    .cmp(&b.key)
                    .then_with(|| a.primary_key.cmp(&b.primary_key))
            });
            Ok(found)
        }
    }
}

enum Target {
    Next,
    AtLeast(Key),
    Skip(u32),
}

struct Traversal {
    transaction: Transaction,
    request: MemRequest<Option<MemCursor>>,
    source: CursorSource,
    range: Option<KeyRange>,
    /// Reported to callers
    direction: CursorDirection,
    /// Used for seeking
    effective: CursorDirection,
    multi_entry: bool,
}

/// One position of a traversal
#[derive(Clone)]
pub struct MemCursor {
    traversal: Rc<Traversal>,
    key: Key,
    primary_key: Key,
    value: Value,
    got_value: Rc<Cell<bool>>,
}

impl MemCursor {
    pub(crate) fn open(
        transaction: &Transaction,
        source: CursorSource,
        range: Option<KeyRange>,
        direction: CursorDirection,
    ) -> EngineResult<MemRequest<Option<MemCursor>>> {
        transaction.ensure_active()?;
        let multi_entry = source.multi_entry(&transaction.db().borrow())?;

        let duplicate_steps = transaction.database().engine().config.duplicate_unique_steps
            && direction.is_unique()
            && matches!(source, CursorSource::Index { .. })
            && !multi_entry;
        let effective = match direction {
            CursorDirection::NextUnique if duplicate_steps => CursorDirection::Next,
            CursorDirection::PrevUnique if duplicate_steps => CursorDirection::Prev,
            other => other,
        };

        let request = MemRequest::new();
        let traversal = Rc::new(Traversal {
            transaction: transaction.clone(),
            request: request.clone(),
            source,
            range,
            direction,
            effective,
            multi_entry,
        });
        schedule_seek(&traversal, None, Target::Next);
        Ok(request)
    }

    fn proceed(&self, target: Target) -> EngineResult<()> {
        self.traversal.transaction.ensure_active()?;
        if !self.got_value.get() {
            return Err(EngineError::invalid_state(
                "cursor was already continued from this position",
            ));
        }
        self.got_value.set(false);

        let from = (self.key.clone(), self.primary_key.clone());
        schedule_seek(&self.traversal, Some(from), target);
        Ok(())
    }
}

fn schedule_seek(traversal: &Rc<Traversal>, from: Option<(Key, Key)>, target: Target) {
    let seeker = Rc::clone(traversal);
    traversal
        .transaction
        .run_request(&traversal.request, move |state| {
            let found = seek(state, &seeker, from.as_ref(), &target)?;
            Ok(found.map(|entry| MemCursor {
                traversal: Rc::clone(&seeker),
                key: entry.key,
                primary_key: entry.primary_key,
                value: entry.value,
                got_value: Rc::new(Cell::new(true)),
            }))
        });
}

fn seek(
    state: &DatabaseState,
    traversal: &Traversal,
    from: Option<&(Key, Key)>,
    target: &Target,
) -> EngineResult<Option<Entry>> {
    let direction = traversal.effective;
    let mut candidates = entries(state, &traversal.source, traversal.range.as_ref())?;
    if direction.is_unique() {
        // sorted by primary key within a key, so the survivor is the lowest
        candidates.dedup_by(|later, first| later.key == first.key);
    }
    if direction.is_reverse() {
        candidates.reverse();
    }

    let beyond = |entry: &Entry| match from {
        None => true,
        Some((key, primary_key)) => match direction {
            CursorDirection::Next => (&entry.key, &entry.primary_key) > (key, primary_key),
            CursorDirection::Prev => (&entry.key, &entry.primary_key) < (key, primary_key),
            CursorDirection::NextUnique => &entry.key > key,
            CursorDirection::PrevUnique => &entry.key < key,
        },
    };
    let reaches = |entry: &Entry| match target {
        Target::AtLeast(key) if direction.is_reverse() => &entry.key <= key,
        Target::AtLeast(key) => &entry.key >= key,
        _ => true,
    };
    let skip = match target {
        Target::Skip(count) => (*count as usize).saturating_sub(1),
        _ => 0,
    };

    Ok(candidates
        .into_iter()
        .filter(|entry| beyond(entry) && reaches(entry))
        .nth(skip))
}

impl CursorPosition for MemCursor {
    type Value = Value;
    type Error = EngineError;

    fn key(&self) -> &Key {
        &self.key
    }

    fn primary_key(&self) -> &Key {
        &self.primary_key
    }

    fn value(&self) -> &Value {
        &self.value
    }

    fn direction(&self) -> CursorDirection {
        self.traversal.direction
    }

    fn source_is_multi_entry(&self) -> bool {
        self.traversal.multi_entry
    }

    fn continue_(&self) -> EngineResult<()> {
        self.proceed(Target::Next)
    }

    fn continue_to(&self, key: &Key) -> EngineResult<()> {
        if !key.is_valid() {
            return Err(EngineError::data(format!("{} is not a valid key", key)));
        }
        let behind = if self.traversal.direction.is_reverse() {
            key >= &self.key
        } else {
            key <= &self.key
        };
        if behind {
            return Err(EngineError::data(format!(
                "{} does not lie beyond the current key {}",
                key, self.key
            )));
        }
        self.proceed(Target::AtLeast(key.clone()))
    }

    fn advance(&self, count: u32) -> EngineResult<()> {
        if count == 0 {
            return Err(EngineError::type_error("advance count must be positive"));
        }
        self.proceed(Target::Skip(count))
    }
}

impl fmt::Debug for MemCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemCursor")
            .field("key", &self.key)
            .field("primary_key", &self.primary_key)
            .field("direction", &self.traversal.direction)
            .finish()
    }
}
