//! Dotted key paths over JSON records
//!
//! `"author.name"` reads `record["author"]["name"]`. The empty path names
//! the record itself.

use serde_json::{Map, Value};

use crate::handle::Key;

use super::database::IndexSchema;
use super::errors::{EngineError, EngineResult};

pub(crate) fn evaluate<'a>(record: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(record);
    }
    path.split('.')
        .try_fold(record, |current, segment| current.as_object()?.get(segment))
}

/// Key at `path`, `None` when the path is absent from the record.
///
/// A value that is present but unusable as a key is a `DataError`.
pub(crate) fn extract_key(record: &Value, path: &str) -> EngineResult<Option<Key>> {
    let Some(value) = evaluate(record, path) else {
        return Ok(None);
    };
    match Key::from_json(value).filter(Key::is_valid) {
        Some(key) => Ok(Some(key)),
        None => Err(EngineError::data(format!(
            "value at key path '{}' is not a valid key",
            path
        ))),
    }
}

/// Keys a record contributes to an index, deduplicated and sorted.
///
/// Records without a valid key at the index's path are left out of it.
pub(crate) fn index_keys(record: &Value, index: &IndexSchema) -> Vec<Key> {
    let Some(value) = evaluate(record, &index.key_path) else {
        return Vec::new();
    };

    let mut keys = match (value, index.multi_entry) {
        (Value::Array(items), true) => items
            .iter()
            .filter_map(Key::from_json)
            .filter(Key::is_valid)
            .collect(),
        _ => Key::from_json(value)
            .filter(Key::is_valid)
            .into_iter()
            .collect::<Vec<_>>(),
    };
    keys.sort();
    keys.dedup();
    keys
}

/// Write a generated key into the record at `path`, creating
/// intermediate objects as needed.
pub(crate) fn inject_key(record: &mut Value, path: &str, key: &Key) -> EngineResult<()> {
    let unusable = || EngineError::data(format!("cannot write a key at key path '{}'", path));

    let mut segments: Vec<&str> = path.split('.').collect();
    let last = segments.pop().filter(|s| !s.is_empty()).ok_or_else(unusable)?;

    let mut current = record;
    for segment in segments {
        let object = current.as_object_mut().ok_or_else(unusable)?;
        current = object
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    let object = current.as_object_mut().ok_or_else(unusable)?;
    object.insert(last.to_string(), key.to_json());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn index(path: &str, multi_entry: bool) -> IndexSchema {
        IndexSchema {
            key_path: path.to_string(),
            unique: false,
            multi_entry,
        }
    }

    #[test]
    fn test_evaluate_nested() {
        let record = json!({"author": {"name": "Fred"}});
        assert_eq!(evaluate(&record, "author.name"), Some(&json!("Fred")));
        assert_eq!(evaluate(&record, "author.age"), None);
        assert_eq!(evaluate(&record, ""), Some(&record));
    }

    #[test]
    fn test_extract_rejects_non_keys() {
        let record = json!({"id": true});
        assert!(extract_key(&record, "id").is_err());
        assert_eq!(extract_key(&record, "missing").unwrap(), None);
        assert_eq!(
            extract_key(&json!({"id": 4}), "id").unwrap(),
            Some(Key::from(4))
        );
    }

    #[test]
    fn test_multi_entry_keys_are_distinct() {
        let record = json!({"tags": ["b", "a", "b", null]});
        assert_eq!(
            index_keys(&record, &index("tags", true)),
            vec![Key::from("a"), Key::from("b")]
        );
        // without multi-entry the invalid element spoils the whole array
        assert!(index_keys(&record, &index("tags", false)).is_empty());
    }

    #[test]
    fn test_inject_creates_parents() {
        let mut record = json!({"title": "Quarry Memories"});
        inject_key(&mut record, "meta.id", &Key::from(3)).unwrap();
        assert_eq!(record["meta"]["id"], json!(3.0));

        let mut scalar = json!(5);
        assert!(inject_key(&mut scalar, "id", &Key::from(1)).is_err());
    }
}
