//! Keys and traversal directions
//!
//! Keys follow the ordering of the storage model they describe:
//! numbers < dates < strings < binary < arrays, with arrays compared
//! element-wise. Equality is structural and agrees with the ordering,
//! so `Key` can live in ordered sets and maps.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A storage key
#[derive(Debug, Clone)]
pub enum Key {
    /// Finite number
    Number(f64),
    /// Milliseconds since the epoch
    Date(f64),
    /// UTF-8 string
    String(String),
    /// Raw bytes
    Binary(Vec<u8>),
    /// Composite key
    Array(Vec<Key>),
}

impl Key {
    fn rank(&self) -> u8 {
        match self {
            Key::Number(_) => 0,
            Key::Date(_) => 1,
            Key::String(_) => 2,
            Key::Binary(_) => 3,
            Key::Array(_) => 4,
        }
    }

    /// Build a key from a JSON value.
    ///
    /// Returns `None` for values that cannot act as keys (null, booleans,
    /// objects, and arrays containing any of those).
    pub fn from_json(value: &Value) -> Option<Key> {
        match value {
            Value::Number(n) => n.as_f64().map(Key::Number),
            Value::String(s) => Some(Key::String(s.clone())),
            Value::Array(items) => items
                .iter()
                .map(Key::from_json)
                .collect::<Option<Vec<_>>>()
                .map(Key::Array),
            _ => None,
        }
    }

    /// Render the key as JSON.
    ///
    /// Dates become numbers and binary keys become arrays of bytes.
    pub fn to_json(&self) -> Value {
        match self {
            Key::Number(n) | Key::Date(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Key::String(s) => Value::String(s.clone()),
            Key::Binary(bytes) => Value::Array(bytes.iter().map(|b| Value::from(*b)).collect()),
            Key::Array(items) => Value::Array(items.iter().map(Key::to_json).collect()),
        }
    }

    /// Whether the key is well formed (no NaN anywhere inside it)
    pub fn is_valid(&self) -> bool {
        match self {
            Key::Number(n) | Key::Date(n) => !n.is_nan(),
            Key::String(_) | Key::Binary(_) => true,
            Key::Array(items) => items.iter().all(Key::is_valid),
        }
    }

    /// Numeric value, if this is a number key
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Key::Number(n) => Some(*n),
            _ => None,
        }
    }
}

fn cmp_f64(a: f64, b: f64) -> Ordering {
    // -0.0 and 0.0 are the same key
    a.partial_cmp(&b).unwrap_or_else(|| a.total_cmp(&b))
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Key::Number(a), Key::Number(b)) | (Key::Date(a), Key::Date(b)) => cmp_f64(*a, *b),
            (Key::String(a), Key::String(b)) => a.cmp(b),
            (Key::Binary(a), Key::Binary(b)) => a.cmp(b),
            (Key::Array(a), Key::Array(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Key {}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Number(n) => write!(f, "{}", n),
            Key::Date(ms) => write!(f, "date({})", ms),
            Key::String(s) => write!(f, "{:?}", s),
            Key::Binary(bytes) => write!(f, "binary({} bytes)", bytes.len()),
            Key::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<f64> for Key {
    fn from(n: f64) -> Self {
        Key::Number(n)
    }
}

impl From<i64> for Key {
    fn from(n: i64) -> Self {
        Key::Number(n as f64)
    }
}

impl From<i32> for Key {
    fn from(n: i32) -> Self {
        Key::Number(f64::from(n))
    }
}

impl From<u32> for Key {
    fn from(n: u32) -> Self {
        Key::Number(f64::from(n))
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::String(s.to_string())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::String(s)
    }
}

impl From<Vec<Key>> for Key {
    fn from(items: Vec<Key>) -> Self {
        Key::Array(items)
    }
}

/// Traversal direction of a cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CursorDirection {
    /// Ascending, every record
    #[default]
    Next,
    /// Ascending, first record of each distinct key
    NextUnique,
    /// Descending, every record
    Prev,
    /// Descending, first record of each distinct key
    PrevUnique,
}

impl CursorDirection {
    /// Returns the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            CursorDirection::Next => "next",
            CursorDirection::NextUnique => "nextunique",
            CursorDirection::Prev => "prev",
            CursorDirection::PrevUnique => "prevunique",
        }
    }

    /// Whether the direction visits each distinct key once
    pub fn is_unique(&self) -> bool {
        matches!(self, CursorDirection::NextUnique | CursorDirection::PrevUnique)
    }

    /// Whether the direction walks keys in descending order
    pub fn is_reverse(&self) -> bool {
        matches!(self, CursorDirection::Prev | CursorDirection::PrevUnique)
    }
}

impl fmt::Display for CursorDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeSet;

    #[test]
    fn test_type_ordering() {
        let number = Key::from(10);
        let date = Key::Date(0.0);
        let string = Key::from("a");
        let binary = Key::Binary(vec![0]);
        let array = Key::Array(vec![]);

        assert!(number < date);
        assert!(date < string);
        assert!(string < binary);
        assert!(binary < array);
    }

    #[test]
    fn test_negative_zero_equals_zero() {
        assert_eq!(Key::Number(-0.0), Key::Number(0.0));
    }

    #[test]
    fn test_arrays_compare_element_wise() {
        let a = Key::from(vec![Key::from("Fred"), Key::from(1)]);
        let b = Key::from(vec![Key::from("Fred"), Key::from(1)]);
        let c = Key::from(vec![Key::from("Fred"), Key::from(2)]);
        let prefix = Key::from(vec![Key::from("Fred")]);

        assert_eq!(a, b);
        assert!(a < c);
        assert!(prefix < a);

        let set: BTreeSet<Key> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_from_json() {
        assert_eq!(Key::from_json(&json!(3)), Some(Key::from(3)));
        assert_eq!(Key::from_json(&json!("x")), Some(Key::from("x")));
        assert_eq!(
            Key::from_json(&json!([1, "a"])),
            Some(Key::from(vec![Key::from(1), Key::from("a")]))
        );
        assert_eq!(Key::from_json(&json!(null)), None);
        assert_eq!(Key::from_json(&json!(true)), None);
        assert_eq!(Key::from_json(&json!([1, {}])), None);
    }

    #[test]
    fn test_to_json() {
        let key = Key::from(vec![Key::from(1), Key::from("a")]);
        assert_eq!(key.to_json(), json!([1.0, "a"]));
    }

    #[test]
    fn test_nan_is_invalid() {
        assert!(!Key::Number(f64::NAN).is_valid());
        assert!(!Key::from(vec![Key::Number(f64::NAN)]).is_valid());
        assert!(Key::from(1).is_valid());
    }

    #[test]
    fn test_direction_flags() {
        assert!(CursorDirection::NextUnique.is_unique());
        assert!(CursorDirection::PrevUnique.is_unique());
        assert!(!CursorDirection::Next.is_unique());
        assert!(CursorDirection::Prev.is_reverse());
        assert!(!CursorDirection::NextUnique.is_reverse());
    }

    #[test]
    fn test_direction_serde() {
        let json = serde_json::to_string(&CursorDirection::PrevUnique).unwrap();
        assert_eq!(json, "\"prevunique\"");
        let parsed: CursorDirection = serde_json::from_str("\"nextunique\"").unwrap();
        assert_eq!(parsed, CursorDirection::NextUnique);
    }
}
