use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::Value;

/// A key tuple in effective key column order.
///
/// The empty tuple is the unbounded sentinel. As the start of a range it sorts before every real
/// key, which the derived lexicographic ordering already gives us. As the end of a range it must
/// be treated as greater than every real key, see [`Key::cmp_as_upper_bound`].
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Key(Vec<Value>);

impl Key {
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    /// The unbounded sentinel.
    pub fn unbounded() -> Self {
        Self(Vec::new())
    }

    pub fn is_unbounded(&self) -> bool {
        self.0.is_empty()
    }

    pub fn values(&self) -> &[Value] {
        &self.0
    }

    pub fn into_values(self) -> Vec<Value> {
        self.0
    }

    /// Compares two range ends, treating the unbounded sentinel as positive infinity.
    pub fn cmp_as_upper_bound(&self, other: &Key) -> Ordering {
        match (self.is_unbounded(), other.is_unbounded()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => self.cmp(other),
        }
    }
}

impl From<Vec<Value>> for Key {
    fn from(values: Vec<Value>) -> Self {
        Self(values)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (index, value) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{value}")?;
        }
        f.write_str("]")
    }
}

/// A left-exclusive, right-inclusive key interval `(prev_key, last_key]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct KeyRange {
    pub prev_key: Key,
    pub last_key: Key,
}

impl KeyRange {
    pub fn new(prev_key: Key, last_key: Key) -> Self {
        Self { prev_key, last_key }
    }

    /// The range covering every key.
    pub fn all() -> Self {
        Self::default()
    }

    /// Everything up to and including `last_key`.
    pub fn up_to(last_key: Key) -> Self {
        Self::new(Key::unbounded(), last_key)
    }

    /// Everything strictly after `prev_key`.
    pub fn after(prev_key: Key) -> Self {
        Self::new(prev_key, Key::unbounded())
    }

    pub fn contains(&self, key: &Key) -> bool {
        self.is_after_start(key) && self.is_within_end(key)
    }

    pub fn is_after_start(&self, key: &Key) -> bool {
        self.prev_key.is_unbounded() || key > &self.prev_key
    }

    pub fn is_within_end(&self, key: &Key) -> bool {
        self.last_key.is_unbounded() || key <= &self.last_key
    }

    /// Returns `true` if no key can fall inside the range.
    pub fn is_empty(&self) -> bool {
        !self.prev_key.is_unbounded()
            && !self.last_key.is_unbounded()
            && self.prev_key >= self.last_key
    }
}

impl fmt::Display for KeyRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}]", self.prev_key, self.last_key)
    }
}
