//! Snapshot normalization: array mode and object mode.

use std::str::FromStr;

use serde_json::Value;

use rtdb_store::Snapshot;
use rtdb_types::MessageRecord;

use crate::error::{ClientError, ClientResult};

/// Shape a read result is delivered in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ReadMode {
    /// Children flattened into a sequence, in store order.
    Array,
    /// The raw value, keyed by child name.
    #[default]
    Object,
}

impl FromStr for ReadMode {
    type Err = std::convert::Infallible;

    /// `"array"` selects array mode; anything else is object mode.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(if s.eq_ignore_ascii_case("array") {
            ReadMode::Array
        } else {
            ReadMode::Object
        })
    }
}

/// A normalized read result.
#[derive(Clone, Debug, PartialEq)]
pub enum ReadValue {
    Sequence(Vec<Value>),
    Object(Value),
}

impl ReadValue {
    /// The empty sequence handed to callbacks when nothing is stored.
    pub fn empty() -> Self {
        ReadValue::Sequence(Vec::new())
    }

    pub fn len(&self) -> usize {
        match self {
            ReadValue::Sequence(items) => items.len(),
            ReadValue::Object(Value::Object(map)) => map.len(),
            ReadValue::Object(Value::Null) => 0,
            ReadValue::Object(_) => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_sequence(&self) -> Option<&[Value]> {
        match self {
            ReadValue::Sequence(items) => Some(items),
            ReadValue::Object(_) => None,
        }
    }

    pub fn as_object(&self) -> Option<&Value> {
        match self {
            ReadValue::Object(value) => Some(value),
            ReadValue::Sequence(_) => None,
        }
    }

    /// Decode every entry as a [`MessageRecord`].
    ///
    /// Object-mode values are decoded child by child in key order.
    pub fn messages(&self) -> ClientResult<Vec<MessageRecord>> {
        let items: Vec<&Value> = match self {
            ReadValue::Sequence(items) => items.iter().collect(),
            ReadValue::Object(Value::Object(map)) => map.values().collect(),
            ReadValue::Object(Value::Null) => Vec::new(),
            ReadValue::Object(other) => vec![other],
        };
        items
            .into_iter()
            .map(|v| serde_json::from_value::<MessageRecord>(v.clone()).map_err(ClientError::from))
            .collect()
    }

    pub fn into_value(self) -> Value {
        match self {
            ReadValue::Sequence(items) => Value::Array(items),
            ReadValue::Object(value) => value,
        }
    }
}

/// Normalize a snapshot. Returns `None` when nothing is stored.
pub fn normalize(snapshot: &Snapshot, mode: ReadMode) -> Option<ReadValue> {
    if !snapshot.exists() {
        return None;
    }
    Some(match mode {
        ReadMode::Array => ReadValue::Sequence(
            snapshot
                .children()
                .iter()
                .map(|(_, value)| value.clone())
                .collect(),
        ),
        ReadMode::Object => ReadValue::Object(snapshot.value().clone()),
    })
}
