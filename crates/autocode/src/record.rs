use core::fmt;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::value::FieldValue;

/// Reserved key carrying the id of an existing row.
pub const ENTITY_ID: &str = "entity_id";

/// Reserved key carrying the kind of write.
pub const OPERATION: &str = "operation";

/// The kind of write a request performs.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Update,
    BatchUpdate,
    /// Any other operation name; handled like a create.
    Other(String),
}

impl Operation {
    pub fn parse(name: &str) -> Self {
        match name {
            "Create" => Self::Create,
            "Update" => Self::Update,
            "BatchUpdate" => Self::BatchUpdate,
            other => Self::Other(other.to_owned()),
        }
    }

    /// Whether the write edits an existing row.
    pub fn is_update(&self) -> bool {
        matches!(self, Self::Update | Self::BatchUpdate)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Create => "Create",
            Self::Update => "Update",
            Self::BatchUpdate => "BatchUpdate",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The field values of one record being written.
///
/// Besides the record's own fields the map may hold the reserved keys
/// [`ENTITY_ID`] and [`OPERATION`]. A write request owns its map exclusively;
/// the orchestrator mutates it in place before the record is persisted.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldMap(BTreeMap<String, FieldValue>);

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, code: &str) -> Option<&FieldValue> {
        self.0.get(code)
    }

    pub fn insert(&mut self, code: impl Into<String>, value: impl Into<FieldValue>) {
        self.0.insert(code.into(), value.into());
    }

    pub fn remove(&mut self, code: &str) -> Option<FieldValue> {
        self.0.remove(code)
    }

    pub fn contains_key(&self, code: &str) -> bool {
        self.0.contains_key(code)
    }

    /// Whether `code` holds a value that is neither `null` nor empty.
    pub fn has_value(&self, code: &str) -> bool {
        self.0.get(code).is_some_and(|value| !value.is_blank())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.0.iter().map(|(code, value)| (code.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The operation named by the [`OPERATION`] key, if it holds text.
    pub fn operation(&self) -> Option<Operation> {
        self.0
            .get(OPERATION)
            .and_then(FieldValue::as_text)
            .map(Operation::parse)
    }

    /// The positive row id held by the [`ENTITY_ID`] key, if any.
    pub fn entity_id(&self) -> Option<u64> {
        self.0.get(ENTITY_ID).and_then(FieldValue::as_row_id)
    }
}

impl<K, V> FromIterator<(K, V)> for FieldMap
where
    K: Into<String>,
    V: Into<FieldValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(code, value)| (code.into(), value.into()))
                .collect(),
        )
    }
}

impl From<BTreeMap<String, FieldValue>> for FieldMap {
    fn from(map: BTreeMap<String, FieldValue>) -> Self {
        Self(map)
    }
}

impl IntoIterator for FieldMap {
    type Item = (String, FieldValue);
    type IntoIter = std::collections::btree_map::IntoIter<String, FieldValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
