use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::collections::btree_map;

use crate::types::Cell;

/// Full per-object record of a catalog: every field the catalog stores for that object.
///
/// Fields are kept sorted by key so that merged output is reproducible.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: BTreeMap<String, Cell>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a field, returning the previous value stored under `key`.
    pub fn insert(&mut self, key: impl Into<String>, value: Cell) -> Option<Cell> {
        self.fields.insert(key.into(), value)
    }

    pub fn get(&self, key: &str) -> Option<&Cell> {
        self.fields.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Cell)> {
        self.fields.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Removes and returns the field stored under `key`.
    pub fn remove(&mut self, key: &str) -> Option<Cell> {
        self.fields.remove(key)
    }

    /// Renders the record as a JSON object.
    pub fn to_json(&self) -> Value {
        let object: Map<String, Value> = self
            .fields
            .iter()
            .map(|(key, value)| (key.clone(), value.to_json()))
            .collect();

        Value::Object(object)
    }
}

impl FromIterator<(String, Cell)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Cell)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Record {
    type Item = (String, Cell);
    type IntoIter = btree_map::IntoIter<String, Cell>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

impl From<Map<String, Value>> for Record {
    fn from(object: Map<String, Value>) -> Self {
        object
            .into_iter()
            .map(|(key, value)| (key, Cell::from(value)))
            .collect()
    }
}
