#![forbid(unsafe_code)]

use crate::paths::{KeyPath, PathError, is_widget_key};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::collections::btree_map;
use std::ops::Bound;

///
/// FlatStore
///
/// Flat path-key to value map backing one user session. Keys are validated on
/// insert; values are scalars, null, or homogeneous scalar arrays.
///

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<String, Value>",
    into = "BTreeMap<String, Value>"
)]
pub struct FlatStore {
    entries: BTreeMap<String, Value>,
}

impl TryFrom<BTreeMap<String, Value>> for FlatStore {
    type Error = PathError;

    fn try_from(entries: BTreeMap<String, Value>) -> Result<Self, Self::Error> {
        for key in entries.keys() {
            KeyPath::parse(key)?;
        }
        Ok(Self { entries })
    }
}

impl From<FlatStore> for BTreeMap<String, Value> {
    fn from(store: FlatStore) -> Self {
        store.entries
    }
}

impl FlatStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<K, I>(pairs: I) -> Result<Self, PathError>
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        let mut store = Self::new();
        for (key, value) in pairs {
            store.insert(key, value)?;
        }
        Ok(store)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: Value,
    ) -> Result<Option<Value>, PathError> {
        let key = key.into();
        KeyPath::parse(&key)?;
        Ok(self.entries.insert(key, value))
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Value> {
        self.entries.iter()
    }

    pub fn keys(&self) -> btree_map::Keys<'_, String, Value> {
        self.entries.keys()
    }

    pub fn keys_with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(move |(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.as_str())
    }

    /// Entries that belong in a persisted document (no `widget_` keys).
    pub fn document_entries(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter().filter(|(key, _)| !is_widget_key(key))
    }

    /// Drops every entry and takes over `other`; used when a saved draft is opened.
    pub fn replace_with(&mut self, other: FlatStore) {
        self.entries = other.entries;
    }

    pub(crate) fn insert_unchecked(&mut self, key: String, value: Value) {
        self.entries.insert(key, value);
    }
}

impl<'a> IntoIterator for &'a FlatStore {
    type Item = (&'a String, &'a Value);
    type IntoIter = btree_map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
