#![forbid(unsafe_code)]

use crate::resolve::{KeyPrefix, LOT_PREFIX};
use crate::value::display_text;
use crate::{Document, FlatStore, StructureError, flatten, unflatten};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

pub const LOT_MODE_KEY: &str = "lot_mode";

/// Splits `lot_<i>.<rest>` into `(i, rest)`.
pub fn parse_lot_key(key: &str) -> Option<(usize, &str)> {
    let tail = key.strip_prefix(LOT_PREFIX)?;
    let (digits, rest) = tail.split_once('.')?;
    if digits.is_empty() || rest.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let index = digits.parse::<usize>().ok()?;
    Some((index, rest))
}

/// Flattens each lot and re-keys it under `lot_<i>.`.
///
/// Null and empty lots produce no keys at all, and neither do entries that are
/// not objects.
pub fn lots_to_fields(lots: &[Value]) -> FlatStore {
    let mut out = FlatStore::new();
    for (index, lot) in lots.iter().enumerate() {
        let lot = match lot {
            Value::Object(map) if !map.is_empty() => map,
            Value::Null | Value::Object(_) => continue,
            other => {
                tracing::warn!(lot = index, value = %other, "skipping lot entry that is not an object");
                continue;
            }
        };
        let prefix = KeyPrefix::Lot(index);
        for (path, value) in &flatten(lot) {
            out.insert_unchecked(prefix.apply(path), value.clone());
        }
    }
    out
}

/// Groups `lot_<i>.` keys back into one document per lot.
///
/// Only the run of indices starting at 0 is returned; the first missing index
/// ends the scan and every higher group is dropped.
pub fn fields_to_lots(store: &FlatStore) -> Result<Vec<Document>, StructureError> {
    let mut groups: BTreeMap<usize, FlatStore> = BTreeMap::new();
    for (key, value) in store.document_entries() {
        if let Some((index, rest)) = parse_lot_key(key) {
            groups
                .entry(index)
                .or_default()
                .insert_unchecked(rest.to_string(), value.clone());
        }
    }

    let mut lots = Vec::new();
    while let Some(group) = groups.remove(&lots.len()) {
        lots.push(unflatten(&group)?);
    }
    if !groups.is_empty() {
        let dropped = groups.keys().copied().collect::<Vec<_>>();
        tracing::warn!(
            contiguous = lots.len(),
            ?dropped,
            "lot indices after a gap were dropped"
        );
    }
    Ok(lots)
}

/// Distinct lot indices present in the store, in ascending order.
pub fn lot_indices(store: &FlatStore) -> BTreeSet<usize> {
    store
        .keys_with_prefix(LOT_PREFIX)
        .filter_map(parse_lot_key)
        .map(|(index, _)| index)
        .collect()
}

pub fn lot_group(store: &FlatStore, index: usize) -> LotGroup<'_> {
    LotGroup::new(store, index)
}

///
/// LotGroup
///
/// Read-only view over the `lot_<i>.` keys of one lot.
///

#[derive(Clone, Copy, Debug)]
pub struct LotGroup<'a> {
    index: usize,
    store: &'a FlatStore,
}

impl<'a> LotGroup<'a> {
    pub fn new(store: &'a FlatStore, index: usize) -> Self {
        Self { index, store }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Human label, 1-based ("Sklop 1").
    pub fn label(&self) -> String {
        format!("Sklop {}", self.index + 1)
    }

    /// `(field path without the lot prefix, value)` pairs.
    pub fn fields(&self) -> impl Iterator<Item = (&'a str, &'a Value)> + 'a {
        let index = self.index;
        self.store.iter().filter_map(move |(key, value)| {
            parse_lot_key(key)
                .filter(|(lot, _)| *lot == index)
                .map(|(_, rest)| (rest, value))
        })
    }

    pub fn get(&self, field: &str) -> Option<&'a Value> {
        self.store.get(&KeyPrefix::Lot(self.index).apply(field))
    }

    pub fn is_empty(&self) -> bool {
        self.fields().next().is_none()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LotMode {
    None,
    Single,
    Multiple,
}

impl LotMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Single => "single",
            Self::Multiple => "multiple",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "none" => Some(Self::None),
            "single" => Some(Self::Single),
            "multiple" => Some(Self::Multiple),
            _ => None,
        }
    }

    /// An explicit `lot_mode` entry wins; otherwise the number of lot groups decides.
    pub fn detect(store: &FlatStore) -> Self {
        if let Some(mode) = store
            .get(LOT_MODE_KEY)
            .and_then(|value| Self::parse(&display_text(value)))
        {
            return mode;
        }
        match lot_indices(store).len() {
            0 => Self::None,
            1 => Self::Single,
            _ => Self::Multiple,
        }
    }

    /// `None` and `Single` are validated the same way, against general keys.
    pub fn validates_as_general(self) -> bool {
        !matches!(self, Self::Multiple)
    }
}
