#![forbid(unsafe_code)]

use crate::FlatStore;
use crate::value::{coerce_boolean, is_blank};
use serde_json::Value;

pub const GENERAL_PREFIX: &str = "general.";
pub const LOT_PREFIX: &str = "lot_";

/// One historical key convention for the same logical field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyPrefix {
    /// `section.field`
    Plain,
    /// `general.section.field`, written when lots were enabled but a field is shared.
    General,
    /// `lot_<i>.section.field`
    Lot(usize),
    /// `lot_<i>_section.field`, found in older saved drafts.
    LegacyLot(usize),
}

impl KeyPrefix {
    pub fn apply(self, key: &str) -> String {
        match self {
            Self::Plain => key.to_string(),
            Self::General => format!("{GENERAL_PREFIX}{key}"),
            Self::Lot(index) => format!("{LOT_PREFIX}{index}.{key}"),
            Self::LegacyLot(index) => format!("{LOT_PREFIX}{index}_{key}"),
        }
    }
}

///
/// KeyResolver
///
/// Ordered list of prefixes tried when reading a logical field from the store.
///

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyResolver {
    candidates: Vec<KeyPrefix>,
}

impl KeyResolver {
    pub fn new(candidates: Vec<KeyPrefix>) -> Self {
        Self { candidates }
    }

    /// `section.field`, `general.section.field`, `lot_1_section.field`.
    pub fn general() -> Self {
        Self::new(vec![
            KeyPrefix::Plain,
            KeyPrefix::General,
            KeyPrefix::LegacyLot(1),
        ])
    }

    /// The lot's own value first, then the shared value.
    pub fn for_lot(index: usize) -> Self {
        Self::new(vec![
            KeyPrefix::Lot(index),
            KeyPrefix::Plain,
            KeyPrefix::General,
        ])
    }

    pub fn prefixes(&self) -> &[KeyPrefix] {
        &self.candidates
    }

    pub fn candidates(&self, key: &str) -> Vec<String> {
        self.candidates
            .iter()
            .map(|prefix| prefix.apply(key))
            .collect()
    }

    /// First non-blank value in priority order; otherwise the last present one.
    pub fn value<'a>(&self, store: &'a FlatStore, key: &str) -> Option<&'a Value> {
        let mut last_present = None;
        for candidate in self.candidates(key) {
            if let Some(value) = store.get(&candidate) {
                if !is_blank(value) {
                    return Some(value);
                }
                last_present = Some(value);
            }
        }
        last_present
    }

    /// Key under which [`KeyResolver::value`] found its answer.
    pub fn resolved_key(&self, store: &FlatStore, key: &str) -> Option<String> {
        let mut last_present = None;
        for candidate in self.candidates(key) {
            if let Some(value) = store.get(&candidate) {
                if !is_blank(value) {
                    return Some(candidate);
                }
                last_present = Some(candidate);
            }
        }
        last_present
    }

    /// A `true` under any convention wins; otherwise the last checked value decides.
    pub fn flag(&self, store: &FlatStore, key: &str) -> bool {
        let mut last_checked = None;
        for candidate in self.candidates(key) {
            if let Some(value) = store.get(&candidate) {
                if coerce_boolean(value) {
                    return true;
                }
                last_checked = Some(value);
            }
        }
        last_checked.is_some_and(coerce_boolean)
    }
}

impl Default for KeyResolver {
    fn default() -> Self {
        Self::general()
    }
}
