#![forbid(unsafe_code)]

use crate::lots::{fields_to_lots, lots_to_fields, parse_lot_key};
use crate::{Document, FlatStore, StructureError, flatten, unflatten};
use serde_json::Value;

/// Top-level document field holding the lot array.
pub const LOTS_FIELD: &str = "lots";

/// Builds the payload persisted for a draft: general fields unflattened, lot
/// groups collected under `lots`.
pub fn export_document(store: &FlatStore) -> Result<Document, StructureError> {
    let mut general = FlatStore::new();
    for (key, value) in store.document_entries() {
        if parse_lot_key(key).is_none() {
            general.insert_unchecked(key.clone(), value.clone());
        }
    }
    let mut document = unflatten(&general)?;

    let lots = fields_to_lots(store)?;
    if !lots.is_empty() {
        if document.contains_key(LOTS_FIELD) {
            return Err(StructureError::ValueConflict {
                path: LOTS_FIELD.to_string(),
            });
        }
        document.insert(
            LOTS_FIELD.to_string(),
            Value::Array(lots.into_iter().map(Value::Object).collect()),
        );
    }
    Ok(document)
}

/// Inverse of [`export_document`], used when a saved draft is opened for editing.
pub fn import_document(document: &Document) -> FlatStore {
    let mut general = document.clone();
    let lots = match general.remove(LOTS_FIELD) {
        Some(Value::Array(lots)) => lots,
        Some(other) => {
            general.insert(LOTS_FIELD.to_string(), other);
            Vec::new()
        }
        None => Vec::new(),
    };

    let mut store = flatten(&general);
    for (key, value) in &lots_to_fields(&lots) {
        store.insert_unchecked(key.clone(), value.clone());
    }
    store
}
