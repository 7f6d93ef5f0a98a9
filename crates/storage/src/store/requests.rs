#![forbid(unsafe_code)]

use super::DraftStatus;
use jn_core::{Document, FlatStore, StructureError, export_document};

/// Insert when `id` is `None`, otherwise update the draft with that id.
#[derive(Clone, Debug, PartialEq)]
pub struct SaveDraftRequest {
    pub id: Option<i64>,
    pub title: String,
    pub document: Document,
    pub expected_revision: Option<i64>,
    pub saved_at_ms: i64,
}

impl SaveDraftRequest {
    /// Builds the request from the live session store.
    pub fn from_store(
        id: Option<i64>,
        title: impl Into<String>,
        store: &FlatStore,
        saved_at_ms: i64,
    ) -> Result<Self, StructureError> {
        Ok(Self {
            id,
            title: title.into(),
            document: export_document(store)?,
            expected_revision: None,
            saved_at_ms,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListDraftsRequest {
    pub status: Option<DraftStatus>,
    pub limit: usize,
    pub offset: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FinalizeDraftRequest {
    pub id: i64,
    pub expected_revision: Option<i64>,
    pub finalized_at_ms: i64,
}
