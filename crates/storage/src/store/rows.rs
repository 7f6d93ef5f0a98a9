#![forbid(unsafe_code)]

use super::support::ts_ms_to_rfc3339;
use jn_core::Document;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DraftStatus {
    Draft,
    Final,
}

impl DraftStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Final => "final",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(Self::Draft),
            "final" => Some(Self::Final),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DraftRow {
    pub id: i64,
    pub title: String,
    pub status: DraftStatus,
    pub revision: i64,
    pub payload_sha256: String,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

impl DraftRow {
    pub fn is_final(&self) -> bool {
        self.status == DraftStatus::Final
    }

    pub fn created_at_rfc3339(&self) -> String {
        ts_ms_to_rfc3339(self.created_at_ms)
    }

    pub fn updated_at_rfc3339(&self) -> String {
        ts_ms_to_rfc3339(self.updated_at_ms)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LoadedDraft {
    pub row: DraftRow,
    pub document: Document,
}
