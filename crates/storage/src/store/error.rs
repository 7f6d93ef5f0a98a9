#![forbid(unsafe_code)]

use jn_core::StructureError;

#[derive(Debug)]
pub enum StoreError {
    Io(std::io::Error),
    Sql(rusqlite::Error),
    Json(serde_json::Error),
    Structure(StructureError),
    InvalidInput(&'static str),
    RevisionMismatch { expected: i64, actual: i64 },
    DraftFinalized { id: i64 },
    UnknownId,
}

impl StoreError {
    /// Stable machine-readable code for callers that map errors to UI states.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Io(_) => "IO",
            Self::Sql(_) => "SQLITE",
            Self::Json(_) => "PAYLOAD_JSON",
            Self::Structure(_) => "PAYLOAD_STRUCTURE",
            Self::InvalidInput(message) if message.starts_with("RESET_REQUIRED") => {
                "RESET_REQUIRED"
            }
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::RevisionMismatch { .. } => "REVISION_MISMATCH",
            Self::DraftFinalized { .. } => "DRAFT_FINALIZED",
            Self::UnknownId => "UNKNOWN_ID",
        }
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "io: {err}"),
            Self::Sql(err) => write!(f, "sqlite: {err}"),
            Self::Json(err) => write!(f, "payload json: {err}"),
            Self::Structure(err) => write!(f, "payload structure: {err}"),
            Self::InvalidInput(message) => write!(f, "invalid input: {message}"),
            Self::RevisionMismatch { expected, actual } => {
                write!(
                    f,
                    "revision mismatch (expected={expected}, actual={actual})"
                )
            }
            Self::DraftFinalized { id } => write!(f, "draft {id} is finalized"),
            Self::UnknownId => write!(f, "unknown id"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Sql(err) => Some(err),
            Self::Json(err) => Some(err),
            Self::Structure(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sql(value)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

impl From<StructureError> for StoreError {
    fn from(value: StructureError) -> Self {
        Self::Structure(value)
    }
}
