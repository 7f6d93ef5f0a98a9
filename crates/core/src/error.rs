#![forbid(unsafe_code)]

use crate::paths::PathError;
use thiserror::Error as ThisError;

///
/// StructureError
///
/// Raised when flat keys cannot be arranged into one tree. These point at a bug
/// in the caller or a corrupted draft, never at user input to fix.
///

#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum StructureError {
    #[error(transparent)]
    Path(#[from] PathError),

    #[error("path `{path}` holds a value and also has nested fields")]
    ValueConflict { path: String },

    #[error("path `{path}` is used both as an object and as an array")]
    ContainerConflict { path: String },
}
