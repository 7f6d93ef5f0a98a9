#![forbid(unsafe_code)]

//! Flat session store and validation engine for public-procurement drafts.
//!
//! A wizard session keeps every answer under a dotted path key
//! (`clientInfo.clients.0.name`). This crate converts between that flat form
//! and the nested document that is persisted, re-keys lots under `lot_<i>.`,
//! and decides whether a wizard step may be left.

pub mod config;
pub mod cpv;
pub mod document;
pub mod error;
pub mod flatten;
pub mod lots;
pub mod paths;
pub mod resolve;
pub mod schema;
pub mod store;
pub mod validation;
pub mod value;

/// Nested JSON object as persisted for a draft.
pub type Document = serde_json::Map<String, serde_json::Value>;

pub use config::{ConfigError, RulesConfig};
pub use cpv::{CpvLookup, NoCpvRules, StaticCpvRules};
pub use document::{export_document, import_document};
pub use error::StructureError;
pub use flatten::{flatten, reconstruct_arrays, unflatten};
pub use lots::{LotGroup, LotMode, fields_to_lots, lot_group, lot_indices, lots_to_fields};
pub use paths::{KeyPath, PathError, Segment};
pub use resolve::{KeyPrefix, KeyResolver};
pub use schema::{Schema, SchemaError};
pub use store::FlatStore;
pub use validation::{
    LotValidation, ValidationEngine, ValidationError, ValidationResult,
};
pub use value::coerce_boolean;
