#![forbid(unsafe_code)]

use crate::FlatStore;
use crate::paths::join_key;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error as ThisError;

const DEFS_REF_PREFIX: &str = "#/$defs/";
const DEFINITIONS_REF_PREFIX: &str = "#/definitions/";

///
/// Schema
///
/// Read-only description of the form: sections, field titles, types, enums and
/// requirement rules. Loaded once; section references are checked at load time.
///

#[derive(Clone, Debug, PartialEq)]
pub struct Schema {
    sections: BTreeMap<String, Section>,
    definitions: BTreeMap<String, ObjectShape>,
    required: BTreeSet<String>,
}

/// A top-level section is either declared inline or points at a named definition.
#[derive(Clone, Debug, PartialEq)]
pub enum Section {
    Inline(ObjectShape),
    Reference(String),
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ObjectShape {
    pub title: Option<String>,
    pub fields: BTreeMap<String, FieldSchema>,
    pub required: BTreeSet<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldSchema {
    pub title: Option<String>,
    pub kind: FieldKind,
    pub enum_values: Vec<Value>,
    pub required: bool,
    pub required_if: Option<RequiredIf>,
    pub default: Option<Value>,
    pub shape: Option<ObjectShape>,
}

impl FieldSchema {
    pub fn is_dropdown(&self) -> bool {
        !self.enum_values.is_empty()
    }

    fn has_children(&self) -> bool {
        self.shape
            .as_ref()
            .is_some_and(|shape| !shape.fields.is_empty())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Number,
    Integer,
    Boolean,
    Date,
    Array,
    Object,
    Unspecified,
}

impl FieldKind {
    fn from_raw(kind: Option<&Value>, format: Option<&str>) -> Self {
        // `["string", "null"]` style unions: first non-null entry decides.
        let name = match kind {
            Some(Value::String(name)) => Some(name.as_str()),
            Some(Value::Array(names)) => names
                .iter()
                .filter_map(Value::as_str)
                .find(|name| *name != "null"),
            _ => None,
        };
        match (name, format) {
            (Some("string"), Some("date")) => Self::Date,
            (Some("string"), _) => Self::Text,
            (Some("number"), _) => Self::Number,
            (Some("integer"), _) => Self::Integer,
            (Some("boolean"), _) => Self::Boolean,
            (Some("array"), _) => Self::Array,
            (Some("object"), _) => Self::Object,
            _ => Self::Unspecified,
        }
    }
}

/// `required_if: {field, value}`: required while `field` currently equals `value`.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct RequiredIf {
    pub field: String,
    pub value: Value,
}

/// One leaf of an expanded section.
#[derive(Clone, Debug)]
pub struct LeafField<'a> {
    pub path: String,
    pub name: &'a str,
    pub field: &'a FieldSchema,
    pub required_by_parent: bool,
}

impl Schema {
    pub fn from_json_str(raw: &str) -> Result<Self, SchemaError> {
        let raw: RawSchema =
            serde_json::from_str(raw).map_err(|err| SchemaError::Parse(err.to_string()))?;
        Self::from_raw(raw)
    }

    pub fn from_value(value: Value) -> Result<Self, SchemaError> {
        let raw: RawSchema =
            serde_json::from_value(value).map_err(|err| SchemaError::Parse(err.to_string()))?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawSchema) -> Result<Self, SchemaError> {
        let mut definitions = BTreeMap::new();
        for (name, node) in raw.defs.into_iter().chain(raw.definitions) {
            if node.reference.is_some() {
                return Err(SchemaError::NestedReference { path: name });
            }
            let shape = build_shape(&name, node)?;
            definitions.insert(name, shape);
        }

        let mut sections = BTreeMap::new();
        for (name, node) in raw.properties {
            let section = match node.reference.clone() {
                Some(reference) => {
                    let definition = definition_name(&reference)?;
                    if !definitions.contains_key(&definition) {
                        return Err(SchemaError::UnknownDefinition {
                            section: name,
                            definition,
                        });
                    }
                    Section::Reference(definition)
                }
                None => Section::Inline(build_shape(&name, node)?),
            };
            sections.insert(name, section);
        }

        Ok(Self {
            sections,
            definitions,
            required: raw.required.into_iter().collect(),
        })
    }

    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.get(name)
    }

    /// Resolves a section to its fields, following a reference at most once.
    pub fn section_shape(&self, name: &str) -> Option<&ObjectShape> {
        match self.sections.get(name)? {
            Section::Inline(shape) => Some(shape),
            Section::Reference(definition) => self.definitions.get(definition),
        }
    }

    /// Every leaf field under `section`, with nested inline objects expanded.
    pub fn leaf_fields(&self, section: &str) -> Option<Vec<LeafField<'_>>> {
        let shape = self.section_shape(section)?;
        let mut out = Vec::new();
        collect_leaves(section, shape, &mut out);
        Some(out)
    }

    pub fn field(&self, path: &str) -> Option<&FieldSchema> {
        let mut parts = path.split('.');
        let mut shape = self.section_shape(parts.next()?)?;
        let mut field = shape.fields.get(parts.next()?)?;
        for part in parts {
            shape = field.shape.as_ref()?;
            field = shape.fields.get(part)?;
        }
        Some(field)
    }

    /// Display title of a field, falling back to its last key segment.
    pub fn title_for(&self, path: &str) -> String {
        self.field(path)
            .and_then(|field| field.title.clone())
            .unwrap_or_else(|| path.rsplit('.').next().unwrap_or(path).to_string())
    }

    /// Named in the `required` list of the object that directly contains it.
    pub fn parent_requires(&self, path: &str) -> bool {
        let parts = path.split('.').collect::<Vec<_>>();
        let Some((last, parents)) = parts.split_last() else {
            return false;
        };
        let Some((section, nested)) = parents.split_first() else {
            return false;
        };
        let Some(mut shape) = self.section_shape(section) else {
            return false;
        };
        for part in nested {
            match shape.fields.get(*part).and_then(|field| field.shape.as_ref()) {
                Some(child) => shape = child,
                None => return false,
            }
        }
        shape.required.contains(*last)
    }

    pub fn default_for(&self, path: &str) -> Option<&Value> {
        self.field(path)?.default.as_ref()
    }

    /// Listed in the schema's top-level `required` array as a full path.
    pub fn is_top_level_required(&self, path: &str) -> bool {
        self.required.contains(path)
    }

    /// Seeds a fresh session with every declared default value.
    pub fn defaults(&self) -> FlatStore {
        let mut store = FlatStore::new();
        for section in self.sections.keys() {
            for leaf in self.leaf_fields(section).unwrap_or_default() {
                if let Some(default) = &leaf.field.default {
                    store.insert_unchecked(leaf.path, default.clone());
                }
            }
        }
        store
    }
}

fn collect_leaves<'a>(prefix: &str, shape: &'a ObjectShape, out: &mut Vec<LeafField<'a>>) {
    for (name, field) in &shape.fields {
        let path = join_key(prefix, name);
        match (&field.shape, field.has_children()) {
            (Some(child), true) => collect_leaves(&path, child, out),
            _ => out.push(LeafField {
                path,
                name: name.as_str(),
                field,
                required_by_parent: shape.required.contains(name),
            }),
        }
    }
}

fn definition_name(reference: &str) -> Result<String, SchemaError> {
    let name = reference
        .strip_prefix(DEFS_REF_PREFIX)
        .or_else(|| reference.strip_prefix(DEFINITIONS_REF_PREFIX))
        .unwrap_or(reference);
    if name.is_empty() || name.contains('/') {
        return Err(SchemaError::InvalidReference {
            reference: reference.to_string(),
        });
    }
    Ok(name.to_string())
}

fn build_shape(path: &str, node: RawNode) -> Result<ObjectShape, SchemaError> {
    let required = match node.required {
        Some(Value::Array(names)) => names
            .into_iter()
            .filter_map(|name| name.as_str().map(str::to_string))
            .collect(),
        _ => BTreeSet::new(),
    };
    let mut fields = BTreeMap::new();
    for (name, child) in node.properties {
        let field = build_field(&join_key(path, &name), child)?;
        fields.insert(name, field);
    }
    Ok(ObjectShape {
        title: node.title,
        fields,
        required,
    })
}

fn build_field(path: &str, node: RawNode) -> Result<FieldSchema, SchemaError> {
    if node.reference.is_some() {
        return Err(SchemaError::NestedReference {
            path: path.to_string(),
        });
    }
    let kind = FieldKind::from_raw(node.kind.as_ref(), node.format.as_deref());
    let flag = matches!(node.required, Some(Value::Bool(true)));
    let title = node.title.clone();
    let enum_values = node.enum_values.clone().unwrap_or_default();
    let required_if = node.required_if.clone();
    let default = node.default.clone();
    let shape = if node.properties.is_empty() {
        None
    } else {
        Some(build_shape(path, node)?)
    };
    Ok(FieldSchema {
        title,
        kind,
        enum_values,
        required: flag,
        required_if,
        default,
        shape,
    })
}

#[derive(Deserialize)]
struct RawSchema {
    #[serde(default)]
    properties: BTreeMap<String, RawNode>,
    #[serde(default)]
    required: Vec<String>,
    #[serde(default, rename = "$defs")]
    defs: BTreeMap<String, RawNode>,
    #[serde(default)]
    definitions: BTreeMap<String, RawNode>,
}

#[derive(Clone, Deserialize)]
struct RawNode {
    #[serde(default, rename = "$ref")]
    reference: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<Value>,
    #[serde(default)]
    format: Option<String>,
    #[serde(default, rename = "enum")]
    enum_values: Option<Vec<Value>>,
    // bool on a field, list of child names on an object
    #[serde(default)]
    required: Option<Value>,
    #[serde(default)]
    required_if: Option<RequiredIf>,
    #[serde(default)]
    default: Option<Value>,
    #[serde(default)]
    properties: BTreeMap<String, RawNode>,
}

#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum SchemaError {
    #[error("schema could not be parsed: {0}")]
    Parse(String),

    #[error("section `{section}` references unknown definition `{definition}`")]
    UnknownDefinition { section: String, definition: String },

    #[error("reference `{reference}` is not a local definition")]
    InvalidReference { reference: String },

    #[error("`{path}` uses a reference below section level")]
    NestedReference { path: String },
}
