#![forbid(unsafe_code)]

use crate::paths::{KeyPath, Segment, join_key, join_segments};
use crate::{Document, FlatStore, StructureError};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Walks a nested document and emits one flat entry per leaf.
///
/// Empty objects, empty arrays and nulls are kept as explicit entries so that a
/// field that exists but is empty survives the trip back through [`unflatten`].
/// Fields whose names would produce a malformed key (an empty name, for one)
/// are skipped with a warning.
pub fn flatten(document: &Document) -> FlatStore {
    let mut out = FlatStore::new();
    for (key, value) in document {
        flatten_into(&mut out, key.clone(), value);
    }
    out
}

fn flatten_into(out: &mut FlatStore, key: String, value: &Value) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (child, value) in map {
                flatten_into(out, join_key(&key, child), value);
            }
        }
        Value::Array(items) if !items.is_empty() => {
            for (index, value) in items.iter().enumerate() {
                flatten_into(out, join_key(&key, &index.to_string()), value);
            }
        }
        other => match KeyPath::parse(&key) {
            Ok(_) => out.insert_unchecked(key, other.clone()),
            Err(err) => {
                tracing::warn!(key = %key, error = %err, "skipping field without a valid flat key");
            }
        },
    }
}

/// Rebuilds the nested document from a flat store.
///
/// Digit segments address array elements. Arrays are sized by the largest index
/// seen; holes are padded with `{}` when the array holds objects and with
/// `null` otherwise. `widget_` keys are skipped. A root-level digit segment has
/// no parent array to live in and is kept as an ordinary field name.
pub fn unflatten(store: &FlatStore) -> Result<Document, StructureError> {
    let mut root = Node::Object(BTreeMap::new());
    for (key, value) in store.document_entries() {
        let path = KeyPath::parse(key)?;
        let mut segments = path.segments().to_vec();
        if let Some(Segment::Index(index)) = segments.first().cloned() {
            segments[0] = Segment::Field(index.to_string());
        }
        place(&mut root, &segments, value.clone(), key)?;
    }
    match root.into_value() {
        Value::Object(map) => Ok(map),
        _ => Ok(Map::new()),
    }
}

/// Collapses every key that contains an array index into one array-valued key
/// named after the path preceding its first index. Keys without an index pass
/// through unchanged; `widget_` keys never reach the output.
pub fn reconstruct_arrays(store: &FlatStore) -> Result<FlatStore, StructureError> {
    let mut passthrough: Vec<(String, Value)> = Vec::new();
    let mut groups: BTreeMap<String, Node> = BTreeMap::new();

    for (key, value) in store.document_entries() {
        let path = KeyPath::parse(key)?;
        let position = match path.first_index_position() {
            Some(position) if position > 0 => position,
            _ => {
                passthrough.push((key.clone(), value.clone()));
                continue;
            }
        };
        let segments = path.segments();
        let prefix = join_segments(&segments[..position]);
        let node = groups.entry(prefix).or_insert(Node::Vacant);
        place(node, &segments[position..], value.clone(), key)?;
    }

    let mut out = FlatStore::new();
    for (key, value) in passthrough {
        out.insert_unchecked(key, value);
    }
    for (prefix, node) in groups {
        match out.get(&prefix) {
            None => {}
            Some(Value::Null) => {}
            Some(Value::Array(items)) if items.is_empty() => {}
            Some(Value::Object(map)) if map.is_empty() => {
                return Err(StructureError::ContainerConflict { path: prefix });
            }
            Some(_) => return Err(StructureError::ValueConflict { path: prefix }),
        }
        out.insert_unchecked(prefix, node.into_value());
    }
    Ok(out)
}

#[derive(Debug)]
enum Node {
    Vacant,
    Leaf(Value),
    Object(BTreeMap<String, Node>),
    Array(Vec<Node>),
}

impl Node {
    fn object_mut(&mut self, key: &str) -> Result<&mut BTreeMap<String, Node>, StructureError> {
        let promote = match self {
            Self::Vacant => true,
            Self::Leaf(Value::Object(map)) => map.is_empty(),
            _ => false,
        };
        if promote {
            *self = Self::Object(BTreeMap::new());
        }
        match self {
            Self::Object(map) => Ok(map),
            Self::Array(_) => Err(StructureError::ContainerConflict {
                path: key.to_string(),
            }),
            _ => Err(StructureError::ValueConflict {
                path: key.to_string(),
            }),
        }
    }

    fn array_mut(&mut self, key: &str) -> Result<&mut Vec<Node>, StructureError> {
        let promote = match self {
            Self::Vacant => true,
            Self::Leaf(Value::Array(items)) => items.is_empty(),
            _ => false,
        };
        if promote {
            *self = Self::Array(Vec::new());
        }
        match self {
            Self::Array(items) => Ok(items),
            Self::Object(_) => Err(StructureError::ContainerConflict {
                path: key.to_string(),
            }),
            _ => Err(StructureError::ValueConflict {
                path: key.to_string(),
            }),
        }
    }

    fn holds_object(&self) -> bool {
        matches!(self, Self::Object(_) | Self::Leaf(Value::Object(_)))
    }

    fn into_value(self) -> Value {
        match self {
            Self::Vacant => Value::Null,
            Self::Leaf(value) => value,
            Self::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(key, node)| (key, node.into_value()))
                    .collect(),
            ),
            Self::Array(items) => {
                let object_array = items.iter().any(Node::holds_object);
                Value::Array(
                    items
                        .into_iter()
                        .map(|node| match node {
                            Self::Vacant if object_array => Value::Object(Map::new()),
                            node => node.into_value(),
                        })
                        .collect(),
                )
            }
        }
    }
}

fn place(node: &mut Node, rest: &[Segment], value: Value, key: &str) -> Result<(), StructureError> {
    let Some((head, tail)) = rest.split_first() else {
        return set_leaf(node, value, key);
    };
    match head {
        Segment::Field(name) => {
            let map = node.object_mut(key)?;
            let child = map.entry(name.clone()).or_insert(Node::Vacant);
            place(child, tail, value, key)
        }
        Segment::Index(index) => {
            let items = node.array_mut(key)?;
            if items.len() <= *index {
                items.resize_with(index + 1, || Node::Vacant);
            }
            place(&mut items[*index], tail, value, key)
        }
    }
}

fn set_leaf(node: &mut Node, value: Value, key: &str) -> Result<(), StructureError> {
    match node {
        Node::Vacant | Node::Leaf(_) => {
            *node = Node::Leaf(value);
            Ok(())
        }
        Node::Object(_) if matches!(&value, Value::Object(map) if map.is_empty()) => Ok(()),
        Node::Array(_) if matches!(&value, Value::Array(items) if items.is_empty()) => Ok(()),
        Node::Object(_) | Node::Array(_) => Err(StructureError::ValueConflict {
            path: key.to_string(),
        }),
    }
}
