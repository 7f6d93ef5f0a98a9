#![forbid(unsafe_code)]

use std::fmt;
use thiserror::Error as ThisError;

pub const PATH_SEPARATOR: char = '.';
pub const WIDGET_PREFIX: &str = "widget_";

/// Keys with the `widget_` prefix belong to UI widgets and never enter a document.
pub fn is_widget_key(key: &str) -> bool {
    key.starts_with(WIDGET_PREFIX)
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Segment {
    Field(String),
    Index(usize),
}

impl Segment {
    pub fn is_index(&self) -> bool {
        matches!(self, Self::Index(_))
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field(name) => f.write_str(name),
            Self::Index(index) => write!(f, "{index}"),
        }
    }
}

///
/// KeyPath
///
/// A parsed flat-store key. Segments are separated by `.`; a segment made only
/// of ASCII digits addresses an array element.
///

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct KeyPath {
    segments: Vec<Segment>,
}

impl KeyPath {
    pub fn parse(value: &str) -> Result<Self, PathError> {
        if value.is_empty() {
            return Err(PathError::Empty);
        }
        if value.starts_with(PATH_SEPARATOR) {
            return Err(PathError::LeadingDot {
                path: value.to_string(),
            });
        }
        if value.ends_with(PATH_SEPARATOR) {
            return Err(PathError::TrailingDot {
                path: value.to_string(),
            });
        }

        let mut segments = Vec::new();
        for (position, raw) in value.split(PATH_SEPARATOR).enumerate() {
            if raw.is_empty() {
                return Err(PathError::EmptySegment {
                    path: value.to_string(),
                    position,
                });
            }
            segments.push(parse_segment(value, raw)?);
        }

        Ok(Self { segments })
    }

    pub fn from_segments(segments: Vec<Segment>) -> Result<Self, PathError> {
        if segments.is_empty() {
            return Err(PathError::Empty);
        }
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn first_index_position(&self) -> Option<usize> {
        self.segments.iter().position(Segment::is_index)
    }

    pub fn has_index(&self) -> bool {
        self.first_index_position().is_some()
    }

    pub fn child(&self, segment: Segment) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment);
        Self { segments }
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&join_segments(&self.segments))
    }
}

pub fn join_segments(segments: &[Segment]) -> String {
    segments
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(".")
}

/// Appends `child` to `prefix`, treating an empty prefix as the root.
pub fn join_key(prefix: &str, child: &str) -> String {
    if prefix.is_empty() {
        child.to_string()
    } else {
        format!("{prefix}{PATH_SEPARATOR}{child}")
    }
}

fn parse_segment(path: &str, raw: &str) -> Result<Segment, PathError> {
    if !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Ok(Segment::Field(raw.to_string()));
    }
    raw.parse::<usize>()
        .map(Segment::Index)
        .map_err(|_| PathError::IndexOverflow {
            path: path.to_string(),
            segment: raw.to_string(),
        })
}

#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum PathError {
    #[error("path must not be empty")]
    Empty,

    #[error("path `{path}` starts with a dot")]
    LeadingDot { path: String },

    #[error("path `{path}` ends with a dot")]
    TrailingDot { path: String },

    #[error("path `{path}` has an empty segment at position {position}")]
    EmptySegment { path: String, position: usize },

    #[error("path `{path}` has an array index `{segment}` that does not fit in usize")]
    IndexOverflow { path: String, segment: String },
}
