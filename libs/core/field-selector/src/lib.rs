//! Field selector library for picking values out of JSON documents by dot-path.
//!
//! A [`FieldSpec`] describes what to extract:
//!
//! - [`FieldSpec::Whole`] - the document itself (spelled `.` on the command line)
//! - [`FieldSpec::Single`] - the value at one path, e.g. `content.order.id`
//! - [`FieldSpec::List`] - several paths, returned as an object keyed by the
//!   literal path strings, in the order they were given
//!
//! Paths never fail to resolve: a missing segment yields `None`, which is kept
//! distinct from a present JSON `null`.

use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

// Re-export for convenience
pub use serde_json;

/// Path that selects the whole document.
pub const WHOLE_DOCUMENT: &str = ".";

/// Errors that can occur while parsing field paths
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldPathError {
    #[error("field path is empty")]
    Empty,
    #[error("field path '{0}' contains an empty segment")]
    EmptySegment(String),
}

/// A parsed dot-separated path such as `properties.headers.x-trace`.
///
/// Numeric segments index into arrays (`content.items.0`); on objects they are
/// ordinary keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    raw: String,
    segments: Vec<String>,
}

impl FieldPath {
    /// The path exactly as it was written.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().map(String::as_str)
    }

    /// Follow the path through `root`, returning `None` when any segment is missing.
    pub fn resolve<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        self.segments
            .iter()
            .try_fold(root, |current, segment| step(current, segment))
    }

    /// Like [`resolve`](Self::resolve) but moves the value out of `root`.
    pub fn take(&self, root: Value) -> Option<Value> {
        let mut current = root;
        for segment in &self.segments {
            current = match current {
                Value::Object(mut map) => map.remove(segment.as_str())?,
                Value::Array(mut items) => {
                    let index = segment.parse::<usize>().ok()?;
                    if index >= items.len() {
                        return None;
                    }
                    items.swap_remove(index)
                }
                _ => return None,
            };
        }
        Some(current)
    }
}

fn step<'a>(value: &'a Value, segment: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

impl FromStr for FieldPath {
    type Err = FieldPathError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(FieldPathError::Empty);
        }

        let segments: Vec<String> = raw.split('.').map(String::from).collect();
        if segments.iter().any(String::is_empty) {
            return Err(FieldPathError::EmptySegment(raw.to_string()));
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Which parts of a document to select.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FieldSpec {
    /// Pass the whole document through unmodified
    #[default]
    Whole,
    /// A single value
    Single(FieldPath),
    /// Several values keyed by their path strings
    List(Vec<FieldPath>),
}

impl FieldSpec {
    /// Build a spec from a list of path strings.
    ///
    /// One path gives [`FieldSpec::Single`], several give [`FieldSpec::List`],
    /// and a lone `.` gives [`FieldSpec::Whole`].
    pub fn from_paths<I, S>(paths: I) -> Result<Self, FieldPathError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let paths: Vec<String> = paths
            .into_iter()
            .map(|p| p.as_ref().trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();

        match paths.as_slice() {
            [] => Err(FieldPathError::Empty),
            [only] if only == WHOLE_DOCUMENT => Ok(FieldSpec::Whole),
            [only] => Ok(FieldSpec::Single(only.parse()?)),
            many => many
                .iter()
                .map(|p| p.parse())
                .collect::<Result<Vec<_>, _>>()
                .map(FieldSpec::List),
        }
    }

    /// Apply the spec to a document.
    ///
    /// Returns `None` only when a single path does not resolve. For lists,
    /// unresolved paths are left out of the resulting object.
    pub fn select(&self, document: Value) -> Option<Value> {
        match self {
            FieldSpec::Whole => Some(document),
            FieldSpec::Single(path) => {
                let selected = path.take(document);
                if selected.is_none() {
                    tracing::trace!(path = %path, "Field path not found");
                }
                selected
            }
            FieldSpec::List(paths) => {
                let mut out = Map::with_capacity(paths.len());
                for path in paths {
                    match path.resolve(&document) {
                        Some(value) => {
                            out.insert(path.as_str().to_string(), value.clone());
                        }
                        None => tracing::trace!(path = %path, "Field path not found"),
                    }
                }
                Some(Value::Object(out))
            }
        }
    }
}

/// Parses a comma-separated list, e.g. `content,deliveryInfo.routingKey`.
impl FromStr for FieldSpec {
    type Err = FieldPathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FieldSpec::from_paths(s.split(','))
    }
}

impl fmt::Display for FieldSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldSpec::Whole => f.write_str(WHOLE_DOCUMENT),
            FieldSpec::Single(path) => write!(f, "{path}"),
            FieldSpec::List(paths) => {
                let joined: Vec<&str> = paths.iter().map(FieldPath::as_str).collect();
                f.write_str(&joined.join(","))
            }
        }
    }
}

/// Select from `document` using an optional spec; `None` means the whole document.
pub fn select(document: Value, spec: Option<&FieldSpec>) -> Option<Value> {
    match spec {
        None => Some(document),
        Some(spec) => spec.select(document),
    }
}
