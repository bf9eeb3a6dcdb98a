use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::PathError;

const ARRAY_MARKER: &str = "[*]";

/// One step from a parent properties level to a child.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// A plain property.
    Field(String),
    /// An array property whose item schema was descended into.
    ArrayElement(String),
    /// A `$ref` property expanded through the definitions table.
    Definition { name: String, reference: String },
}

impl PathSegment {
    /// The property name, without any marker.
    pub fn name(&self) -> &str {
        match self {
            PathSegment::Field(name) | PathSegment::ArrayElement(name) => name,
            PathSegment::Definition { name, .. } => name,
        }
    }

    fn write_flat(&self, out: &mut String) {
        out.push_str(self.name());
        if matches!(self, PathSegment::ArrayElement(_)) {
            out.push_str(ARRAY_MARKER);
        }
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Field(name) => f.write_str(name),
            PathSegment::ArrayElement(name) => write!(f, "{name}{ARRAY_MARKER}"),
            PathSegment::Definition { name, reference } => write!(f, "{name}{{{reference}}}"),
        }
    }
}

impl FromStr for PathSegment {
    type Err = PathError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        if token.ends_with('}') {
            if let Some(open) = token.find('{') {
                return Ok(PathSegment::Definition {
                    name: token[..open].to_string(),
                    reference: token[open + 1..token.len() - 1].to_string(),
                });
            }
        }
        match token.strip_suffix(ARRAY_MARKER) {
            Some(name) => Ok(PathSegment::ArrayElement(name.to_string())),
            None => Ok(PathSegment::Field(token.to_string())),
        }
    }
}

/// The position of a leaf in a nested schema, as an ordered list of segments.
///
/// Two renderings exist. [`FieldPath::flat_name`] is the field name the
/// optimizer sees (`customer.address.street`, `items[*].price`). `Display`
/// is the reconstruction key stored in a [`PathIndex`]; it is the same string
/// except that `$ref` segments also carry their target
/// (`billing{#/definitions/Address}.street`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct FieldPath {
    segments: Vec<PathSegment>,
}

impl FieldPath {
    pub fn new(segments: Vec<PathSegment>) -> Self {
        Self { segments }
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// A new path with `segment` appended.
    pub fn join(&self, segment: PathSegment) -> Self {
        let mut segments = Vec::with_capacity(self.segments.len() + 1);
        segments.extend(self.segments.iter().cloned());
        segments.push(segment);
        Self { segments }
    }

    pub fn field(&self, name: &str) -> Self {
        self.join(PathSegment::Field(name.to_string()))
    }

    pub fn array_element(&self, name: &str) -> Self {
        self.join(PathSegment::ArrayElement(name.to_string()))
    }

    pub fn definition(&self, name: &str, reference: &str) -> Self {
        self.join(PathSegment::Definition {
            name: name.to_string(),
            reference: reference.to_string(),
        })
    }

    /// Whether any segment passes through a `$ref`.
    pub fn has_definition(&self) -> bool {
        self.segments
            .iter()
            .any(|s| matches!(s, PathSegment::Definition { .. }))
    }

    /// The dotted field name used as the flat property key.
    pub fn flat_name(&self) -> String {
        let mut out = String::new();
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                out.push('.');
            }
            segment.write_flat(&mut out);
        }
        out
    }

    /// Parse a flat name or reconstruction key, falling back to a single
    /// field segment when the text does not parse.
    pub fn parse_lenient(input: &str) -> Self {
        input
            .parse()
            .unwrap_or_else(|_| FieldPath::new(vec![PathSegment::Field(input.to_string())]))
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl FromStr for FieldPath {
    type Err = PathError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        if input.is_empty() {
            return Err(PathError::Empty);
        }
        split_top_level(input)?
            .into_iter()
            .map(str::parse)
            .collect::<Result<Vec<_>, _>>()
            .map(FieldPath::new)
    }
}

/// Split on `.` outside `{...}` reference targets, which may contain dots.
fn split_top_level(input: &str) -> Result<Vec<&str>, PathError> {
    let mut tokens = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in input.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            '.' if depth == 0 => {
                tokens.push(&input[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    let last = &input[start..];
    if depth > 0 {
        return Err(PathError::UnterminatedRef(last.to_string()));
    }
    tokens.push(last);
    Ok(tokens)
}

/// Whether a property name would be misread when its flat path is parsed.
pub fn is_ambiguous_name(name: &str) -> bool {
    name.contains('.') || name.contains(ARRAY_MARKER) || name.contains('{') || name.contains('}')
}

impl Serialize for FieldPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FieldPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Flat field name to reconstruction path, in flattening order.
///
/// Empty exactly when the source document needed no flattening, so callers
/// use `is_empty` to decide whether to reconstruct at all.
///
/// Containers whose keys go beyond the bare `type` (a `description` on an
/// object, on an array or its items, or next to a `$ref`) have those keys
/// recorded under the container's reconstruction key, so rebuilding can
/// restore them. Without any, the index serializes as a plain
/// `{flat name: reconstruction key}` object; with some, as
/// `{"paths": {...}, "containers": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PathIndex {
    entries: IndexMap<String, FieldPath>,
    containers: IndexMap<String, Map<String, Value>>,
}

impl PathIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Record a path under its flat name, returning the previous entry.
    pub fn insert(&mut self, path: FieldPath) -> Option<FieldPath> {
        self.entries.insert(path.flat_name(), path)
    }

    pub fn get(&self, flat_name: &str) -> Option<&FieldPath> {
        self.entries.get(flat_name)
    }

    pub fn contains(&self, flat_name: &str) -> bool {
        self.entries.contains_key(flat_name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldPath)> {
        self.entries.iter()
    }

    pub fn flat_names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// The path to rebuild `flat_name` at: the indexed entry, or the name
    /// itself parsed as a path.
    pub fn resolve(&self, flat_name: &str) -> FieldPath {
        self.entries
            .get(flat_name)
            .cloned()
            .unwrap_or_else(|| FieldPath::parse_lenient(flat_name))
    }

    /// Record the keys of the container at `path`, other than its children.
    /// For an array the item schema's keys sit under `items`.
    pub fn insert_container(&mut self, path: &FieldPath, attributes: Map<String, Value>) {
        self.containers.insert(path.to_string(), attributes);
    }

    pub fn container(&self, path: &FieldPath) -> Option<&Map<String, Value>> {
        self.containers.get(&path.to_string())
    }

    pub fn containers(&self) -> impl Iterator<Item = (&String, &Map<String, Value>)> {
        self.containers.iter()
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct IndexWithContainers {
    paths: IndexMap<String, FieldPath>,
    containers: IndexMap<String, Map<String, Value>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IndexRepr {
    WithContainers(IndexWithContainers),
    Paths(IndexMap<String, FieldPath>),
}

impl Serialize for PathIndex {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.containers.is_empty() {
            return self.entries.serialize(serializer);
        }
        let mut state = serializer.serialize_struct("PathIndex", 2)?;
        state.serialize_field("paths", &self.entries)?;
        state.serialize_field("containers", &self.containers)?;
        state.end()
    }
}

impl<'de> Deserialize<'de> for PathIndex {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match IndexRepr::deserialize(deserializer)? {
            IndexRepr::WithContainers(index) => PathIndex {
                entries: index.paths,
                containers: index.containers,
            },
            IndexRepr::Paths(entries) => PathIndex {
                entries,
                containers: IndexMap::new(),
            },
        })
    }
}
