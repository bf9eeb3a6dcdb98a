use indexmap::IndexMap;
use serde_json::{Map, Value};

use super::document::SchemaDocument;
use super::node::ObjectNode;
use crate::error::ResolveError;

const DEFINITIONS_PREFIX: &str = "#/definitions/";

/// One entry of a document's `definitions` table.
#[derive(Debug, Clone, PartialEq)]
pub enum Definition {
    /// Carries a `properties` mapping, so references to it can be expanded.
    Object(ObjectNode),
    /// Anything else, kept verbatim.
    Opaque(Value),
}

impl From<Value> for Definition {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) if map.get("properties").is_some_and(Value::is_object) => {
                Definition::Object(ObjectNode::from_map(map))
            }
            other => Definition::Opaque(other),
        }
    }
}

/// Resolves `#/definitions/<name>` references against a document's
/// `definitions` table. The table is parsed once per document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DefinitionTable {
    definitions: IndexMap<String, Definition>,
}

impl DefinitionTable {
    pub fn new(definitions: &Map<String, Value>) -> Self {
        Self {
            definitions: definitions
                .iter()
                .map(|(name, value)| (name.clone(), Definition::from(value.clone())))
                .collect(),
        }
    }

    /// Parse the `definitions` table of a document. A missing or non-mapping
    /// table resolves nothing.
    pub fn from_document(document: &SchemaDocument) -> Self {
        document
            .definitions()
            .map(DefinitionTable::new)
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Definition> {
        self.definitions.get(name)
    }

    /// Resolve a `$ref` to the definition it expands into.
    pub fn resolve(&self, ref_path: &str) -> Result<(String, &ObjectNode), ResolveError> {
        let name = parse_definition_ref(ref_path)?;
        match self.definitions.get(&name) {
            Some(Definition::Object(node)) if !node.properties.is_empty() => Ok((name, node)),
            Some(_) => Err(ResolveError::NoProperties(ref_path.to_string())),
            None => Err(ResolveError::RefTargetNotFound(ref_path.to_string())),
        }
    }
}

/// Extract the definition name from a `#/definitions/<name>` reference.
/// `%20` is decoded to a space, as blueprint editors write names with spaces
/// that way.
pub fn parse_definition_ref(ref_path: &str) -> Result<String, ResolveError> {
    let name = ref_path
        .strip_prefix(DEFINITIONS_PREFIX)
        .ok_or_else(|| ResolveError::InvalidRefFormat(ref_path.to_string()))?;
    if name.is_empty() || name.contains('/') {
        return Err(ResolveError::InvalidRefFormat(ref_path.to_string()));
    }
    Ok(name.replace("%20", " "))
}
