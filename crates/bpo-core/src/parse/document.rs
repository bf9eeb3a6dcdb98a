use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::node::{Properties, parse_properties};
use crate::error::{ParseError, value_kind};

/// A blueprint schema document: top-level metadata kept verbatim, plus the
/// parsed `properties` tree.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct SchemaDocument {
    /// Every top-level key except `properties` (`$schema`, `description`,
    /// `class`, `type`, `definitions`, ...), in source order.
    pub metadata: Map<String, Value>,
    pub properties: Properties,
}

impl SchemaDocument {
    pub fn new(metadata: Map<String, Value>, properties: Properties) -> Self {
        Self {
            metadata,
            properties,
        }
    }

    /// The raw `definitions` table, if the document has one.
    pub fn definitions(&self) -> Option<&Map<String, Value>> {
        self.metadata.get("definitions").and_then(Value::as_object)
    }

    /// A copy of this document's metadata with different properties.
    pub fn with_properties(&self, properties: Properties) -> Self {
        Self {
            metadata: self.metadata.clone(),
            properties,
        }
    }
}

impl TryFrom<Value> for SchemaDocument {
    type Error = ParseError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let map = match value {
            Value::Object(map) => map,
            other => return Err(ParseError::NotAnObject(value_kind(&other))),
        };

        let mut document = SchemaDocument::default();
        for (key, value) in map {
            match value {
                Value::Object(props) if key == "properties" => {
                    document.properties = parse_properties(props);
                }
                other if key == "properties" => {
                    return Err(ParseError::PropertiesNotObject(value_kind(&other)));
                }
                other => {
                    document.metadata.insert(key, other);
                }
            }
        }
        Ok(document)
    }
}

impl From<SchemaDocument> for Value {
    fn from(document: SchemaDocument) -> Self {
        let mut map = document.metadata;
        let properties: Map<String, Value> = document
            .properties
            .into_iter()
            .map(|(name, node)| (name, Value::from(node)))
            .collect();
        map.insert("properties".to_string(), Value::Object(properties));
        Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_metadata_kept_verbatim() {
        let raw = json!({
            "$schema": "http://json-schema.org/draft-07/schema#",
            "description": "Invoice",
            "class": "invoice",
            "type": "object",
            "definitions": {"test": "value"},
            "properties": {}
        });
        let doc = SchemaDocument::try_from(raw.clone()).unwrap();
        assert_eq!(doc.metadata.len(), 5);
        assert_eq!(doc.metadata["definitions"], json!({"test": "value"}));
        assert_eq!(Value::from(doc), raw);
    }

    #[test]
    fn test_rejects_non_object_root() {
        let err = SchemaDocument::try_from(json!([1, 2])).unwrap_err();
        assert!(matches!(err, ParseError::NotAnObject("array")));
    }

    #[test]
    fn test_rejects_non_object_properties() {
        let err = SchemaDocument::try_from(json!({"properties": "oops"})).unwrap_err();
        assert!(matches!(err, ParseError::PropertiesNotObject("string")));
    }

    #[test]
    fn test_deserialize_through_serde() {
        let doc: SchemaDocument = serde_json::from_str(
            r#"{"class": "receipt", "properties": {"total": {"type": "number"}}}"#,
        )
        .unwrap();
        assert_eq!(doc.metadata["class"], "receipt");
        assert!(doc.properties["total"].is_leaf());
    }
}
