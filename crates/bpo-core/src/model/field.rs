use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::parse::node::SchemaNode;

/// A leaf field as the optimization loop sees it. Only `instruction` is
/// expected to change between iterations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldProperty {
    #[serde(rename = "type")]
    pub field_type: String,

    #[serde(rename = "inferenceType")]
    pub inference_type: String,

    pub instruction: String,

    /// Any other keys on the leaf, carried through unchanged.
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

impl FieldProperty {
    pub fn new(
        field_type: impl Into<String>,
        inference_type: impl Into<String>,
        instruction: impl Into<String>,
    ) -> Self {
        Self {
            field_type: field_type.into(),
            inference_type: inference_type.into(),
            instruction: instruction.into(),
            extra: IndexMap::new(),
        }
    }
}

impl TryFrom<SchemaNode> for FieldProperty {
    type Error = serde_json::Error;

    fn try_from(node: SchemaNode) -> Result<Self, Self::Error> {
        serde_json::from_value(Value::from(node))
    }
}

impl TryFrom<&FieldProperty> for SchemaNode {
    type Error = serde_json::Error;

    fn try_from(field: &FieldProperty) -> Result<Self, Self::Error> {
        serde_json::to_value(field).map(SchemaNode::from)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_reads_leaf_and_keeps_extra_keys() {
        let node = SchemaNode::from(json!({
            "type": "string",
            "inferenceType": "explicit",
            "instruction": "Extract name",
            "description": "Customer name"
        }));
        let field = FieldProperty::try_from(node).unwrap();
        assert_eq!(field.field_type, "string");
        assert_eq!(field.inference_type, "explicit");
        assert_eq!(field.instruction, "Extract name");
        assert_eq!(field.extra["description"], "Customer name");
    }

    #[test]
    fn test_missing_field_is_an_error() {
        let node = SchemaNode::from(json!({"type": "string", "instruction": "Extract name"}));
        let err = FieldProperty::try_from(node).unwrap_err();
        assert!(err.to_string().contains("inferenceType"));
    }

    #[test]
    fn test_container_is_not_a_field() {
        let node = SchemaNode::from(json!({"type": "object"}));
        assert!(FieldProperty::try_from(node).is_err());
    }

    #[test]
    fn test_serializes_with_wire_names() {
        let field = FieldProperty::new("number", "inferred", "Extract total");
        assert_eq!(
            serde_json::to_value(&field).unwrap(),
            json!({"type": "number", "inferenceType": "inferred", "instruction": "Extract total"})
        );
    }
}
