use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Ordered `properties` mapping of an object schema.
pub type Properties = IndexMap<String, SchemaNode>;

/// One property of a blueprint schema, classified once when it is read.
///
/// Only the shapes the flattener can descend into get their own variant.
/// Everything else, including malformed containers, is kept verbatim as a
/// [`SchemaNode::Leaf`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum SchemaNode {
    /// `type: object` with a `properties` mapping.
    Object(ObjectNode),
    /// `type: array` whose `items` is an object with a `properties` mapping.
    Array(ArrayNode),
    /// A `$ref` pointer, resolved later against the definitions table.
    Ref(RefNode),
    /// Anything else: scalars, bare arrays, objects without `properties`.
    Leaf(Value),
}

/// An object schema. `attributes` holds every key other than `properties`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ObjectNode {
    pub attributes: Map<String, Value>,
    pub properties: Properties,
}

/// An array-of-objects schema. `attributes` holds every key other than `items`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ArrayNode {
    pub attributes: Map<String, Value>,
    pub items: ObjectNode,
}

/// A `$ref` property. Sibling keys are kept in `attributes`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RefNode {
    pub reference: String,
    pub attributes: Map<String, Value>,
}

impl SchemaNode {
    /// Short name of the variant, for logs and diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            SchemaNode::Object(_) => "object",
            SchemaNode::Array(_) => "array",
            SchemaNode::Ref(_) => "ref",
            SchemaNode::Leaf(_) => "leaf",
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, SchemaNode::Leaf(_))
    }

    pub fn as_leaf(&self) -> Option<&Value> {
        match self {
            SchemaNode::Leaf(value) => Some(value),
            _ => None,
        }
    }

    /// The `instruction` text of a leaf, if it has one.
    pub fn instruction(&self) -> Option<&str> {
        self.as_leaf()?.get("instruction")?.as_str()
    }

    /// Replace the `instruction` of a leaf that already carries one.
    pub fn set_instruction(&mut self, instruction: &str) -> bool {
        match self {
            SchemaNode::Leaf(Value::Object(map)) if map.contains_key("instruction") => {
                map.insert(
                    "instruction".to_string(),
                    Value::String(instruction.to_string()),
                );
                true
            }
            _ => false,
        }
    }
}

impl ObjectNode {
    /// An empty `{"type": "object", "properties": {}}` container.
    pub fn shell() -> Self {
        let mut attributes = Map::new();
        attributes.insert("type".to_string(), Value::String("object".to_string()));
        Self {
            attributes,
            properties: Properties::new(),
        }
    }

    /// Split a mapping into attributes and parsed properties. A non-mapping
    /// `properties` value stays an attribute.
    pub fn from_map(map: Map<String, Value>) -> Self {
        let mut node = ObjectNode::default();
        for (key, value) in map {
            match value {
                Value::Object(props) if key == "properties" => {
                    node.properties = parse_properties(props);
                }
                value => {
                    node.attributes.insert(key, value);
                }
            }
        }
        node
    }
}

impl ArrayNode {
    /// An empty `{"type": "array", "items": {"type": "object", "properties": {}}}` container.
    pub fn shell() -> Self {
        let mut attributes = Map::new();
        attributes.insert("type".to_string(), Value::String("array".to_string()));
        Self {
            attributes,
            items: ObjectNode::shell(),
        }
    }
}

/// Parse every entry of a `properties` mapping.
pub fn parse_properties(props: Map<String, Value>) -> Properties {
    props
        .into_iter()
        .map(|(name, value)| (name, SchemaNode::from(value)))
        .collect()
}

fn type_is(map: &Map<String, Value>, expected: &str) -> bool {
    map.get("type").and_then(Value::as_str) == Some(expected)
}

fn is_object_with_properties(map: &Map<String, Value>) -> bool {
    type_is(map, "object") && map.get("properties").is_some_and(Value::is_object)
}

fn is_array_of_objects(map: &Map<String, Value>) -> bool {
    type_is(map, "array")
        && map
            .get("items")
            .and_then(Value::as_object)
            .is_some_and(is_object_with_properties)
}

impl From<Value> for SchemaNode {
    fn from(value: Value) -> Self {
        let map = match value {
            Value::Object(map) => map,
            other => return SchemaNode::Leaf(other),
        };

        if map.get("$ref").is_some_and(Value::is_string) {
            let mut node = RefNode::default();
            for (key, value) in map {
                match value {
                    Value::String(reference) if key == "$ref" => node.reference = reference,
                    value => {
                        node.attributes.insert(key, value);
                    }
                }
            }
            return SchemaNode::Ref(node);
        }

        if is_object_with_properties(&map) {
            return SchemaNode::Object(ObjectNode::from_map(map));
        }

        if is_array_of_objects(&map) {
            let mut node = ArrayNode::default();
            for (key, value) in map {
                match value {
                    Value::Object(items) if key == "items" => {
                        node.items = ObjectNode::from_map(items);
                    }
                    value => {
                        node.attributes.insert(key, value);
                    }
                }
            }
            return SchemaNode::Array(node);
        }

        SchemaNode::Leaf(Value::Object(map))
    }
}

impl From<ObjectNode> for Value {
    fn from(node: ObjectNode) -> Self {
        let mut map = node.attributes;
        let properties: Map<String, Value> = node
            .properties
            .into_iter()
            .map(|(name, child)| (name, Value::from(child)))
            .collect();
        map.insert("properties".to_string(), Value::Object(properties));
        Value::Object(map)
    }
}

impl From<ArrayNode> for Value {
    fn from(node: ArrayNode) -> Self {
        let mut map = node.attributes;
        map.insert("items".to_string(), Value::from(node.items));
        Value::Object(map)
    }
}

impl From<RefNode> for Value {
    fn from(node: RefNode) -> Self {
        let mut map = Map::new();
        map.insert("$ref".to_string(), Value::String(node.reference));
        map.extend(node.attributes);
        Value::Object(map)
    }
}

impl From<SchemaNode> for Value {
    fn from(node: SchemaNode) -> Self {
        match node {
            SchemaNode::Object(object) => object.into(),
            SchemaNode::Array(array) => array.into(),
            SchemaNode::Ref(reference) => reference.into(),
            SchemaNode::Leaf(value) => value,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_classifies_object_with_properties() {
        let node = SchemaNode::from(json!({
            "type": "object",
            "description": "Customer block",
            "properties": {
                "name": {"type": "string", "inferenceType": "explicit", "instruction": "Extract name"}
            }
        }));
        match node {
            SchemaNode::Object(obj) => {
                assert_eq!(obj.attributes["description"], "Customer block");
                assert!(obj.properties["name"].is_leaf());
            }
            other => panic!("expected object, got {}", other.kind()),
        }
    }

    #[test]
    fn test_object_without_properties_is_leaf() {
        let raw = json!({"type": "object"});
        assert_eq!(SchemaNode::from(raw.clone()), SchemaNode::Leaf(raw));
    }

    #[test]
    fn test_array_of_scalars_is_leaf() {
        let raw = json!({"type": "array", "items": {"type": "string"}});
        assert!(SchemaNode::from(raw).is_leaf());
    }

    #[test]
    fn test_array_of_objects_without_properties_is_leaf() {
        let raw = json!({"type": "array", "items": {"type": "object"}});
        assert!(SchemaNode::from(raw).is_leaf());
    }

    #[test]
    fn test_ref_keeps_sibling_keys() {
        let raw = json!({"$ref": "#/definitions/Address", "description": "Billing"});
        match SchemaNode::from(raw.clone()) {
            SchemaNode::Ref(node) => {
                assert_eq!(node.reference, "#/definitions/Address");
                assert_eq!(node.attributes["description"], "Billing");
                assert_eq!(Value::from(SchemaNode::Ref(node)), raw);
            }
            other => panic!("expected ref, got {}", other.kind()),
        }
    }

    #[test]
    fn test_non_string_ref_is_leaf() {
        assert!(SchemaNode::from(json!({"$ref": 7})).is_leaf());
    }

    #[test]
    fn test_conversion_is_lossless() {
        let raw = json!({
            "type": "array",
            "description": "Line items",
            "items": {
                "type": "object",
                "title": "LineItem",
                "properties": {
                    "price": {"type": "number", "inferenceType": "explicit", "instruction": "Extract price"},
                    "tags": {"type": "array", "items": {"type": "string"}}
                }
            }
        });
        let node = SchemaNode::from(raw.clone());
        assert!(matches!(node, SchemaNode::Array(_)));
        assert_eq!(Value::from(node), raw);
    }

    #[test]
    fn test_set_instruction_only_touches_leaves_with_instruction() {
        let mut leaf = SchemaNode::from(json!({"type": "string", "instruction": "old"}));
        assert!(leaf.set_instruction("new"));
        assert_eq!(leaf.instruction(), Some("new"));

        let mut bare = SchemaNode::from(json!({"type": "string"}));
        assert!(!bare.set_instruction("new"));
    }
}
