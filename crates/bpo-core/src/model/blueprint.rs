use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::field::FieldProperty;
use super::to_json_pretty;
use crate::error::{ParseError, TransformError};
use crate::parse::document::SchemaDocument;
use crate::parse::node::SchemaNode;
use crate::transform::detect::has_nested_properties;
use crate::transform::{
    Diagnostic, DiagnosticKind, FlattenOptions, Flattened, PathIndex, Unflattened,
    flatten_with_options, unflatten,
};

pub const DEFAULT_SCHEMA_URI: &str = "http://json-schema.org/draft-07/schema#";

fn default_schema_uri() -> String {
    DEFAULT_SCHEMA_URI.to_string()
}

fn default_schema_type() -> String {
    "object".to_string()
}

/// An extraction blueprint: JSON Schema metadata plus a property table.
///
/// `P` is [`SchemaNode`] for an authored (possibly nested) blueprint and
/// [`FieldProperty`] for the flat form handed to an optimizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "P: DeserializeOwned"))]
pub struct Blueprint<P = SchemaNode> {
    #[serde(rename = "$schema", default = "default_schema_uri")]
    pub schema_uri: String,

    pub description: String,

    pub class: String,

    #[serde(rename = "type", default = "default_schema_type")]
    pub schema_type: String,

    #[serde(default)]
    pub definitions: Map<String, Value>,

    #[serde(default)]
    pub properties: IndexMap<String, P>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A blueprint whose properties are all flat-path leaves.
pub type FlatBlueprint = Blueprint<FieldProperty>;

/// Output of [`Blueprint::flatten_for_optimization`].
#[derive(Debug, Clone, PartialEq)]
pub struct FlattenedBlueprint {
    pub blueprint: FlatBlueprint,
    /// Needed to rebuild the nested blueprint; empty if it was already flat.
    pub index: PathIndex,
    pub diagnostics: Vec<Diagnostic>,
}

/// Output of [`Blueprint::unflatten_from_optimization`].
#[derive(Debug, Clone, PartialEq)]
pub struct UnflattenedBlueprint {
    pub blueprint: Blueprint,
    pub diagnostics: Vec<Diagnostic>,
}

impl<P> Blueprint<P> {
    pub fn new(description: impl Into<String>, class: impl Into<String>) -> Self {
        Self {
            schema_uri: default_schema_uri(),
            description: description.into(),
            class: class.into(),
            schema_type: default_schema_type(),
            definitions: Map::new(),
            properties: IndexMap::new(),
            extra: Map::new(),
        }
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.properties.keys().map(String::as_str)
    }

    /// Same metadata, different property table.
    fn with_properties<Q>(&self, properties: IndexMap<String, Q>) -> Blueprint<Q> {
        Blueprint {
            schema_uri: self.schema_uri.clone(),
            description: self.description.clone(),
            class: self.class.clone(),
            schema_type: self.schema_type.clone(),
            definitions: self.definitions.clone(),
            properties,
            extra: self.extra.clone(),
        }
    }
}

impl<P: DeserializeOwned> Blueprint<P> {
    pub fn from_json(input: &str) -> Result<Self, ParseError> {
        Ok(serde_json::from_str(input)?)
    }

    pub fn load(path: &Path) -> Result<Self, ParseError> {
        let content = fs::read_to_string(path).map_err(|source| ParseError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }

    pub fn from_document(document: SchemaDocument) -> Result<Self, ParseError> {
        Ok(serde_json::from_value(Value::from(document))?)
    }
}

impl<P: Serialize> Blueprint<P> {
    /// JSON with four-space indentation.
    pub fn to_json_pretty(&self) -> Result<String, ParseError> {
        Ok(to_json_pretty(self)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), ParseError> {
        let content = self.to_json_pretty()?;
        fs::write(path, content).map_err(|source| ParseError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn to_document(&self) -> Result<SchemaDocument, ParseError> {
        SchemaDocument::try_from(serde_json::to_value(self)?)
    }
}

impl Blueprint {
    /// Whether any top-level property is an object, array of objects or
    /// `$ref` that flattening would decompose.
    pub fn is_nested(&self) -> bool {
        has_nested_properties(&self.properties)
    }

    /// Replace the instruction of a top-level leaf. Returns `false` when the
    /// field is missing or carries no instruction.
    pub fn update_instruction(&mut self, field: &str, instruction: &str) -> bool {
        self.properties
            .get_mut(field)
            .is_some_and(|node| node.set_instruction(instruction))
    }

    /// Flatten into optimizer-ready fields.
    ///
    /// Leaves that do not read as a [`FieldProperty`] are left out and
    /// reported as [`DiagnosticKind::DroppedField`].
    pub fn flatten_for_optimization(
        &self,
        options: &FlattenOptions,
    ) -> Result<FlattenedBlueprint, TransformError> {
        let Flattened {
            document,
            index,
            mut diagnostics,
        } = flatten_with_options(&self.to_document()?, options)?;

        let mut fields = IndexMap::with_capacity(document.properties.len());
        for (name, node) in document.properties {
            match FieldProperty::try_from(node) {
                Ok(field) => {
                    fields.insert(name, field);
                }
                Err(err) => {
                    let diagnostic = Diagnostic::new(
                        name,
                        DiagnosticKind::DroppedField {
                            reason: err.to_string(),
                        },
                    );
                    diagnostic.log();
                    diagnostics.push(diagnostic);
                }
            }
        }

        log::info!(
            "blueprint '{}': {} optimizable fields, {} paths indexed",
            self.class,
            fields.len(),
            index.len()
        );

        Ok(FlattenedBlueprint {
            blueprint: self.with_properties(fields),
            index,
            diagnostics,
        })
    }

    /// Rebuild the nested blueprint from an optimized flat one.
    pub fn unflatten_from_optimization(
        flat: &FlatBlueprint,
        index: &PathIndex,
    ) -> Result<UnflattenedBlueprint, TransformError> {
        let document = flat.to_document()?;
        if index.is_empty() {
            log::debug!("empty path index, '{}' was already flat", flat.class);
        }
        let Unflattened {
            document,
            diagnostics,
        } = unflatten(&document, index);
        Ok(UnflattenedBlueprint {
            blueprint: Blueprint::from_document(document)?,
            diagnostics,
        })
    }
}

impl FlatBlueprint {
    pub fn update_instruction(&mut self, field: &str, instruction: &str) -> bool {
        match self.properties.get_mut(field) {
            Some(property) => {
                property.instruction = instruction.to_string();
                true
            }
            None => false,
        }
    }

    /// Apply a batch of instruction updates, returning the names that matched
    /// no field.
    pub fn apply_instructions<I, K, V>(&mut self, updates: I) -> Vec<String>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut unmatched = Vec::new();
        for (field, instruction) in updates {
            let field = field.as_ref();
            if !self.update_instruction(field, instruction.as_ref()) {
                unmatched.push(field.to_string());
            }
        }
        unmatched
    }

    pub fn instructions(&self) -> impl Iterator<Item = (&str, &str)> {
        self.properties
            .iter()
            .map(|(name, field)| (name.as_str(), field.instruction.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn invoice() -> Blueprint {
        serde_json::from_value(json!({
            "description": "Invoice",
            "class": "invoice",
            "properties": {
                "invoice_number": {
                    "type": "string",
                    "inferenceType": "explicit",
                    "instruction": "Extract invoice number"
                },
                "customer": {
                    "type": "object",
                    "properties": {
                        "name": {
                            "type": "string",
                            "inferenceType": "explicit",
                            "instruction": "Extract customer name"
                        }
                    }
                }
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_defaults_applied() {
        let blueprint: Blueprint =
            Blueprint::from_json(r#"{"description": "d", "class": "c"}"#).unwrap();
        assert_eq!(blueprint.schema_uri, DEFAULT_SCHEMA_URI);
        assert_eq!(blueprint.schema_type, "object");
        assert!(blueprint.definitions.is_empty());
        assert!(blueprint.properties.is_empty());
    }

    #[test]
    fn test_missing_class_is_rejected() {
        assert!(Blueprint::<SchemaNode>::from_json(r#"{"description": "d"}"#).is_err());
    }

    #[test]
    fn test_unknown_metadata_is_kept() {
        let blueprint: Blueprint =
            Blueprint::from_json(r#"{"description": "d", "class": "c", "version": 3}"#).unwrap();
        assert_eq!(blueprint.extra["version"], 3);
        let value = serde_json::to_value(&blueprint).unwrap();
        assert_eq!(value["version"], 3);
    }

    #[test]
    fn test_pretty_json_uses_four_spaces() {
        let blueprint: Blueprint = Blueprint::new("d", "c");
        let text = blueprint.to_json_pretty().unwrap();
        assert!(text.contains("\n    \"description\": \"d\""));
    }

    #[test]
    fn test_flatten_for_optimization() {
        let out = invoice()
            .flatten_for_optimization(&FlattenOptions::default())
            .unwrap();
        let names: Vec<&str> = out.blueprint.field_names().collect();
        assert_eq!(names, ["invoice_number", "customer.name"]);
        assert_eq!(out.blueprint.class, "invoice");
        assert!(out.index.contains("customer.name"));
        assert!(out.diagnostics.is_empty());
    }

    #[test]
    fn test_update_instruction_on_nested_only_reaches_top_level() {
        let mut blueprint = invoice();
        assert!(blueprint.update_instruction("invoice_number", "Find the number"));
        assert!(!blueprint.update_instruction("customer", "nope"));
        assert!(!blueprint.update_instruction("missing", "nope"));
        assert_eq!(
            blueprint.properties["invoice_number"].instruction(),
            Some("Find the number")
        );
    }

    #[test]
    fn test_apply_instructions_reports_unmatched() {
        let mut flat = invoice()
            .flatten_for_optimization(&FlattenOptions::default())
            .unwrap()
            .blueprint;
        let unmatched = flat.apply_instructions([
            ("customer.name", "Name of the buyer"),
            ("customer.email", "Email"),
        ]);
        assert_eq!(unmatched, ["customer.email"]);
        let instructions: Vec<(&str, &str)> = flat.instructions().collect();
        assert_eq!(
            instructions,
            [
                ("invoice_number", "Extract invoice number"),
                ("customer.name", "Name of the buyer")
            ]
        );
    }

    #[test]
    fn test_unflatten_with_empty_index_keeps_flat_fields() {
        let mut flat: FlatBlueprint = Blueprint::new("d", "c");
        flat.properties.insert(
            "a.b".to_string(),
            FieldProperty::new("string", "explicit", "x"),
        );
        let rebuilt = Blueprint::unflatten_from_optimization(&flat, &PathIndex::new()).unwrap();
        assert_eq!(rebuilt.blueprint.field_names().collect::<Vec<_>>(), ["a.b"]);
        assert!(rebuilt.diagnostics.is_empty());
    }

    #[test]
    fn test_unflatten_reports_rebuild_diagnostics() {
        let blueprint: Blueprint = serde_json::from_value(json!({
            "description": "Shipment",
            "class": "shipment",
            "definitions": {
                "Address": {
                    "type": "object",
                    "properties": {
                        "city": {
                            "type": "string",
                            "inferenceType": "explicit",
                            "instruction": "Extract city"
                        }
                    }
                }
            },
            "properties": {
                "billing": {"$ref": "#/definitions/Address"},
                "shipping": {"$ref": "#/definitions/Address"}
            }
        }))
        .unwrap();
        let mut flattened = blueprint
            .flatten_for_optimization(&FlattenOptions::default())
            .unwrap();
        assert!(
            flattened
                .blueprint
                .update_instruction("billing.city", "Extract the billing city")
        );

        let rebuilt =
            Blueprint::unflatten_from_optimization(&flattened.blueprint, &flattened.index)
                .unwrap();
        assert_eq!(
            rebuilt.diagnostics,
            vec![Diagnostic::new(
                "shipping",
                DiagnosticKind::InlinedRef {
                    reference: "#/definitions/Address".to_string()
                }
            )]
        );
        let value = serde_json::to_value(&rebuilt.blueprint).unwrap();
        assert_eq!(
            value["definitions"]["Address"]["properties"]["city"]["instruction"],
            "Extract the billing city"
        );
        assert_eq!(
            value["properties"]["shipping"]["properties"]["city"]["instruction"],
            "Extract city"
        );
    }
}
