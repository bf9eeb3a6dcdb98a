use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::detect::is_nested;
use super::diagnostics::{Diagnostic, DiagnosticKind};
use super::path::{FieldPath, PathIndex, is_ambiguous_name};
use crate::error::{ResolveError, TransformError, value_kind};
use crate::parse::document::SchemaDocument;
use crate::parse::node::{ArrayNode, ObjectNode, Properties, RefNode, SchemaNode};
use crate::parse::ref_resolve::DefinitionTable;

/// What to do when two schema locations produce the same flat path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Fail with [`TransformError::DuplicatePath`].
    #[default]
    Reject,
    /// Keep the later leaf at the earlier one's position.
    LastWriteWins,
}

/// Options controlling the flatten pass.
#[derive(Debug, Clone, Default)]
pub struct FlattenOptions {
    pub duplicate_paths: DuplicatePolicy,
}

/// Result of flattening a document.
#[derive(Debug, Clone, PartialEq)]
pub struct Flattened {
    /// Same metadata as the input; `properties` keyed by flat path.
    pub document: SchemaDocument,
    /// Empty when the input needed no flattening.
    pub index: PathIndex,
    pub diagnostics: Vec<Diagnostic>,
}

/// Flatten with default options.
pub fn flatten(document: &SchemaDocument) -> Result<Flattened, TransformError> {
    flatten_with_options(document, &FlattenOptions::default())
}

/// Flatten a nested document into flat-path leaves.
///
/// A document without decomposable properties is returned unchanged with an
/// empty index.
pub fn flatten_with_options(
    document: &SchemaDocument,
    options: &FlattenOptions,
) -> Result<Flattened, TransformError> {
    if !is_nested(document) {
        return Ok(Flattened {
            document: document.clone(),
            index: PathIndex::new(),
            diagnostics: Vec::new(),
        });
    }

    let definitions = DefinitionTable::from_document(document);
    let mut flattener = Flattener {
        definitions: &definitions,
        options,
        leaves: Properties::new(),
        index: PathIndex::new(),
        diagnostics: Vec::new(),
        expanding: Vec::new(),
    };
    flattener.walk(&document.properties, &FieldPath::default())?;

    log::debug!(
        "flattened {} top-level properties into {} fields ({} diagnostics)",
        document.properties.len(),
        flattener.leaves.len(),
        flattener.diagnostics.len()
    );

    Ok(Flattened {
        document: document.with_properties(flattener.leaves),
        index: flattener.index,
        diagnostics: flattener.diagnostics,
    })
}

struct Flattener<'a> {
    definitions: &'a DefinitionTable,
    options: &'a FlattenOptions,
    leaves: Properties,
    index: PathIndex,
    diagnostics: Vec<Diagnostic>,
    /// Definitions on the current expansion stack.
    expanding: Vec<String>,
}

impl Flattener<'_> {
    fn walk(&mut self, properties: &Properties, prefix: &FieldPath) -> Result<(), TransformError> {
        for (name, node) in properties {
            if is_ambiguous_name(name) {
                self.report(
                    prefix.field(name).flat_name(),
                    DiagnosticKind::AmbiguousName { name: name.clone() },
                );
            }

            match node {
                SchemaNode::Object(object) if object.properties.is_empty() => {
                    self.degrade(prefix.field(name), node, DiagnosticKind::EmptyContainer)?;
                }
                SchemaNode::Object(object) => {
                    let path = prefix.field(name);
                    if object.attributes != ObjectNode::shell().attributes {
                        self.keep_container(&path, object.attributes.clone());
                    }
                    self.walk(&object.properties, &path)?;
                }
                SchemaNode::Array(array) if array.items.properties.is_empty() => {
                    self.degrade(prefix.field(name), node, DiagnosticKind::EmptyContainer)?;
                }
                SchemaNode::Array(array) => {
                    let path = prefix.array_element(name);
                    let shell = ArrayNode::shell();
                    if array.attributes != shell.attributes
                        || array.items.attributes != shell.items.attributes
                    {
                        let mut attributes = array.attributes.clone();
                        attributes.insert(
                            "items".to_string(),
                            Value::Object(array.items.attributes.clone()),
                        );
                        self.keep_container(&path, attributes);
                    }
                    self.walk(&array.items.properties, &path)?;
                }
                SchemaNode::Ref(reference) => {
                    self.expand_ref(name, reference, node, prefix)?;
                }
                SchemaNode::Leaf(Value::Object(_)) => {
                    self.record(prefix.field(name), node.clone())?;
                }
                SchemaNode::Leaf(other) => {
                    let found = value_kind(other).to_string();
                    self.degrade(prefix.field(name), node, DiagnosticKind::NotASchema { found })?;
                }
            }
        }
        Ok(())
    }

    /// Descend into the definition behind a `$ref`, or keep the `$ref` node
    /// as a leaf when it cannot be expanded.
    fn expand_ref(
        &mut self,
        name: &str,
        reference: &RefNode,
        node: &SchemaNode,
        prefix: &FieldPath,
    ) -> Result<(), TransformError> {
        let definitions = self.definitions;
        let ref_path = reference.reference.clone();

        let (definition, target) = match definitions.resolve(&ref_path) {
            Ok(found) => found,
            Err(err) => {
                let kind = match err {
                    ResolveError::InvalidRefFormat(_) => DiagnosticKind::InvalidRef {
                        reference: ref_path,
                    },
                    ResolveError::RefTargetNotFound(_) => DiagnosticKind::UnresolvedRef {
                        reference: ref_path,
                    },
                    ResolveError::NoProperties(_) => DiagnosticKind::EmptyDefinition {
                        reference: ref_path,
                    },
                    ResolveError::CircularRef(_) => DiagnosticKind::CircularRef {
                        reference: ref_path,
                    },
                };
                return self.degrade(prefix.field(name), node, kind);
            }
        };

        if self.expanding.contains(&definition) {
            return self.degrade(
                prefix.field(name),
                node,
                DiagnosticKind::CircularRef {
                    reference: ref_path,
                },
            );
        }

        let path = prefix.definition(name, &ref_path);
        if !reference.attributes.is_empty() {
            self.keep_container(&path, reference.attributes.clone());
        }
        self.expanding.push(definition);
        let result = self.walk(&target.properties, &path);
        self.expanding.pop();
        result
    }

    /// Containers inside an expanded definition are rebuilt from the
    /// definition itself, so only those outside one are kept.
    fn keep_container(&mut self, path: &FieldPath, attributes: Map<String, Value>) {
        if self.expanding.is_empty() {
            self.index.insert_container(path, attributes);
        }
    }

    fn degrade(
        &mut self,
        path: FieldPath,
        node: &SchemaNode,
        kind: DiagnosticKind,
    ) -> Result<(), TransformError> {
        self.report(path.flat_name(), kind);
        self.record(path, node.clone())
    }

    fn record(&mut self, path: FieldPath, leaf: SchemaNode) -> Result<(), TransformError> {
        let flat_name = path.flat_name();
        if self.leaves.contains_key(&flat_name) {
            match self.options.duplicate_paths {
                DuplicatePolicy::Reject => return Err(TransformError::DuplicatePath(flat_name)),
                DuplicatePolicy::LastWriteWins => {
                    self.report(flat_name.clone(), DiagnosticKind::DuplicatePath);
                }
            }
        }
        self.leaves.insert(flat_name, leaf);
        self.index.insert(path);
        Ok(())
    }

    fn report(&mut self, path: String, kind: DiagnosticKind) {
        let diagnostic = Diagnostic::new(path, kind);
        diagnostic.log();
        self.diagnostics.push(diagnostic);
    }
}
