use indexmap::IndexMap;
use serde_json::{Map, Value};

use super::diagnostics::{Diagnostic, DiagnosticKind};
use super::path::{FieldPath, PathIndex, PathSegment};
use crate::parse::document::SchemaDocument;
use crate::parse::node::{ArrayNode, ObjectNode, Properties, RefNode, SchemaNode};
use crate::parse::ref_resolve::{Definition, DefinitionTable, parse_definition_ref};

/// Result of rebuilding a nested document.
#[derive(Debug, Clone, PartialEq)]
pub struct Unflattened {
    pub document: SchemaDocument,
    pub diagnostics: Vec<Diagnostic>,
}

/// Rebuild a nested document from flat-path leaves.
///
/// An empty index means the document was never flattened, so it is returned
/// unchanged. Otherwise every flat property is placed at the path its index
/// entry describes (or, for names missing from the index, at the path the
/// name itself spells), and containers get back the keys the index recorded
/// for them. Metadata is copied verbatim.
///
/// Each `$ref` is rebuilt from its own copy of the definition. The first use
/// of a definition decides its content: if its fields changed, they are
/// written into `definitions`. A later use whose fields differ from that is
/// inlined as an object and reported as [`DiagnosticKind::InlinedRef`].
/// Definitions nothing changed are left byte for byte as they were.
pub fn unflatten(flat: &SchemaDocument, index: &PathIndex) -> Unflattened {
    if index.is_empty() {
        return Unflattened {
            document: flat.clone(),
            diagnostics: Vec::new(),
        };
    }

    let definitions = DefinitionTable::from_document(flat);
    let mut placer = Placer {
        definitions: &definitions,
        index,
        diagnostics: Vec::new(),
    };
    let mut root = Drafts::new();
    for (flat_name, leaf) in &flat.properties {
        let path = index.resolve(flat_name);
        placer.place(&mut root, &path, 0, leaf.clone(), flat_name);
    }

    let mut finisher = Finisher {
        definitions: &definitions,
        claims: IndexMap::new(),
        diagnostics: placer.diagnostics,
    };
    let properties = finisher.properties(root, &FieldPath::default());
    let mut metadata = flat.metadata.clone();
    finisher.write_definitions(&mut metadata);

    log::debug!(
        "rebuilt {} flat fields into {} top-level properties",
        flat.properties.len(),
        properties.len()
    );

    Unflattened {
        document: SchemaDocument::new(metadata, properties),
        diagnostics: finisher.diagnostics,
    }
}

type Drafts = IndexMap<String, Draft>;

/// A property while leaves are being placed.
enum Draft {
    /// Placed, or carried over from a definition untouched.
    Node(SchemaNode),
    Container(Container),
}

enum Container {
    Object(ObjectDraft),
    Array {
        attributes: Map<String, Value>,
        items: ObjectDraft,
    },
    /// A `$ref` site and its own copy of the definition body.
    Ref {
        reference: String,
        definition: String,
        attributes: Map<String, Value>,
        body: ObjectDraft,
    },
}

struct ObjectDraft {
    attributes: Map<String, Value>,
    properties: Drafts,
}

impl From<ObjectNode> for ObjectDraft {
    fn from(node: ObjectNode) -> Self {
        Self {
            attributes: node.attributes,
            properties: node
                .properties
                .into_iter()
                .map(|(name, child)| (name, Draft::Node(child)))
                .collect(),
        }
    }
}

/// The container a path segment descends through.
enum Shape {
    Object,
    Array,
    Ref { reference: String, definition: String },
}

impl Shape {
    fn of(segment: &PathSegment) -> Self {
        match segment {
            PathSegment::Field(_) => Shape::Object,
            PathSegment::ArrayElement(_) => Shape::Array,
            PathSegment::Definition { reference, .. } => match parse_definition_ref(reference) {
                Ok(definition) => Shape::Ref {
                    reference: reference.clone(),
                    definition,
                },
                // Not expandable, so rebuilt as a plain object.
                Err(_) => Shape::Object,
            },
        }
    }
}

impl Draft {
    fn kind(&self) -> &'static str {
        match self {
            Draft::Node(node) => node.kind(),
            Draft::Container(container) => container.kind(),
        }
    }
}

impl Container {
    fn kind(&self) -> &'static str {
        match self {
            Container::Object(_) => "object",
            Container::Array { .. } => "array",
            Container::Ref { .. } => "ref",
        }
    }

    fn fits(&self, shape: &Shape) -> bool {
        match (self, shape) {
            (Container::Object(_), Shape::Object) | (Container::Array { .. }, Shape::Array) => {
                true
            }
            (Container::Ref { reference, .. }, Shape::Ref { reference: wanted, .. }) => {
                reference == wanted
            }
            _ => false,
        }
    }

    fn children(&mut self) -> &mut Drafts {
        match self {
            Container::Object(object) => &mut object.properties,
            Container::Array { items, .. } => &mut items.properties,
            Container::Ref { body, .. } => &mut body.properties,
        }
    }
}

struct Placer<'a> {
    definitions: &'a DefinitionTable,
    index: &'a PathIndex,
    diagnostics: Vec<Diagnostic>,
}

impl Placer<'_> {
    /// Put `leaf` at `path`, starting from segment `depth` in `level`.
    fn place(
        &mut self,
        level: &mut Drafts,
        path: &FieldPath,
        depth: usize,
        leaf: SchemaNode,
        flat_name: &str,
    ) {
        let segments = path.segments();
        let Some(segment) = segments.get(depth) else {
            return;
        };
        if depth + 1 == segments.len() {
            self.place_leaf(level, segment, leaf, flat_name);
            return;
        }

        let shape = Shape::of(segment);
        let here = FieldPath::new(segments[..=depth].to_vec());
        let name = segment.name().to_string();
        let mut container = match level.get_mut(&name) {
            Some(slot) => {
                let existing =
                    std::mem::replace(slot, Draft::Node(SchemaNode::Leaf(Value::Null)));
                self.reopen(existing, &shape, &here, flat_name)
            }
            None => self.container(&shape, &here),
        };
        self.place(container.children(), path, depth + 1, leaf, flat_name);
        level.insert(name, Draft::Container(container));
    }

    fn place_leaf(
        &mut self,
        level: &mut Drafts,
        segment: &PathSegment,
        leaf: SchemaNode,
        flat_name: &str,
    ) {
        let name = segment.name().to_string();
        if !matches!(segment, PathSegment::ArrayElement(_)) {
            level.insert(name, Draft::Node(leaf));
            return;
        }

        // A well-formed flat path never ends on an array marker; keep the
        // leaf as the array's item schema.
        let mut attributes = match level.get(&name) {
            Some(Draft::Node(SchemaNode::Array(array))) => array.attributes.clone(),
            Some(Draft::Container(Container::Array { attributes, .. })) => attributes.clone(),
            Some(other) => {
                self.replaced(other.kind(), flat_name);
                ArrayNode::shell().attributes
            }
            None => ArrayNode::shell().attributes,
        };
        attributes.insert("items".to_string(), Value::from(leaf));
        level.insert(name, Draft::Node(SchemaNode::from(Value::Object(attributes))));
    }

    /// Continue into an existing property, replacing it when it has the
    /// wrong shape.
    fn reopen(
        &mut self,
        existing: Draft,
        shape: &Shape,
        here: &FieldPath,
        flat_name: &str,
    ) -> Container {
        let found = match existing {
            Draft::Container(container) if container.fits(shape) => return container,
            Draft::Node(SchemaNode::Object(node)) if matches!(shape, Shape::Object) => {
                return Container::Object(node.into());
            }
            Draft::Node(SchemaNode::Array(node)) if matches!(shape, Shape::Array) => {
                return Container::Array {
                    attributes: node.attributes,
                    items: node.items.into(),
                };
            }
            Draft::Node(SchemaNode::Ref(node)) => match shape {
                Shape::Ref {
                    reference,
                    definition,
                } if *reference == node.reference => {
                    return self.ref_site(reference, definition, node.attributes);
                }
                _ => "ref",
            },
            other => other.kind(),
        };
        self.replaced(found, flat_name);
        self.container(shape, here)
    }

    /// A new container, with the keys the index recorded for it or the bare
    /// `type` otherwise.
    fn container(&self, shape: &Shape, here: &FieldPath) -> Container {
        let recorded = self.index.container(here).cloned();
        match shape {
            Shape::Object => Container::Object(ObjectDraft {
                attributes: recorded.unwrap_or_else(|| ObjectNode::shell().attributes),
                properties: Drafts::new(),
            }),
            Shape::Array => {
                let mut attributes = recorded.unwrap_or_else(|| ArrayNode::shell().attributes);
                let items = match attributes.remove("items") {
                    Some(Value::Object(items)) => items,
                    _ => ObjectNode::shell().attributes,
                };
                Container::Array {
                    attributes,
                    items: ObjectDraft {
                        attributes: items,
                        properties: Drafts::new(),
                    },
                }
            }
            Shape::Ref {
                reference,
                definition,
            } => self.ref_site(reference, definition, recorded.unwrap_or_default()),
        }
    }

    fn ref_site(
        &self,
        reference: &str,
        definition: &str,
        attributes: Map<String, Value>,
    ) -> Container {
        let body = match self.definitions.get(definition) {
            Some(Definition::Object(node)) => node.clone(),
            _ => ObjectNode::shell(),
        };
        Container::Ref {
            reference: reference.to_string(),
            definition: definition.to_string(),
            attributes,
            body: body.into(),
        }
    }

    fn replaced(&mut self, found: &str, flat_name: &str) {
        report(
            &mut self.diagnostics,
            flat_name,
            DiagnosticKind::ReplacedNode {
                found: found.to_string(),
            },
        );
    }
}

/// The body the first use of a definition settled on.
struct Claim {
    body: ObjectNode,
    flat_name: String,
}

struct Finisher<'a> {
    definitions: &'a DefinitionTable,
    claims: IndexMap<String, Claim>,
    diagnostics: Vec<Diagnostic>,
}

impl Finisher<'_> {
    fn properties(&mut self, level: Drafts, prefix: &FieldPath) -> Properties {
        level
            .into_iter()
            .map(|(name, draft)| {
                let node = self.node(&name, draft, prefix);
                (name, node)
            })
            .collect()
    }

    fn node(&mut self, name: &str, draft: Draft, prefix: &FieldPath) -> SchemaNode {
        let container = match draft {
            Draft::Node(node) => return node,
            Draft::Container(container) => container,
        };
        match container {
            Container::Object(object) => {
                SchemaNode::Object(self.object(object, &prefix.field(name)))
            }
            Container::Array { attributes, items } => SchemaNode::Array(ArrayNode {
                attributes,
                items: self.object(items, &prefix.array_element(name)),
            }),
            Container::Ref {
                reference,
                definition,
                attributes,
                body,
            } => {
                let path = prefix.definition(name, &reference);
                let body = self.object(body, &path);
                self.settle(definition, reference, attributes, body, &path)
            }
        }
    }

    fn object(&mut self, draft: ObjectDraft, path: &FieldPath) -> ObjectNode {
        ObjectNode {
            attributes: draft.attributes,
            properties: self.properties(draft.properties, path),
        }
    }

    /// Keep a `$ref` when its body matches what the definition settled on,
    /// otherwise inline the body.
    fn settle(
        &mut self,
        definition: String,
        reference: String,
        attributes: Map<String, Value>,
        body: ObjectNode,
        path: &FieldPath,
    ) -> SchemaNode {
        match self.claims.get(&definition) {
            None => {
                let claim = Claim {
                    body,
                    flat_name: path.flat_name(),
                };
                self.claims.insert(definition, claim);
            }
            Some(claim) if claim.body == body => {}
            Some(_) => {
                report(
                    &mut self.diagnostics,
                    path.flat_name(),
                    DiagnosticKind::InlinedRef { reference },
                );
                let mut inlined = body;
                if !inlined.attributes.contains_key("type") {
                    inlined
                        .attributes
                        .insert("type".to_string(), Value::String("object".to_string()));
                }
                inlined.attributes.extend(attributes);
                return SchemaNode::Object(inlined);
            }
        }
        SchemaNode::Ref(RefNode {
            reference,
            attributes,
        })
    }

    /// Write back the definitions whose settled body changed, keeping the
    /// key order of the original entries.
    fn write_definitions(&mut self, metadata: &mut Map<String, Value>) {
        let claims = std::mem::take(&mut self.claims);
        for (name, claim) in claims {
            match self.definitions.get(&name) {
                Some(Definition::Object(original)) if *original == claim.body => continue,
                Some(Definition::Opaque(_)) => report(
                    &mut self.diagnostics,
                    claim.flat_name.as_str(),
                    DiagnosticKind::ReplacedNode {
                        found: format!("definition {name}"),
                    },
                ),
                _ => {}
            }

            if !matches!(metadata.get("definitions"), Some(Value::Object(_))) {
                metadata.insert("definitions".to_string(), Value::Object(Map::new()));
            }
            if let Some(Value::Object(table)) = metadata.get_mut("definitions") {
                let updated = Value::from(claim.body);
                let merged = match table.get(&name) {
                    Some(original) => keep_key_order(original, updated),
                    None => updated,
                };
                table.insert(name, merged);
            }
        }
    }
}

/// `updated`, with keys it shares with `original` in `original`'s order and
/// new keys after them.
fn keep_key_order(original: &Value, updated: Value) -> Value {
    match (original, updated) {
        (Value::Object(original), Value::Object(updated)) => {
            let mut merged = Map::new();
            for (key, old) in original {
                if let Some(new) = updated.get(key) {
                    merged.insert(key.clone(), keep_key_order(old, new.clone()));
                }
            }
            for (key, new) in updated {
                if !merged.contains_key(&key) {
                    merged.insert(key, new);
                }
            }
            Value::Object(merged)
        }
        (_, updated) => updated,
    }
}

fn report(diagnostics: &mut Vec<Diagnostic>, path: impl Into<String>, kind: DiagnosticKind) {
    let diagnostic = Diagnostic::new(path, kind);
    diagnostic.log();
    diagnostics.push(diagnostic);
}
