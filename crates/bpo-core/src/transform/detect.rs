use crate::parse::document::SchemaDocument;
use crate::parse::node::{Properties, SchemaNode};

/// Whether a document has any top-level property the flattener can decompose.
///
/// Only one level is inspected: a `$ref`, an object with `properties`, or an
/// array whose items are an object with `properties`. Bare arrays and
/// objects without `properties` do not count.
pub fn is_nested(document: &SchemaDocument) -> bool {
    has_nested_properties(&document.properties)
}

pub fn has_nested_properties(properties: &Properties) -> bool {
    properties.values().any(is_decomposable)
}

fn is_decomposable(node: &SchemaNode) -> bool {
    matches!(
        node,
        SchemaNode::Object(_) | SchemaNode::Array(_) | SchemaNode::Ref(_)
    )
}
