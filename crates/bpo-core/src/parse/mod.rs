pub mod document;
pub mod node;
pub mod ref_resolve;

use std::fs;
use std::path::Path;

use serde_json::Value;

use crate::error::ParseError;
use document::SchemaDocument;

/// Parse a schema document from JSON text.
pub fn from_json(input: &str) -> Result<SchemaDocument, ParseError> {
    let value: Value = serde_json::from_str(input)?;
    from_value(value)
}

/// Build a schema document from an already parsed JSON value.
pub fn from_value(value: Value) -> Result<SchemaDocument, ParseError> {
    SchemaDocument::try_from(value)
}

/// Read and parse a schema document from a file.
pub fn from_file(path: &Path) -> Result<SchemaDocument, ParseError> {
    let content = fs::read_to_string(path).map_err(|source| ParseError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    from_json(&content)
}
