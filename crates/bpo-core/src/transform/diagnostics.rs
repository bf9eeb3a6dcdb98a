//! Degradations recorded while flattening or rebuilding a schema.
//!
//! The transforms never fail on odd structure; they fall back to treating the
//! node as an opaque leaf. Each fallback is reported here so callers can see
//! (and tests can assert) what was degraded.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A single degradation at a flat path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Flat path of the affected property.
    pub path: String,
    pub kind: DiagnosticKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// `$ref` target is missing from the definitions table.
    UnresolvedRef { reference: String },
    /// `$ref` does not have the `#/definitions/<name>` form.
    InvalidRef { reference: String },
    /// `$ref` leads back to a definition already being expanded.
    CircularRef { reference: String },
    /// `$ref` target exists but has no properties to expand.
    EmptyDefinition { reference: String },
    /// Object or array-of-objects with an empty `properties` mapping.
    EmptyContainer,
    /// A second schema location produced the same flat path.
    DuplicatePath,
    /// Property name contains path syntax (`.`, `[*]`, braces).
    AmbiguousName { name: String },
    /// Property value is not a mapping, so it cannot be a schema.
    NotASchema { found: String },
    /// Leaf could not be read as an optimizable field and was left out.
    DroppedField { reason: String },
    /// An existing node of the wrong shape was replaced while rebuilding.
    ReplacedNode { found: String },
    /// Fields under this `$ref` differ from another use of the same
    /// definition, so the expanded object was written in place of the `$ref`.
    InlinedRef { reference: String },
}

impl Diagnostic {
    pub fn new(path: impl Into<String>, kind: DiagnosticKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }

    /// Whether the degradation loses information (as opposed to keeping a
    /// node verbatim under a less useful shape).
    pub fn is_lossy(&self) -> bool {
        matches!(
            self.kind,
            DiagnosticKind::DuplicatePath
                | DiagnosticKind::DroppedField { .. }
                | DiagnosticKind::ReplacedNode { .. }
        )
    }

    /// Log at `warn` for lossy degradations and `debug` otherwise.
    pub(crate) fn log(&self) {
        if self.is_lossy() {
            log::warn!("{self}");
        } else {
            log::debug!("{self}");
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = &self.path;
        match &self.kind {
            DiagnosticKind::UnresolvedRef { reference } => {
                write!(f, "'{path}': unresolved reference {reference}, kept as leaf")
            }
            DiagnosticKind::InvalidRef { reference } => {
                write!(f, "'{path}': unsupported reference {reference}, kept as leaf")
            }
            DiagnosticKind::CircularRef { reference } => {
                write!(f, "'{path}': circular reference {reference}, kept as leaf")
            }
            DiagnosticKind::EmptyDefinition { reference } => {
                write!(f, "'{path}': {reference} has no properties, kept as leaf")
            }
            DiagnosticKind::EmptyContainer => {
                write!(f, "'{path}': container has no properties, kept as leaf")
            }
            DiagnosticKind::DuplicatePath => {
                write!(f, "'{path}': duplicate flat path, earlier field replaced")
            }
            DiagnosticKind::AmbiguousName { name } => {
                write!(f, "'{path}': property name '{name}' contains path syntax")
            }
            DiagnosticKind::NotASchema { found } => {
                write!(f, "'{path}': {found} value is not a schema, kept as leaf")
            }
            DiagnosticKind::DroppedField { reason } => {
                write!(f, "Skipping malformed field '{path}': {reason}")
            }
            DiagnosticKind::ReplacedNode { found } => {
                write!(f, "'{path}': replaced existing {found} node")
            }
            DiagnosticKind::InlinedRef { reference } => {
                write!(f, "'{path}': fields differ from other uses of {reference}, inlined")
            }
        }
    }
}
