pub mod config;
pub mod error;
pub mod model;
pub mod parse;
pub mod transform;

pub use model::{Blueprint, FieldProperty, FlatBlueprint, FlattenedBlueprint, UnflattenedBlueprint};
pub use parse::document::SchemaDocument;
pub use parse::node::SchemaNode;
pub use transform::{FlattenOptions, PathIndex};
