pub mod blueprint;
pub mod field;

use serde::Serialize;
use serde_json::ser::PrettyFormatter;

pub use blueprint::{
    Blueprint, DEFAULT_SCHEMA_URI, FlatBlueprint, FlattenedBlueprint, UnflattenedBlueprint,
};
pub use field::FieldProperty;

/// Serialize with the four-space indentation blueprint files use.
pub fn to_json_pretty<T: Serialize + ?Sized>(value: &T) -> Result<String, serde_json::Error> {
    let mut buf = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    value.serialize(&mut serializer)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
