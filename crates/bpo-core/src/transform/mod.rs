pub mod detect;
pub mod diagnostics;
pub mod flatten;
pub mod path;
pub mod unflatten;

pub use detect::is_nested;
pub use diagnostics::{Diagnostic, DiagnosticKind};
pub use flatten::{DuplicatePolicy, FlattenOptions, Flattened, flatten, flatten_with_options};
pub use path::{FieldPath, PathIndex, PathSegment};
pub use unflatten::{Unflattened, unflatten};
