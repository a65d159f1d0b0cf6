mod compiler_version;
mod constraint;
mod resolver;
mod source_text;

pub use compiler_version::CompilerVersion;
pub use constraint::{MalformedConstraint, VersionConstraint};
pub use resolver::{resolve_constraint, resolve_version};
pub use source_text::{extract_constraint, extract_import_paths, strip_comments};
