mod matcher;
mod metadata;

pub use matcher::{compare, find_matching_contract, CompiledCode, Comparison, MatchResult};
pub use metadata::{split_metadata, ContentHash, MetadataError, MetadataHash};
