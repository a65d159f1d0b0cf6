use super::CompilationUnit;
use crate::version::CompilerVersion;
use primitive_types::H256;
use sha2::{Digest, Sha256};
use std::fmt;

/// Identity of a compilation: compiler build plus the exact input it is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompilationKey(H256);

impl CompilationKey {
    pub fn new(version: &CompilerVersion, unit: &CompilationUnit) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(version.to_string().as_bytes());
        hasher.update([0u8]);
        // sources are kept in a BTreeMap, so serialization order is stable
        hasher.update(serde_json::to_vec(unit).unwrap_or_default());
        Self(H256::from_slice(&hasher.finalize()))
    }
}

impl fmt::Display for CompilationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0.as_bytes()))
    }
}
