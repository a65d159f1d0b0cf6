use super::split_metadata;
use ethers_solc::artifacts::{BytecodeObject, Contract};
use ethers_solc::CompilerOutput;
use serde::Serialize;
use std::ops::Range;

/// Length in hex characters of an unlinked library placeholder.
const LIBRARY_PLACEHOLDER_LENGTH: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Comparison {
    /// Code and metadata are identical.
    FullMatch,
    /// Code is identical, metadata differs or is present on one side only.
    PartialMatch,
    Mismatch,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    pub source_file: String,
    pub contract_name: String,
    pub comparison: Comparison,
}

/// Runtime bytecode of a compiled contract with the byte ranges whose
/// value is only known after deployment (immutables, linked libraries).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledCode {
    pub code: Vec<u8>,
    pub wildcards: Vec<Range<usize>>,
}

impl CompiledCode {
    pub fn from_contract(contract: &Contract) -> Option<Self> {
        let deployed_bytecode = contract.evm.as_ref()?.deployed_bytecode.as_ref()?;
        let bytecode = deployed_bytecode.bytecode.as_ref()?;
        let (code, mut wildcards) = match &bytecode.object {
            BytecodeObject::Bytecode(bytes) => (bytes.to_vec(), Vec::new()),
            BytecodeObject::Unlinked(unlinked) => nullify_library_placeholders(unlinked)?,
        };
        wildcards.extend(
            deployed_bytecode
                .immutable_references
                .values()
                .flatten()
                .map(|offsets| {
                    let start = offsets.start as usize;
                    start..start + offsets.length as usize
                }),
        );
        Some(Self { code, wildcards })
    }
}

/// Replaces `__$...$__` placeholders by zero bytes, returning the decoded
/// code and the replaced byte ranges.
fn nullify_library_placeholders(unlinked: &str) -> Option<(Vec<u8>, Vec<Range<usize>>)> {
    let unlinked = unlinked.trim_start_matches("0x");
    let mut nullified = String::with_capacity(unlinked.len());
    let mut wildcards = Vec::new();
    let mut rest = unlinked;
    while let Some(position) = rest.find("__") {
        let placeholder_end = position + LIBRARY_PLACEHOLDER_LENGTH;
        if placeholder_end > rest.len() || position % 2 != 0 {
            return None;
        }
        nullified.push_str(&rest[..position]);
        let start = nullified.len() / 2;
        wildcards.push(start..start + LIBRARY_PLACEHOLDER_LENGTH / 2);
        nullified.push_str(&"0".repeat(LIBRARY_PLACEHOLDER_LENGTH));
        rest = &rest[placeholder_end..];
    }
    nullified.push_str(rest);
    let code = hex::decode(nullified).ok()?;
    Some((code, wildcards))
}

/// Compares deployed runtime code with compiled code, ignoring wildcard
/// ranges of the compiled code.
pub fn compare(deployed: &[u8], compiled: &CompiledCode) -> Comparison {
    let (deployed_code, deployed_metadata) = split_metadata(deployed);
    let (compiled_code, compiled_metadata) = split_metadata(&compiled.code);

    if deployed_code.len() != compiled_code.len() {
        return Comparison::Mismatch;
    }
    let in_wildcard = |index: usize| compiled.wildcards.iter().any(|range| range.contains(&index));
    let code_matches = deployed_code
        .iter()
        .zip(compiled_code)
        .enumerate()
        .all(|(index, (deployed, compiled))| deployed == compiled || in_wildcard(index));
    if !code_matches {
        return Comparison::Mismatch;
    }

    if deployed_metadata == compiled_metadata {
        Comparison::FullMatch
    } else {
        Comparison::PartialMatch
    }
}

/// Finds the compiled contract the deployed code corresponds to.
///
/// Contracts are enumerated in source file order, then in contract name
/// order. A full match wins over partial ones; between equal matches the
/// first one enumerated is taken.
pub fn find_matching_contract(deployed: &[u8], output: &CompilerOutput) -> Option<MatchResult> {
    if deployed.is_empty() {
        return None;
    }

    let mut best: Option<MatchResult> = None;
    let mut ties = 0;
    for (source_file, contracts) in &output.contracts {
        for (contract_name, contract) in contracts {
            let compiled = match CompiledCode::from_contract(contract) {
                Some(compiled) if !compiled.code.is_empty() => compiled,
                _ => continue,
            };
            let comparison = compare(deployed, &compiled);
            let candidate = MatchResult {
                source_file: source_file.clone(),
                contract_name: contract_name.clone(),
                comparison,
            };
            match (&best, comparison) {
                (_, Comparison::Mismatch) => {}
                (None, _)
                | (
                    Some(MatchResult {
                        comparison: Comparison::PartialMatch,
                        ..
                    }),
                    Comparison::FullMatch,
                ) => {
                    best = Some(candidate);
                    ties = 0;
                }
                (Some(current), comparison) if current.comparison == comparison => ties += 1,
                _ => {}
            }
        }
    }

    if let Some(best) = &best {
        if ties > 0 {
            tracing::warn!(
                source_file = %best.source_file,
                contract_name = %best.contract_name,
                ties,
                "several contracts match the deployed code, taking the first one"
            );
        }
    }
    best
}
