use crate::bytecode::MatchResult;
use ethers_solc::CompilerOutput;
use serde::Serialize;
use std::{fmt, sync::Arc};

/// Steps of a verification attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Stage {
    Idle,
    ResolvingVersion,
    Compiling,
    Matching,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum VerdictStatus {
    Accepted,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RejectReason {
    PragmaNotFound,
    VersionNotResolvable,
    CompilationFailure,
    BytecodeMismatch,
    TransportError,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    pub status: VerdictStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reject_reason: Option<RejectReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compiler_version: Option<String>,
    /// Fingerprint of the compilation, to clear it before a retry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compilation_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_contract: Option<MatchResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compilation_output: Option<Arc<CompilerOutput>>,
    /// Stages the attempt went through.
    #[serde(skip)]
    pub stages: Vec<Stage>,
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        self.status == VerdictStatus::Accepted
    }
}
