mod bytecode_source;
mod orchestrator;
mod verdict;

pub use bytecode_source::{
    parse_bytecode, BytecodeSource, BytecodeSourceError, JsonRpcBytecodeSource,
    StaticBytecodeSource,
};
pub use orchestrator::{VerificationOrchestrator, VerificationRequest};
pub use verdict::{RejectReason, Stage, Verdict, VerdictStatus};
