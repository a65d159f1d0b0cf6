mod fetcher;
mod fingerprint;
mod host;
mod sources;
mod worker;

pub use fetcher::{validate_checksum, write_executable, CompilerFetcher, FetchError};
pub use fingerprint::CompilationKey;
pub use host::{error_messages, CompilerError, CompilerHost};
pub use sources::{
    normalize_extra_sources, CompilationSettings, CompilationUnit, Source, SourceMap,
};
pub use worker::{CompileJob, CompilerWorker, SolcProcessWorker, WorkerError, WorkerReply};
