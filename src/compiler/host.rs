use super::{
    normalize_extra_sources, CompilationUnit, CompileJob, CompilerWorker, SourceMap, WorkerError,
    WorkerReply,
};
use crate::release_index::CompilerBuild;
use ethers_solc::{artifacts::Severity, CompilerOutput};
use std::{num::NonZeroUsize, sync::Arc, time::Duration};
use thiserror::Error;
use tokio::sync::Semaphore;

#[derive(Debug, Clone, Error)]
pub enum CompilerError {
    #[error("import \"{import}\" of {importer} cannot be resolved")]
    UnresolvedImport { importer: String, import: String },
    #[error("compiler crashed: {0}")]
    CompilerCrashed(String),
    #[error("compilation errors: {}", error_messages(.0).join("; "))]
    CompilerReportedErrors(Arc<CompilerOutput>),
    #[error("compiler transport error: {0}")]
    TransportError(String),
}

impl CompilerError {
    pub fn output(&self) -> Option<&Arc<CompilerOutput>> {
        match self {
            CompilerError::CompilerReportedErrors(output) => Some(output),
            _ => None,
        }
    }
}

/// Messages of every error-severity entry of `output`.
pub fn error_messages(output: &CompilerOutput) -> Vec<String> {
    output
        .errors
        .iter()
        .filter(|err| err.severity == Severity::Error)
        .map(|err| err.formatted_message.as_ref().unwrap_or(&err.message).clone())
        .collect()
}

/// Runs compilations in isolated execution contexts.
pub struct CompilerHost {
    worker: Arc<dyn CompilerWorker>,
    timeout: Duration,
    permits: Semaphore,
}

impl CompilerHost {
    pub fn new(worker: Arc<dyn CompilerWorker>, timeout: Duration, max_threads: NonZeroUsize) -> Self {
        Self {
            worker,
            timeout,
            permits: Semaphore::new(max_threads.get()),
        }
    }

    /// Compiles `unit` together with `extra_sources` using `build`.
    ///
    /// Extra sources are registered under their path and file name and never
    /// replace sources of the unit. Once the build is prepared, the execution
    /// context gets `timeout` to reply and is terminated otherwise.
    #[tracing::instrument(skip_all, fields(version = %build.version))]
    pub async fn run(
        &self,
        build: &CompilerBuild,
        mut unit: CompilationUnit,
        extra_sources: &SourceMap,
    ) -> Result<Arc<CompilerOutput>, CompilerError> {
        unit.merge_sources(&normalize_extra_sources(extra_sources));
        if let Some((importer, import)) = unit.find_unresolved_import() {
            return Err(CompilerError::UnresolvedImport { importer, import });
        }

        // the download of the build is not part of the bounded wait
        self.worker.prepare(build).await.map_err(|err| match err {
            WorkerError::Crashed(message) | WorkerError::Transport(message) => {
                CompilerError::TransportError(message)
            }
        })?;

        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|err| CompilerError::TransportError(err.to_string()))?;

        let job = CompileJob {
            build: build.clone(),
            input: unit,
        };
        let start = std::time::Instant::now();
        // dropping the execution future on timeout terminates the context
        let reply = match tokio::time::timeout(self.timeout, self.worker.execute(job)).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(WorkerError::Crashed(message))) => {
                return Err(CompilerError::CompilerCrashed(message))
            }
            Ok(Err(WorkerError::Transport(message))) => {
                return Err(CompilerError::TransportError(message))
            }
            Err(_) => {
                tracing::warn!(timeout = ?self.timeout, "compiler did not reply in time, terminated");
                return Err(CompilerError::TransportError(format!(
                    "compiler did not reply within {:?}",
                    self.timeout
                )));
            }
        };
        tracing::debug!(took = ?start.elapsed(), "compiler replied");

        match reply {
            WorkerReply::Output(output) => {
                if error_messages(&output).is_empty() {
                    Ok(Arc::new(output))
                } else {
                    Err(CompilerError::CompilerReportedErrors(Arc::new(output)))
                }
            }
            WorkerReply::Failure(message) => Err(CompilerError::CompilerCrashed(message)),
        }
    }
}
