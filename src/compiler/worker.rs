use super::{CompilationUnit, CompilerFetcher};
use crate::release_index::CompilerBuild;
use async_trait::async_trait;
use ethers_solc::CompilerOutput;
use std::{path::PathBuf, process::Stdio, sync::Arc};
use thiserror::Error;
use tokio::{io::AsyncWriteExt, process::Command};

#[derive(Debug, Clone)]
pub struct CompileJob {
    pub build: CompilerBuild,
    pub input: CompilationUnit,
}

/// The single message an execution context replies with.
#[derive(Debug, Clone)]
pub enum WorkerReply {
    Output(CompilerOutput),
    /// Opaque failure reported by the compiler instead of an output.
    Failure(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkerError {
    #[error("compiler terminated abnormally: {0}")]
    Crashed(String),
    #[error("{0}")]
    Transport(String),
}

/// Isolated execution context running one compilation at a time.
#[async_trait]
pub trait CompilerWorker: Send + Sync {
    /// Makes `build` available for [`CompilerWorker::execute`].
    ///
    /// Not bounded by the compilation timeout.
    async fn prepare(&self, _build: &CompilerBuild) -> Result<(), WorkerError> {
        Ok(())
    }

    async fn execute(&self, job: CompileJob) -> Result<WorkerReply, WorkerError>;
}

/// Runs the compiler build as a child process in `--standard-json` mode.
///
/// The child is killed when the returned future is dropped.
pub struct SolcProcessWorker {
    fetcher: Arc<CompilerFetcher>,
}

impl SolcProcessWorker {
    pub fn new(fetcher: Arc<CompilerFetcher>) -> Self {
        Self { fetcher }
    }
}

impl SolcProcessWorker {
    async fn executable(&self, build: &CompilerBuild) -> Result<PathBuf, WorkerError> {
        self.fetcher
            .fetch(build)
            .await
            .map_err(|err| WorkerError::Transport(format!("compiler is unavailable: {err}")))
    }
}

#[async_trait]
impl CompilerWorker for SolcProcessWorker {
    async fn prepare(&self, build: &CompilerBuild) -> Result<(), WorkerError> {
        self.executable(build).await.map(|_| ())
    }

    async fn execute(&self, job: CompileJob) -> Result<WorkerReply, WorkerError> {
        // already downloaded by `prepare`, this only looks the path up
        let solc = self.executable(&job.build).await?;
        let input = serde_json::to_vec(&job.input)
            .map_err(|err| WorkerError::Transport(format!("cannot encode input: {err}")))?;

        let mut child = Command::new(&solc)
            .arg("--standard-json")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| {
                WorkerError::Transport(format!("cannot start {}: {err}", solc.display()))
            })?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| WorkerError::Transport("compiler stdin is not piped".into()))?;
        let write_input = async move {
            let mut stdin = stdin;
            stdin.write_all(&input).await
            // stdin is closed on drop, signalling the end of input
        };

        let (written, output) = futures::join!(write_input, child.wait_with_output());
        let output = output
            .map_err(|err| WorkerError::Transport(format!("compiler did not reply: {err}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return match output.status.code() {
                Some(_) if !stderr.is_empty() => Ok(WorkerReply::Failure(stderr)),
                Some(code) => Err(WorkerError::Crashed(format!("exit code {code}"))),
                None => Err(WorkerError::Crashed(format!(
                    "terminated by signal ({}) {stderr}",
                    output.status
                ))),
            };
        }
        written.map_err(|err| WorkerError::Transport(format!("cannot send input: {err}")))?;

        serde_json::from_slice(&output.stdout)
            .map(WorkerReply::Output)
            .map_err(|err| WorkerError::Transport(format!("malformed compiler output: {err}")))
    }
}
