use super::{BytecodeSource, RejectReason, Stage, Verdict, VerdictStatus};
use crate::{
    bytecode::{find_matching_contract, MatchResult},
    cache::{CacheError, LoadFailure, ResultCache},
    compiler::{
        normalize_extra_sources, CompilationKey, CompilationSettings, CompilationUnit,
        CompilerError, CompilerHost, SourceMap,
    },
    release_index::{CompilerBuild, ReleaseIndex},
    version::{extract_constraint, resolve_constraint, VersionConstraint},
};
use ethers_solc::CompilerOutput;
use serde::Deserialize;
use std::{str::FromStr, sync::Arc};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationRequest {
    /// Identifier of the deployed contract, passed to the bytecode source.
    pub contract: String,
    /// Source whose `pragma solidity` selects the compiler.
    pub main_file: String,
    pub sources: SourceMap,
    /// Dependency sources, e.g. installed packages.
    #[serde(default)]
    pub extra_sources: SourceMap,
    /// Overrides the pragma when set.
    #[serde(default)]
    pub compiler_version: Option<String>,
    #[serde(default)]
    pub settings: CompilationSettings,
}

struct CompileContext {
    build: CompilerBuild,
    unit: CompilationUnit,
    extra_sources: SourceMap,
}

type Compilations = ResultCache<CompilationKey, Arc<CompilerOutput>, CompilerError, CompileContext>;

/// Progress of a single verification attempt.
struct Attempt {
    stages: Vec<Stage>,
    compiler_version: Option<String>,
    compilation_key: Option<CompilationKey>,
}

impl Attempt {
    fn new() -> Self {
        Self {
            stages: vec![Stage::Idle],
            compiler_version: None,
            compilation_key: None,
        }
    }

    fn advance(&mut self, next: Stage) {
        let current = self.stages.last().copied().unwrap_or(Stage::Idle);
        tracing::debug!(from = %current, to = %next, "verification stage changed");
        self.stages.push(next);
    }

    fn finish(
        mut self,
        status: VerdictStatus,
        reject_reason: Option<RejectReason>,
        message: Option<String>,
        matched_contract: Option<MatchResult>,
        compilation_output: Option<Arc<CompilerOutput>>,
    ) -> Verdict {
        self.advance(Stage::Done);
        Verdict {
            status,
            reject_reason,
            message,
            compiler_version: self.compiler_version,
            compilation_key: self.compilation_key.map(|key| key.to_string()),
            matched_contract,
            compilation_output,
            stages: self.stages,
        }
    }

    fn accept(self, matched: MatchResult) -> Verdict {
        tracing::info!(
            source_file = %matched.source_file,
            contract_name = %matched.contract_name,
            comparison = ?matched.comparison,
            "verification accepted"
        );
        self.finish(VerdictStatus::Accepted, None, None, Some(matched), None)
    }

    fn reject(
        self,
        reason: RejectReason,
        message: impl Into<String>,
        compilation_output: Option<Arc<CompilerOutput>>,
    ) -> Verdict {
        let message = message.into();
        tracing::info!(reason = ?reason, message = %message, "verification rejected");
        self.finish(
            VerdictStatus::Rejected,
            Some(reason),
            Some(message),
            None,
            compilation_output,
        )
    }
}

/// Drives a request through version resolution, compilation and matching.
///
/// Compilations are shared through a single-flight cache keyed by the
/// compiler build and the exact compiler input. Failed compilations stay
/// cached until cleared with [`VerificationOrchestrator::clear_compilation`]
/// or [`VerificationOrchestrator::clear_compilations`].
pub struct VerificationOrchestrator {
    compilations: Compilations,
    bytecode_source: Arc<dyn BytecodeSource>,
}

impl VerificationOrchestrator {
    pub fn new(host: Arc<CompilerHost>, bytecode_source: Arc<dyn BytecodeSource>) -> Self {
        let compilations = ResultCache::new(
            "compilations",
            move |_key: CompilationKey, context: CompileContext| {
                let host = host.clone();
                async move {
                    host.run(&context.build, context.unit, &context.extra_sources)
                        .await
                }
            },
        );
        Self {
            compilations,
            bytecode_source,
        }
    }

    /// Never fails: every outcome is reported as a [`Verdict`].
    #[tracing::instrument(skip_all, fields(contract = %request.contract))]
    pub async fn verify(&self, request: VerificationRequest, index: &ReleaseIndex) -> Verdict {
        let mut attempt = Attempt::new();

        attempt.advance(Stage::ResolvingVersion);
        let constraint = match &request.compiler_version {
            Some(version) => match VersionConstraint::from_str(version) {
                Ok(constraint) => constraint,
                Err(err) => {
                    return attempt.reject(
                        RejectReason::VersionNotResolvable,
                        err.to_string(),
                        None,
                    )
                }
            },
            None => {
                let Some(main_source) = request.sources.get(&request.main_file) else {
                    return attempt.reject(
                        RejectReason::PragmaNotFound,
                        format!("main file {} is not among the sources", request.main_file),
                        None,
                    );
                };
                match extract_constraint(main_source) {
                    Some(constraint) => constraint,
                    None => {
                        return attempt.reject(
                            RejectReason::PragmaNotFound,
                            format!(
                                "{} has no valid `pragma solidity` directive",
                                request.main_file
                            ),
                            None,
                        )
                    }
                }
            }
        };
        let build = match resolve_constraint(&constraint, index)
            .and_then(|version| index.build(&version))
        {
            Some(build) => build.clone(),
            None => {
                return attempt.reject(
                    RejectReason::VersionNotResolvable,
                    format!("no compiler release satisfies \"{constraint}\""),
                    None,
                )
            }
        };
        attempt.compiler_version = Some(build.version.to_string());

        attempt.advance(Stage::Compiling);
        let unit = CompilationUnit::new(request.sources, &request.settings);
        let key = {
            let mut compiled_input = unit.clone();
            compiled_input.merge_sources(&normalize_extra_sources(&request.extra_sources));
            CompilationKey::new(&build.version, &compiled_input)
        };
        attempt.compilation_key = Some(key);
        let context = CompileContext {
            build,
            unit,
            extra_sources: request.extra_sources,
        };
        let output = match self.compilations.lookup(key, context).await {
            Ok(output) => output,
            Err(err) => {
                let (message, output) = describe_compilation_failure(&err);
                return attempt.reject(RejectReason::CompilationFailure, message, output);
            }
        };

        attempt.advance(Stage::Matching);
        let deployed = match self.bytecode_source.runtime_code(&request.contract).await {
            Ok(deployed) => deployed,
            Err(err) => {
                return attempt.reject(
                    RejectReason::TransportError,
                    format!("cannot read deployed bytecode: {err}"),
                    None,
                )
            }
        };
        match find_matching_contract(&deployed, &output) {
            Some(matched) => attempt.accept(matched),
            None => attempt.reject(
                RejectReason::BytecodeMismatch,
                "deployed bytecode does not match any compiled contract",
                Some(output),
            ),
        }
    }

    pub fn clear_compilation(&self, key: &CompilationKey) -> bool {
        self.compilations.clear_key(key)
    }

    pub fn clear_compilations(&self) {
        self.compilations.clear()
    }
}

fn describe_compilation_failure(
    err: &CacheError<CompilerError>,
) -> (String, Option<Arc<CompilerOutput>>) {
    let prefix = match err {
        CacheError::Load(_) => "",
        CacheError::EntryFailed(_) => "previous attempt failed: ",
    };
    match err.failure() {
        LoadFailure::Loader(compiler_error) => (
            format!("{prefix}{compiler_error}"),
            compiler_error.output().cloned(),
        ),
        LoadFailure::Aborted(message) => (format!("{prefix}compilation aborted: {message}"), None),
    }
}
