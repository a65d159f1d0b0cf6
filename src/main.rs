mod cli;

use anyhow::{anyhow, Context};
use clap::Parser;
use cli::{Args, Command, VerifyArgs};
use contract_verification::{
    compiler::{CompilationSettings, CompilerFetcher, CompilerHost, SolcProcessWorker, SourceMap},
    init_logs,
    release_index::ReleaseIndexClient,
    verifier::{
        parse_bytecode, BytecodeSource, JsonRpcBytecodeSource, StaticBytecodeSource,
        VerificationOrchestrator, VerificationRequest,
    },
    version::resolve_version,
    Settings,
};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

const STATIC_CONTRACT: &str = "static";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let settings = Settings::new(args.config_path).context("failed to parse config")?;
    init_logs(&settings.tracing)?;

    let index_client = ReleaseIndexClient::new(
        settings.release_index.list_url.clone(),
        settings.release_index.freshness_window(),
    );
    let index = index_client
        .index()
        .await
        .map_err(|err| anyhow!("cannot fetch release index: {err}"))?;

    match args.command {
        Command::Resolve { constraint } => {
            match resolve_version(&constraint, &index).and_then(|version| index.build(&version)) {
                Some(build) => println!("{}", build.version),
                None => return Err(anyhow!("no compiler release satisfies \"{constraint}\"")),
            }
        }
        Command::Verify(verify_args) => {
            let fetcher = Arc::new(CompilerFetcher::new(settings.compilers.dir.clone()));
            let host = Arc::new(CompilerHost::new(
                Arc::new(SolcProcessWorker::new(fetcher)),
                settings.compilers.timeout(),
                settings.compilers.max_threads,
            ));
            let (contract, bytecode_source) = bytecode_source(&verify_args, &settings)?;
            let orchestrator = VerificationOrchestrator::new(host, bytecode_source);

            let request = VerificationRequest {
                contract,
                main_file: verify_args.main_file,
                sources: read_sources(&verify_args.sources)?,
                extra_sources: match &verify_args.extra_sources {
                    Some(dir) => read_sources(dir)?,
                    None => SourceMap::new(),
                },
                compiler_version: verify_args.compiler_version,
                settings: CompilationSettings {
                    optimizer_enabled: verify_args.optimize,
                    optimizer_runs: verify_args.optimize_runs,
                    evm_version: verify_args.evm_version,
                    ..Default::default()
                },
            };
            let verdict = orchestrator.verify(request, &index).await;
            println!("{}", serde_json::to_string_pretty(&verdict)?);
            if !verdict.is_accepted() {
                std::process::exit(1);
            }
        }
    }
    Ok(())
}

fn bytecode_source(
    args: &VerifyArgs,
    settings: &Settings,
) -> anyhow::Result<(String, Arc<dyn BytecodeSource>)> {
    if let Some(bytecode) = &args.bytecode {
        let code = parse_bytecode(bytecode)?;
        let source = StaticBytecodeSource::new([(STATIC_CONTRACT.to_string(), code)]);
        return Ok((STATIC_CONTRACT.to_string(), Arc::new(source)));
    }
    let contract = args
        .contract
        .clone()
        .ok_or_else(|| anyhow!("either --contract or --bytecode is required"))?;
    let rpc_url = settings
        .bytecode_source
        .rpc_url
        .clone()
        .ok_or_else(|| anyhow!("bytecode_source.rpc_url is not configured"))?;
    Ok((contract, Arc::new(JsonRpcBytecodeSource::new(rpc_url))))
}

/// Reads every `.sol` file under `root`, keyed by its path relative to `root`.
fn read_sources(root: &Path) -> anyhow::Result<SourceMap> {
    let mut sources = SourceMap::new();
    let mut pending: Vec<PathBuf> = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in std::fs::read_dir(&dir).with_context(|| format!("cannot read {}", dir.display()))? {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
            } else if path.extension().map_or(false, |ext| ext == "sol") {
                let relative = path.strip_prefix(root)?;
                let key = relative
                    .components()
                    .map(|component| component.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                let content = std::fs::read_to_string(&path)
                    .with_context(|| format!("cannot read {}", path.display()))?;
                sources.insert(key, content);
            }
        }
    }
    Ok(sources)
}
