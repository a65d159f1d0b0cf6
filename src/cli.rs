use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the config file; `CONTRACT_VERIFICATION__CONFIG` is used if omitted.
    #[clap(short, long)]
    pub config_path: Option<PathBuf>,
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Verifies that the sources compile to the deployed bytecode.
    Verify(VerifyArgs),
    /// Prints the newest compiler release satisfying a constraint.
    Resolve {
        /// Constraint as written after `pragma solidity`.
        constraint: String,
    },
}

#[derive(clap::Args)]
pub struct VerifyArgs {
    /// Directory with the contract sources.
    #[clap(long)]
    pub sources: PathBuf,
    /// File inside `sources` whose pragma selects the compiler.
    #[clap(long)]
    pub main_file: String,
    /// Directory with dependency sources (e.g. `node_modules`).
    #[clap(long)]
    pub extra_sources: Option<PathBuf>,
    /// Contract address, read through the configured JSON-RPC node.
    #[clap(long, required_unless_present = "bytecode")]
    pub contract: Option<String>,
    /// Deployed runtime bytecode in hex, instead of reading it from a node.
    #[clap(long)]
    pub bytecode: Option<String>,
    #[clap(long)]
    pub compiler_version: Option<String>,
    #[clap(long)]
    pub optimize: bool,
    #[clap(long, default_value = "200")]
    pub optimize_runs: u32,
    #[clap(long)]
    pub evm_version: Option<String>,
}
