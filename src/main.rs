mod cli;

use clap::{Parser, Subcommand};

use cli::build::BuildArgs;
use cli::check::CheckArgs;
use cli::clean::CleanArgs;
use cli::hash::HashArgs;
use cli::run::RunArgs;

#[derive(Parser)]
#[command(
    name = "stencildsl",
    version,
    about = "Stencil DSL compiler — lex, parse, and lower 3-D stencil kernels to interpreted or native code"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile a .stencil kernel to an interpreted or native artifact
    Build(BuildArgs),
    /// Run lexer/parser/frontend only, no codegen, no external tools
    Check(CheckArgs),
    /// Print the cache fingerprint for a kernel's source text
    Hash(HashArgs),
    /// Build (or reuse from cache) and execute a kernel once, printing a checksum
    Run(RunArgs),
    /// Remove the artifact cache directory
    Clean(CleanArgs),
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Command::Build(args) => cli::build::cmd_build(args),
        Command::Check(args) => cli::check::cmd_check(args),
        Command::Hash(args) => cli::hash::cmd_hash(args),
        Command::Run(args) => cli::run::cmd_run(args),
        Command::Clean(args) => cli::clean::cmd_clean(args),
    }
}
