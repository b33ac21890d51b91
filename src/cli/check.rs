use std::path::PathBuf;
use std::process;

use clap::Args;

use stencildsl::diagnostic::render_diagnostics;
use stencildsl::kernel;

#[derive(Args)]
pub struct CheckArgs {
    /// Input .stencil kernel file
    pub input: PathBuf,
}

/// Runs lexer/parser/frontend only — no codegen, no external tools
/// (§6 "no native toolchain required" path).
pub fn cmd_check(args: CheckArgs) {
    let source = match std::fs::read_to_string(&args.input) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("stencildsl: cannot read {}: {e}", args.input.display());
            process::exit(1);
        }
    };

    match kernel::check(&source) {
        Ok(()) => println!("stencildsl: {} is valid", args.input.display()),
        Err(diags) => {
            render_diagnostics(&diags, &args.input.display().to_string(), &source);
            process::exit(1);
        }
    }
}
