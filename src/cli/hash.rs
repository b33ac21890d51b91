use std::path::PathBuf;
use std::process;

use clap::Args;

use stencildsl::driver;

#[derive(Args)]
pub struct HashArgs {
    /// Input .stencil kernel file
    pub input: PathBuf,
}

/// Prints the cache fingerprint for a kernel's source text (§6).
pub fn cmd_hash(args: HashArgs) {
    let source = match std::fs::read_to_string(&args.input) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("stencildsl: cannot read {}: {e}", args.input.display());
            process::exit(1);
        }
    };
    println!("{}", driver::fingerprint(&source));
}
