use std::path::PathBuf;
use std::process;

use clap::Args;

use crate::cli::build::{report_compile_error, BackendArg};
use stencildsl::kernel;

/// An inclusive-lower/exclusive-upper bound pair parsed from `lo:hi`.
fn parse_bounds(text: &str) -> Result<[usize; 2], String> {
    let (lo, hi) = text
        .split_once(':')
        .ok_or_else(|| format!("expected LO:HI, got '{text}'"))?;
    let lo: usize = lo.parse().map_err(|_| format!("invalid lower bound '{lo}'"))?;
    let hi: usize = hi.parse().map_err(|_| format!("invalid upper bound '{hi}'"))?;
    if lo > hi {
        return Err(format!("lower bound {lo} exceeds upper bound {hi}"));
    }
    Ok([lo, hi])
}

#[derive(Args)]
pub struct RunArgs {
    /// Input .stencil kernel file
    pub input: PathBuf,
    /// Which backend to run against
    #[arg(long, value_enum, default_value = "interpreted")]
    pub backend: BackendArg,
    /// `lo:hi` bound for the i axis
    #[arg(long, default_value = "0:5")]
    pub bounds_i: String,
    /// `lo:hi` bound for the j axis
    #[arg(long, default_value = "0:5")]
    pub bounds_j: String,
    /// `lo:hi` bound for the k axis
    #[arg(long, default_value = "0:5")]
    pub bounds_k: String,
    /// Fill this parameter's buffer with 1.0 instead of 0.0 (repeatable)
    #[arg(long = "ones")]
    pub ones: Vec<String>,
}

/// Builds (or reuses from cache) `args.input` and runs it once against
/// synthetic zero-/one-filled buffers (§6), printing a checksum of each
/// buffer so a kernel can be smoke-tested without a Rust host program.
pub fn cmd_run(args: RunArgs) {
    let source = match std::fs::read_to_string(&args.input) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("stencildsl: cannot read {}: {e}", args.input.display());
            process::exit(1);
        }
    };

    let bounds_i = parse_bounds(&args.bounds_i).unwrap_or_else(|e| fail(&e));
    let bounds_j = parse_bounds(&args.bounds_j).unwrap_or_else(|e| fail(&e));
    let bounds_k = parse_bounds(&args.bounds_k).unwrap_or_else(|e| fail(&e));

    let built = match kernel::register(&source, args.backend.into()) {
        Ok(k) => k,
        Err(err) => {
            report_compile_error(&err, &args.input, &source);
            process::exit(1);
        }
    };

    let len = bounds_i[1] * bounds_j[1] * bounds_k[1];
    let mut buffers: Vec<Vec<f64>> = built
        .parameters()
        .iter()
        .map(|name| {
            let fill = if args.ones.iter().any(|o| o == name) { 1.0 } else { 0.0 };
            vec![fill; len]
        })
        .collect();

    {
        let mut fields: Vec<&mut [f64]> = buffers.iter_mut().map(|b| b.as_mut_slice()).collect();
        built.call(&mut fields, bounds_i, bounds_j, bounds_k);
    }

    for (name, buffer) in built.parameters().iter().zip(&buffers) {
        let checksum: f64 = buffer.iter().sum();
        println!("stencildsl: {name} checksum = {checksum}");
    }
}

fn fail(message: &str) -> ! {
    eprintln!("stencildsl: {message}");
    process::exit(1);
}
