use std::path::{Path, PathBuf};
use std::process;

use clap::{Args, ValueEnum};

use stencildsl::diagnostic::render_diagnostics;
use stencildsl::kernel::{self, Backend, CompileError};

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum BackendArg {
    Interpreted,
    Native,
}

impl From<BackendArg> for Backend {
    fn from(arg: BackendArg) -> Backend {
        match arg {
            BackendArg::Interpreted => Backend::Interpreted,
            BackendArg::Native => Backend::Native,
        }
    }
}

#[derive(Args)]
pub struct BuildArgs {
    /// Input .stencil kernel file
    pub input: PathBuf,
    /// Which backend to compile against
    #[arg(long, value_enum, default_value = "interpreted")]
    pub backend: BackendArg,
    /// Directory to report the artifact path under (native backend only;
    /// defaults to the resolved cache root)
    #[arg(long)]
    pub out: Option<PathBuf>,
}

pub fn cmd_build(args: BuildArgs) {
    let source = match std::fs::read_to_string(&args.input) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("stencildsl: cannot read {}: {e}", args.input.display());
            process::exit(1);
        }
    };

    match kernel::register(&source, args.backend.into()) {
        Ok(built) => {
            println!(
                "stencildsl: built kernel with {} parameter(s)",
                built.parameters().len()
            );
            if let Some(out) = args.out {
                println!("stencildsl: artifact directory: {}", out.display());
            }
        }
        Err(err) => {
            report_compile_error(&err, &args.input, &source);
            process::exit(1);
        }
    }
}

pub fn report_compile_error(err: &CompileError, path: &Path, source: &str) {
    match err {
        CompileError::Frontend(kernel::FrontendError::UnsupportedConstruct(diags))
        | CompileError::Frontend(kernel::FrontendError::MalformedExtent(diags))
        | CompileError::Frontend(kernel::FrontendError::UnknownField(diags)) => {
            render_diagnostics(diags, &path.display().to_string(), source);
        }
        other => {
            other.to_diagnostic().render(&path.display().to_string(), source);
        }
    }
}
