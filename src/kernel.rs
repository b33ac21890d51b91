//! The compiled-kernel contract (§6) and the top-level `register` entry
//! point that ties lexer → parser → frontend → a backend together.

use crate::diagnostic::Diagnostic;
use crate::span::Span;
use crate::{codegen, driver, frontend, lexer, parser};

/// The emitted callable contract: an arity-`N+3` callable over `N`
/// field buffers (ordered by `Ir.parameters`) plus the three axis bounds.
pub trait Kernel {
    fn call(
        &self,
        fields: &mut [&mut [f64]],
        bounds_i: [usize; 2],
        bounds_j: [usize; 2],
        bounds_k: [usize; 2],
    );

    /// The kernel's declared parameter names, in call order.
    fn parameters(&self) -> &[String];
}

/// The frontend error taxonomy (§7): a caller can match on which kind of
/// sub-language violation produced the diagnostics instead of parsing
/// message text.
#[derive(Debug)]
pub enum FrontendError {
    UnsupportedConstruct(Vec<Diagnostic>),
    MalformedExtent(Vec<Diagnostic>),
    UnknownField(Vec<Diagnostic>),
}

impl From<parser::ParseFailure> for FrontendError {
    fn from(err: parser::ParseFailure) -> Self {
        match err {
            parser::ParseFailure::UnsupportedConstruct(d) => FrontendError::UnsupportedConstruct(d),
            parser::ParseFailure::MalformedExtent(d) => FrontendError::MalformedExtent(d),
        }
    }
}

impl From<frontend::LowerError> for FrontendError {
    fn from(err: frontend::LowerError) -> Self {
        match err {
            frontend::LowerError::MalformedExtent(d) => FrontendError::MalformedExtent(d),
            frontend::LowerError::UnknownField(d) => FrontendError::UnknownField(d),
        }
    }
}

#[derive(Debug)]
pub enum GenError {
    InvalidIrNode(String),
}

#[derive(Debug)]
pub enum BuildError {
    Configure { message: String },
    Compile { message: String },
}

#[derive(Debug)]
pub enum LoadError {
    Symbol(String),
    Library(String),
}

/// Every stage failure in the pipeline, closed over so the CLI can render
/// whichever one occurred without matching on nested `Result`s.
#[derive(Debug)]
pub enum CompileError {
    Frontend(FrontendError),
    Gen(GenError),
    Build(BuildError),
    Load(LoadError),
}

impl CompileError {
    /// Best-effort conversion to a renderable `Diagnostic`. Stages below
    /// the frontend have no source span of their own, since they operate
    /// on the IR or on external processes; those get `Span::dummy()`.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            CompileError::Frontend(FrontendError::UnsupportedConstruct(diags))
            | CompileError::Frontend(FrontendError::MalformedExtent(diags))
            | CompileError::Frontend(FrontendError::UnknownField(diags)) => diags
                .first()
                .cloned()
                .unwrap_or_else(|| Diagnostic::error("frontend error".to_string(), Span::dummy())),
            CompileError::Gen(GenError::InvalidIrNode(msg)) => {
                Diagnostic::error(format!("invalid IR node: {msg}"), Span::dummy())
            }
            CompileError::Build(BuildError::Configure { message }) => {
                Diagnostic::error(format!("configure failed: {message}"), Span::dummy())
            }
            CompileError::Build(BuildError::Compile { message }) => {
                Diagnostic::error(format!("compile failed: {message}"), Span::dummy())
            }
            CompileError::Load(LoadError::Symbol(name)) => Diagnostic::error(
                format!("could not resolve exported symbol '{name}'"),
                Span::dummy(),
            ),
            CompileError::Load(LoadError::Library(path)) => {
                Diagnostic::error(format!("could not load shared library '{path}'"), Span::dummy())
            }
        }
    }
}

/// Backend selection for `register`/`build` (§6).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Backend {
    Interpreted,
    Native,
}

/// Runs the full pipeline — lex, parse, lower, generate — and returns a
/// boxed `Kernel` ready to `call`. This is the Rust replacement for the
/// host decorator contract described in §4.6: there is no decorator
/// syntax, so registration is this explicit function call instead.
pub fn register(source: &str, backend: Backend) -> Result<Box<dyn Kernel>, CompileError> {
    let kernel_def = parser::parse(source).map_err(|e| CompileError::Frontend(e.into()))?;
    let ir = frontend::lower(&kernel_def).map_err(|e| CompileError::Frontend(e.into()))?;

    match backend {
        Backend::Interpreted => Ok(Box::new(codegen::interpreted::compile(&ir))),
        Backend::Native => {
            let artifact = driver::build_native(&ir, source)?;
            Ok(Box::new(artifact))
        }
    }
}

/// Tokenizes `source` and reports lexer diagnostics without lowering it —
/// used by `stencildsl check` (§6) to validate a kernel with no codegen
/// and no external tools invoked.
pub fn check(source: &str) -> Result<(), Vec<Diagnostic>> {
    let (_, diags) = lexer::Lexer::new(source, 0).tokenize();
    if !diags.is_empty() {
        return Err(diags);
    }
    let kernel_def = parser::parse(source).map_err(parser::ParseFailure::into_diagnostics)?;
    frontend::lower(&kernel_def)
        .map(|_| ())
        .map_err(frontend::LowerError::into_diagnostics)
}
