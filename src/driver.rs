//! Driver and content-addressed cache (§4.6).
//!
//! Cache location: `$CODE_CACHE_ROOT` or `.codecache` in the current
//! directory. Entries are keyed by a SHA-256 fingerprint of the kernel
//! source, truncated to 10 hex characters, and are append-only: once a
//! hash's artifact exists on disk it is never rewritten (mirrors the
//! append-only cache semantics in `package/cache.rs`).

use std::path::{Path, PathBuf};
use std::process::Command;

use sha2::{Digest, Sha256};

use crate::codegen::native;
use crate::ir::Ir;
use crate::kernel::{BuildError, CompileError, Kernel, LoadError};

/// The SHA-256 fingerprint of `source`, truncated to 10 hex characters
/// (§4.6 "Naming").
pub fn fingerprint(source: &str) -> String {
    let digest = Sha256::digest(source.as_bytes());
    let hex = format!("{digest:x}");
    hex[..10].to_string()
}

/// Resolves the cache root: `$CODE_CACHE_ROOT` if set, else `.codecache`
/// in the current directory.
pub fn cache_root() -> PathBuf {
    std::env::var("CODE_CACHE_ROOT")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(".codecache"))
}

/// Built once per fingerprint, regardless of how many times a kernel with
/// identical source text is registered (§4.6 cache invalidation: keyed
/// only on source, never on backend choice).
pub struct NativeArtifact {
    parameters: Vec<String>,
    symbol_name: String,
    _library: libloading::Library,
    function: unsafe extern "C" fn(),
}

impl NativeArtifact {
    /// Builds (or reuses from `cache_root`) the native artifact for `ir`,
    /// then loads it via `libloading`.
    pub fn build(ir: &Ir, source: &str, cache_root: &Path) -> Result<Self, CompileError> {
        let hash = fingerprint(source);
        let code_dir = cache_root.join(format!("cpp_{hash}"));
        let so_path = code_dir.join("build").join(SHARED_OBJECT_NAME);

        if !so_path.exists() {
            eprintln!("stencildsl: cache miss for {hash}, compiling native kernel '{}'", ir.name);
            build_artifact(ir, &code_dir)?;
        } else {
            eprintln!("stencildsl: cache hit for {hash}, reusing {}", so_path.display());
        }

        load_artifact(ir, &so_path)
    }
}

impl Kernel for NativeArtifact {
    fn call(
        &self,
        fields: &mut [&mut [f64]],
        bounds_i: [usize; 2],
        bounds_j: [usize; 2],
        bounds_k: [usize; 2],
    ) {
        // Field count and order are fixed by `Ir.parameters` at build
        // time, so the transmute below only ever reinterprets a function
        // pointer whose real arity matches `fields.len() + 6`.
        type NativeFn0 = unsafe extern "C" fn(usize, usize, usize, usize, usize, usize);
        type NativeFn1 = unsafe extern "C" fn(*mut f64, usize, usize, usize, usize, usize, usize);
        type NativeFn2 =
            unsafe extern "C" fn(*mut f64, *mut f64, usize, usize, usize, usize, usize, usize);
        type NativeFn3 = unsafe extern "C" fn(
            *mut f64,
            *mut f64,
            *mut f64,
            usize,
            usize,
            usize,
            usize,
            usize,
            usize,
        );

        let bounds = (
            bounds_i[0], bounds_i[1], bounds_j[0], bounds_j[1], bounds_k[0], bounds_k[1],
        );

        unsafe {
            match fields {
                [] => {
                    let f: NativeFn0 = std::mem::transmute(self.function);
                    f(bounds.0, bounds.1, bounds.2, bounds.3, bounds.4, bounds.5);
                }
                [a] => {
                    let f: NativeFn1 = std::mem::transmute(self.function);
                    f(a.as_mut_ptr(), bounds.0, bounds.1, bounds.2, bounds.3, bounds.4, bounds.5);
                }
                [a, b] => {
                    let f: NativeFn2 = std::mem::transmute(self.function);
                    f(
                        a.as_mut_ptr(),
                        b.as_mut_ptr(),
                        bounds.0,
                        bounds.1,
                        bounds.2,
                        bounds.3,
                        bounds.4,
                        bounds.5,
                    );
                }
                [a, b, c] => {
                    let f: NativeFn3 = std::mem::transmute(self.function);
                    f(
                        a.as_mut_ptr(),
                        b.as_mut_ptr(),
                        c.as_mut_ptr(),
                        bounds.0,
                        bounds.1,
                        bounds.2,
                        bounds.3,
                        bounds.4,
                        bounds.5,
                    );
                }
                _ => panic!(
                    "native kernel '{}' expects {} fields; arities above 3 are not wired up",
                    self.symbol_name,
                    self.parameters.len()
                ),
            }
        }
    }

    fn parameters(&self) -> &[String] {
        &self.parameters
    }
}

/// File names fixed by the persisted-state layout (§6) — the cmake target
/// is always named `dslgen`, independent of the kernel's own name, since
/// the kernel symbol inside the shared object (resolved by `ir.name` at
/// load time) is what actually varies per kernel.
const GENERATED_SOURCE_NAME: &str = "dslgen.cpp";
const SHARED_OBJECT_NAME: &str = "dslgen.so";
const CLANG_FORMAT_TEMPLATE: &str = include_str!("../templates/.clang-format");

fn build_artifact(ir: &Ir, code_dir: &Path) -> Result<(), CompileError> {
    std::fs::create_dir_all(code_dir).map_err(|e| {
        CompileError::Build(BuildError::Configure {
            message: format!("could not create code directory: {e}"),
        })
    })?;

    let source_path = code_dir.join(GENERATED_SOURCE_NAME);
    let source = native::generate(ir);
    std::fs::write(&source_path, &source).map_err(|e| {
        CompileError::Build(BuildError::Configure {
            message: format!("could not write generated source: {e}"),
        })
    })?;

    write_clang_format(code_dir)?;
    format_source(&source_path, code_dir);
    write_cmake_lists(code_dir, &source_path);
    compile_cpp(code_dir)
}

/// Copies the `.clang-format` template into the kernel's code directory
/// (§4.5 step 1, §6 persisted-state layout) so the in-place format below
/// has a config to read instead of falling back to clang-format's
/// built-in defaults.
fn write_clang_format(code_dir: &Path) -> Result<(), CompileError> {
    std::fs::write(code_dir.join(".clang-format"), CLANG_FORMAT_TEMPLATE).map_err(|e| {
        CompileError::Build(BuildError::Configure {
            message: format!("could not write .clang-format: {e}"),
        })
    })
}

/// Formatting is cosmetic only; a missing `clang-format` is non-fatal,
/// matching the five-step pipeline's tolerance for it (§4.5).
fn format_source(source_path: &Path, code_dir: &Path) {
    let installed = Command::new("clang-format")
        .arg("--version")
        .current_dir(code_dir)
        .output()
        .is_ok();
    if installed {
        let _ = Command::new("clang-format")
            .arg("-i")
            .arg(source_path)
            .current_dir(code_dir)
            .status();
    }
}

fn write_cmake_lists(code_dir: &Path, source_path: &Path) {
    let contents = format!(
        "cmake_minimum_required(VERSION 3.10)\n\
         project(dslgen)\n\
         add_library(dslgen SHARED {source})\n\
         set_target_properties(dslgen PROPERTIES PREFIX \"\" OUTPUT_NAME \"dslgen\")\n",
        source = source_path.file_name().unwrap().to_string_lossy(),
    );
    let _ = std::fs::write(code_dir.join("CMakeLists.txt"), contents);
}

fn compile_cpp(code_dir: &Path) -> Result<(), CompileError> {
    let build_dir = code_dir.join("build");
    std::fs::create_dir_all(&build_dir).map_err(|e| {
        CompileError::Build(BuildError::Configure {
            message: format!("could not create build directory: {e}"),
        })
    })?;

    let configure = Command::new("cmake")
        .arg(code_dir)
        .arg("-DCMAKE_BUILD_TYPE=Release")
        .current_dir(&build_dir)
        .status()
        .map_err(|e| {
            CompileError::Build(BuildError::Configure {
                message: format!("failed to invoke cmake: {e}"),
            })
        })?;
    if !configure.success() {
        return Err(CompileError::Build(BuildError::Configure {
            message: format!("cmake exited with {configure}"),
        }));
    }

    let build = Command::new("make")
        .current_dir(&build_dir)
        .status()
        .map_err(|e| {
            CompileError::Build(BuildError::Compile {
                message: format!("failed to invoke make: {e}"),
            })
        })?;
    if !build.success() {
        return Err(CompileError::Build(BuildError::Compile {
            message: format!("make exited with {build}"),
        }));
    }

    Ok(())
}

fn load_artifact(ir: &Ir, so_path: &Path) -> Result<NativeArtifact, CompileError> {
    let library = unsafe { libloading::Library::new(so_path) }.map_err(|e| {
        CompileError::Load(LoadError::Library(format!("{}: {e}", so_path.display())))
    })?;

    let function = unsafe {
        let symbol: libloading::Symbol<unsafe extern "C" fn()> = library
            .get(ir.name.as_bytes())
            .map_err(|_| CompileError::Load(LoadError::Symbol(ir.name.clone())))?;
        *symbol
    };

    Ok(NativeArtifact {
        parameters: ir.parameters.clone(),
        symbol_name: ir.name.clone(),
        _library: library,
        function,
    })
}

/// Builds a native kernel for `ir`/`source` under the resolved cache root
/// (§4.6). This is the entry point `kernel::register` calls for
/// `Backend::Native`.
pub fn build_native(ir: &Ir, source: &str) -> Result<NativeArtifact, CompileError> {
    NativeArtifact::build(ir, source, &cache_root())
}

/// Removes the cache directory entirely (`stencildsl clean`, §6).
pub fn clean(cache_root: &Path) -> std::io::Result<()> {
    if cache_root.exists() {
        std::fs::remove_dir_all(cache_root)?;
    }
    Ok(())
}
