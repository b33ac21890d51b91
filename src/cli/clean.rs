use std::path::PathBuf;
use std::process;

use clap::Args;

use stencildsl::driver;

#[derive(Args)]
pub struct CleanArgs {
    /// Cache root to remove (defaults to $CODE_CACHE_ROOT or .codecache)
    #[arg(long)]
    pub cache_root: Option<PathBuf>,
}

/// Removes the cache directory (§6).
pub fn cmd_clean(args: CleanArgs) {
    let root = args.cache_root.unwrap_or_else(driver::cache_root);
    if let Err(e) = driver::clean(&root) {
        eprintln!("stencildsl: failed to remove {}: {e}", root.display());
        process::exit(1);
    }
    println!("stencildsl: removed {}", root.display());
}
