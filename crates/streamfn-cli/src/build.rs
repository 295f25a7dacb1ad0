//! Build command implementation.
//!
//! Compiles a handler into a standalone executable next to its source.

use std::time::Instant;

use streamfn_core::{BackendConfig, Registry};

use crate::colors;
use crate::FunctionArgs;

/// Result type for CLI operations.
pub type CliResult = anyhow::Result<()>;

/// Build a function.
pub fn execute(args: &FunctionArgs, clean: bool, config: &BackendConfig) -> CliResult {
    let start = Instant::now();
    let opts = args.options();
    let mut backend = Registry::global().backend_for(&opts.filename, config)?;

    colors::header("Building", opts.filename.display());

    let name = opts.name.clone();
    colors::step("Preparing workspace", || backend.init(opts))?;
    colors::step("Fetching dependencies and compiling", || backend.build(clean))?;

    println!();
    if let Some(artifact) = backend.artifact() {
        println!("{}Built:{} {}", colors::GREEN, colors::RESET, artifact.display());
    }
    println!("{}Function:{} {}", colors::DIM, colors::RESET, name);
    println!(
        "{}Time:{} {:.2}s",
        colors::DIM,
        colors::RESET,
        start.elapsed().as_secs_f64()
    );

    Ok(())
}
