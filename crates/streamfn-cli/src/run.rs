//! Run command implementation.
//!
//! Builds a function with a clean workspace and runs it in the foreground.

use streamfn_core::{BackendConfig, Registry};

use crate::build::CliResult;
use crate::colors;
use crate::FunctionArgs;

/// Build and run a function.
pub fn execute(args: &FunctionArgs, config: &BackendConfig) -> CliResult {
    let opts = args.options();
    let mut backend = Registry::global().backend_for(&opts.filename, config)?;

    colors::header("Running", opts.filename.display());

    let endpoint = format!("{}:{}", opts.host, opts.port);
    colors::step("Preparing workspace", || backend.init(opts))?;
    colors::step("Fetching dependencies and compiling", || backend.build(true))?;

    println!(
        "\n{}Connecting to zipper at{} {}\n",
        colors::DIM,
        colors::RESET,
        endpoint
    );
    backend.run()?;

    Ok(())
}
