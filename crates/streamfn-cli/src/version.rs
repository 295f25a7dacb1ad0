//! Version command implementation.

use std::fs;

use streamfn_core::gomod;

use crate::build::CliResult;

/// CLI version, with build date when provided at compile time.
pub fn cli_version() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("STREAMFN_BUILD_DATE") {
        Some(date) => format!("{version}({date})"),
        None => version.to_string(),
    }
}

/// Runtime version required by `go.mod` in the current directory.
pub fn runtime_version() -> String {
    fs::read_to_string("go.mod")
        .map(|content| gomod::runtime_version(&content))
        .unwrap_or_else(|_| "(none)".to_string())
}

/// Print CLI and runtime versions.
pub fn execute() -> CliResult {
    println!("streamfn CLI Version: {}", cli_version());
    println!("Runtime Version: {}", runtime_version());
    Ok(())
}
