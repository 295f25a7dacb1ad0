//! Terminal colors and step progress output.

use std::fmt::Display;
use std::io::{self, Write};

pub const RESET: &str = "\x1b[0m";
pub const BOLD: &str = "\x1b[1m";
pub const DIM: &str = "\x1b[2m";
pub const GREEN: &str = "\x1b[32m";
pub const BLUE: &str = "\x1b[34m";
pub const CYAN: &str = "\x1b[36m";
pub const RED: &str = "\x1b[31m";

/// Flush stdout so a progress line without newline shows up immediately.
#[inline]
pub fn flush_stdout() {
    io::stdout().flush().ok();
}

/// Print `label`, run `f`, then mark the line with ✓ or ✗.
pub fn step<T, E>(label: &str, f: impl FnOnce() -> Result<T, E>) -> Result<T, E> {
    print!("{BLUE}  ◆ {label}{RESET} ... ");
    flush_stdout();

    let result = f();
    match &result {
        Ok(_) => println!("{GREEN}✓{RESET}"),
        Err(_) => println!("{RED}✗{RESET}"),
    }
    result
}

/// Print the command banner.
pub fn header(action: &str, file: impl Display) {
    println!("\n{BOLD}streamfn{RESET} - {action} {CYAN}{file}{RESET}\n");
}
