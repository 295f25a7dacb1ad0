//! Build configuration consumed by a backend's `init`.

use std::path::{Path, PathBuf};

/// Default zipper host a function connects to.
pub const DEFAULT_HOST: &str = "localhost";

/// Default zipper port a function connects to.
pub const DEFAULT_PORT: u16 = 9000;

/// Immutable configuration for one build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
    /// Path to the handler source.
    pub filename: PathBuf,

    /// Function name, also used as the Go module identity.
    pub name: String,

    /// Host of the runtime the function connects to.
    pub host: String,

    /// Port of the runtime the function connects to.
    pub port: u16,
}

impl BuildOptions {
    /// Options for `filename` with default host and port, named after the file stem.
    pub fn new(filename: impl Into<PathBuf>) -> Self {
        let filename = filename.into();
        let name = default_name(&filename);
        Self {
            filename,
            name,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }
}

fn default_name(filename: &Path) -> String {
    filename
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("app")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = BuildOptions::new("functions/echo.go");
        assert_eq!(opts.name, "echo");
        assert_eq!(opts.host, "localhost");
        assert_eq!(opts.port, 9000);
    }

    #[test]
    fn test_builders() {
        let opts = BuildOptions::new("h.go")
            .with_name("noise")
            .with_host("10.0.0.1")
            .with_port(9999);
        assert_eq!(opts.name, "noise");
        assert_eq!(opts.host, "10.0.0.1");
        assert_eq!(opts.port, 9999);
    }
}
