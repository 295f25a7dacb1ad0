//! Backend contract and the extension registry.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::error::{Error, Result};
use crate::options::BuildOptions;

/// A pipeline that builds and runs handler sources of one language.
///
/// Calls must follow `init -> build -> run` on a single instance; a failed
/// call leaves the instance unusable.
pub trait Backend {
    /// Prepare the workspace for `opts`.
    fn init(&mut self, opts: BuildOptions) -> Result<()>;

    /// Fetch dependencies and compile. `clean` removes the workspace afterwards.
    fn build(&mut self, clean: bool) -> Result<()>;

    /// Run the compiled artifact in the foreground.
    fn run(&mut self) -> Result<()>;

    /// Path of the compiled artifact, once known.
    fn artifact(&self) -> Option<&Path> {
        None
    }
}

/// Settings shared by all backends.
#[derive(Debug, Clone, Default)]
pub struct BackendConfig {
    /// Explicit Go executable; PATH lookup otherwise.
    pub go: Option<PathBuf>,
}

/// Creates a fresh backend instance.
pub type BackendFactory = fn(&BackendConfig) -> Box<dyn Backend>;

/// Maps file extensions (with leading dot) to backend factories.
#[derive(Default)]
pub struct Registry {
    backends: BTreeMap<&'static str, BackendFactory>,
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in backend.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        crate::golang::register(&mut registry);
        registry
    }

    /// Process-wide registry, populated once on first use.
    pub fn global() -> &'static Registry {
        static REGISTRY: OnceLock<Registry> = OnceLock::new();
        REGISTRY.get_or_init(Registry::builtin)
    }

    /// Register `factory` for `extension` (e.g. `.go`), replacing any previous one.
    pub fn register(&mut self, extension: &'static str, factory: BackendFactory) {
        self.backends.insert(extension, factory);
    }

    /// Registered extensions in sorted order.
    pub fn extensions(&self) -> Vec<&'static str> {
        self.backends.keys().copied().collect()
    }

    /// A new backend for the extension of `path`.
    pub fn backend_for(&self, path: &Path, config: &BackendConfig) -> Result<Box<dyn Backend>> {
        let extension = path
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();

        self.backends
            .get(extension.as_str())
            .map(|factory| factory(config))
            .ok_or(Error::UnsupportedExtension(extension))
    }
}
