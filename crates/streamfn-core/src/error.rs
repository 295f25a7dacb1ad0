//! Error types for streamfn-core.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for streamfn-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building or running a stream function.
#[derive(Debug, Error)]
pub enum Error {
    /// The handler source file does not exist.
    #[error("the file {} doesn't exist", .0.display())]
    MissingFile(PathBuf),

    /// The handler source file exists but has no content.
    #[error("\"{}\" content is empty", .0.display())]
    EmptySource(PathBuf),

    /// The entry-point template could not be rendered.
    #[error("template error: {0}")]
    Template(String),

    /// The merged program is not syntactically valid.
    #[error("parse error: {0}")]
    Parse(String),

    /// The import set could not be fixed.
    #[error("imports {}: {message}", path.display())]
    ImportFix { path: PathBuf, message: String },

    /// Filesystem failure while preparing the workspace.
    #[error("workspace error: {message}: {source}")]
    Workspace {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// `go mod init` failed.
    #[error("go mod init err {output}")]
    ManifestInit { output: String },

    /// One of the dependency steps failed.
    #[error("{step} err {output}")]
    DependencyFetch { step: String, output: String },

    /// The compiler exited non-zero.
    #[error("build failure {output}")]
    Compile { output: String },

    /// The artifact could not be started or exited non-zero.
    #[error("run {}: {reason}", target.display())]
    Run { target: PathBuf, reason: String },

    /// No backend handles this file extension.
    #[error("no backend registered for extension {0:?}")]
    UnsupportedExtension(String),

    /// A pipeline step was called out of order.
    #[error("invalid state: {0}")]
    InvalidState(String),
}

impl Error {
    pub(crate) fn workspace(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Workspace {
            message: message.into(),
            source,
        }
    }

    /// A short recovery hint for terminal output, if one applies.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::MissingFile(_) => Some("check the path of the handler source file"),
            Self::EmptySource(_) => Some("the handler file must contain a Go package with a Handler function"),
            Self::Parse(_) => Some("fix the syntax error in the handler source; do not declare `func main`"),
            Self::ManifestInit { .. } | Self::DependencyFetch { .. } => {
                Some("make sure the Go toolchain is installed and the module proxy is reachable")
            }
            Self::Compile { .. } => Some("the generated program expects an exported `Handler` function"),
            Self::Run { .. } => Some("run `build` first and check that the artifact is executable"),
            Self::UnsupportedExtension(_) => Some("only .go handler sources are supported"),
            _ => None,
        }
    }

    /// Render the error followed by its hint.
    pub fn with_hint(&self) -> String {
        match self.hint() {
            Some(hint) => format!("{self}\n  hint: {hint}"),
            None => self.to_string(),
        }
    }
}
