//! Artifact naming.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Base name of every produced executable.
pub const ARTIFACT_NAME: &str = "sl";

/// Platform family that decides the executable suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    Other,
}

impl Platform {
    /// The platform this binary was compiled for.
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Self::Windows
        } else {
            Self::Other
        }
    }

    pub fn exe_suffix(self) -> &'static str {
        match self {
            Self::Windows => ".exe",
            Self::Other => "",
        }
    }
}

/// Absolute artifact path: the original source's directory joined with `sl`
/// (`sl.exe` on Windows).
pub fn artifact_path(source: &Path, platform: Platform) -> Result<PathBuf> {
    let dir = match source.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let dir = std::path::absolute(dir)
        .map_err(|e| Error::workspace(format!("resolve {}", dir.display()), e))?;

    Ok(dir.join(format!("{ARTIFACT_NAME}{}", platform.exe_suffix())))
}
