//! Injects the runtime imports into the merged program.

use crate::error::Result;

use super::syntax::{parse_file, render, FileSet, ImportSpec, SourceFile};

/// Alias under which the runtime client is imported.
pub const CLIENT_ALIAS: &str = "yomoclient";
/// Import path of the runtime client.
pub const CLIENT_PATH: &str = "github.com/yomorun/yomo/pkg/client";
/// Alias under which the standard logger is imported.
pub const LOG_ALIAS: &str = "stdlog";
/// Import path of the standard logger.
pub const LOG_PATH: &str = "log";

/// Add `name "path"` unless the file already has exactly that spec.
///
/// Returns whether the spec was added.
pub fn add_named_import(fset: &FileSet, file: &mut SourceFile, name: &str, path: &str) -> bool {
    let spec = ImportSpec::named(name, path);
    if file.imports.iter().any(|existing| existing.same_import(&spec)) {
        return false;
    }
    tracing::debug!("{}: adding import {} \"{}\"", fset.name(), name, path);
    file.imports.push(spec);
    true
}

/// Parse the merged program, add the runtime imports and render it.
pub fn rewrite(fset: &FileSet) -> Result<String> {
    let mut file = parse_file(fset)?;
    add_named_import(fset, &mut file, CLIENT_ALIAS, CLIENT_PATH);
    add_named_import(fset, &mut file, LOG_ALIAS, LOG_PATH);
    Ok(render(fset, &file))
}
