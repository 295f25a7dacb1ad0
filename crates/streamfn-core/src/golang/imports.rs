//! Import fixing for generated programs.
//!
//! Removes imports whose binding is unused and adds imports for well-known
//! package qualifiers that are referenced but not bound, so the merged
//! program compiles without manual edits.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::gomod;

use super::syntax::{parse_file, render, FileSet, ImportSpec, SourceFile};

/// Qualifiers resolved without loading packages: standard library plus the
/// runtime's own packages.
const KNOWN_PACKAGES: &[(&str, &str)] = &[
    ("atomic", "sync/atomic"),
    ("base64", "encoding/base64"),
    ("binary", "encoding/binary"),
    ("bufio", "bufio"),
    ("bytes", "bytes"),
    ("context", "context"),
    ("errors", "errors"),
    ("exec", "os/exec"),
    ("filepath", "path/filepath"),
    ("fmt", "fmt"),
    ("hex", "encoding/hex"),
    ("http", "net/http"),
    ("io", "io"),
    ("ioutil", "io/ioutil"),
    ("json", "encoding/json"),
    ("log", "log"),
    ("math", "math"),
    ("md5", "crypto/md5"),
    ("net", "net"),
    ("os", "os"),
    ("rand", "math/rand"),
    ("reflect", "reflect"),
    ("regexp", "regexp"),
    ("runtime", "runtime"),
    ("rx", "github.com/yomorun/yomo/pkg/rx"),
    ("sha256", "crypto/sha256"),
    ("signal", "os/signal"),
    ("sort", "sort"),
    ("strconv", "strconv"),
    ("strings", "strings"),
    ("sync", "sync"),
    ("time", "time"),
    ("unicode", "unicode"),
    ("url", "net/url"),
    ("utf8", "unicode/utf8"),
    ("y3", "github.com/yomorun/y3-codec-golang"),
];

/// Fix the import set of `text`, which will be written to `dest`.
pub fn fix_imports(dest: &Path, text: &str) -> Result<String> {
    let fset = FileSet::new(dest.display().to_string(), text.as_bytes().to_vec())
        .map_err(|e| import_error(dest, e))?;
    let mut file = parse_file(&fset).map_err(|e| import_error(dest, e))?;

    file.local_module = enclosing_module(dest);
    prune_unused(&mut file);
    add_missing(&mut file);

    Ok(render(&fset, &file))
}

fn import_error(dest: &Path, err: Error) -> Error {
    let message = match err {
        Error::Parse(message) => message,
        other => other.to_string(),
    };
    Error::ImportFix {
        path: dest.to_path_buf(),
        message,
    }
}

/// Module path from a `go.mod` next to `dest`, if one exists.
fn enclosing_module(dest: &Path) -> Option<String> {
    let go_mod = dest.parent()?.join("go.mod");
    let content = fs::read_to_string(go_mod).ok()?;
    gomod::module_path(&content)
}

/// Drop imports whose binding is never used as a qualifier.
///
/// Blank and dot imports are kept. Unaliased imports bind their assumed
/// package name, as `goimports` does for packages it cannot load.
fn prune_unused(file: &mut SourceFile) {
    let qualifiers = &file.qualifiers;
    file.imports.retain(|spec| {
        let Some(binding) = spec.binding() else {
            return true;
        };
        if qualifiers.contains(&binding) {
            return true;
        }
        tracing::debug!("removing unused import \"{}\"", spec.path);
        false
    });
}

/// Bind referenced well-known qualifiers that nothing else declares.
fn add_missing(file: &mut SourceFile) {
    let bound: BTreeSet<String> = file.imports.iter().filter_map(ImportSpec::binding).collect();
    let missing: Vec<ImportSpec> = file
        .qualifiers
        .iter()
        .filter(|q| !bound.contains(*q) && !file.identifiers.contains(*q))
        .filter_map(|q| known_package(q))
        .map(ImportSpec::new)
        .collect();

    for spec in &missing {
        tracing::debug!("adding missing import \"{}\"", spec.path);
    }
    file.imports.extend(missing);
}

fn known_package(qualifier: &str) -> Option<&'static str> {
    KNOWN_PACKAGES
        .iter()
        .find(|(name, _)| *name == qualifier)
        .map(|(_, path)| *path)
}
