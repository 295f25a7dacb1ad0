//! Go syntax trees.
//!
//! Parsing uses tree-sitter with the Go grammar. The result is an owned
//! [`SourceFile`] summary (package clause, import specs, top-level functions,
//! package qualifiers) that can be mutated and rendered back to text.
//!
//! All three steps take the same [`FileSet`], which owns the source text and
//! its line table, so byte offsets recorded during parsing stay valid while
//! the file is mutated and rendered.
//!
//! Comments inside the import declarations travel with the spec they belong
//! to. A cgo `import "C"` declaration and the comment block directly above it
//! are never merged and are rendered verbatim ahead of the import block.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops::Range;

use tree_sitter::{Node, Parser};

use crate::error::{Error, Result};

/// Source text plus the position table used for diagnostics.
#[derive(Debug, Clone)]
pub struct FileSet {
    name: String,
    text: String,
    line_starts: Vec<usize>,
}

/// A 1-indexed line and column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

impl FileSet {
    /// Create a file set for `source`, which must be UTF-8.
    pub fn new(name: impl Into<String>, source: Vec<u8>) -> Result<Self> {
        let name = name.into();
        let text = String::from_utf8(source).map_err(|e| {
            Error::Parse(format!(
                "{name}: invalid UTF-8 at byte {}",
                e.utf8_error().valid_up_to()
            ))
        })?;
        let line_starts = std::iter::once(0)
            .chain(text.match_indices('\n').map(|(i, _)| i + 1))
            .collect();

        Ok(Self {
            name,
            text,
            line_starts,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    fn slice(&self, range: Range<usize>) -> &str {
        self.text.get(range).unwrap_or("")
    }

    /// Line and column of a byte offset.
    pub fn position(&self, offset: usize) -> Position {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i.saturating_sub(1),
        };
        Position {
            line: line + 1,
            column: offset - self.line_starts[line] + 1,
        }
    }
}

/// One import binding.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct ImportSpec {
    /// Explicit name: an alias, `_` or `.`.
    pub name: Option<String>,
    /// Unquoted import path.
    pub path: String,
    /// Comment lines directly above the spec.
    pub doc: Vec<String>,
    /// Comment following the spec on the same line.
    pub comment: Option<String>,
}

impl ImportSpec {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn named(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            path: path.into(),
            ..Default::default()
        }
    }

    /// Whether both specs bind the same name to the same path, comments aside.
    pub fn same_import(&self, other: &ImportSpec) -> bool {
        self.name == other.name && self.path == other.path
    }

    /// The cgo pseudo-package.
    pub fn is_cgo(&self) -> bool {
        self.name.is_none() && self.path == "C"
    }

    /// Name the import binds in file scope. `None` for blank and dot imports.
    pub fn binding(&self) -> Option<String> {
        match self.name.as_deref() {
            Some("_") | Some(".") => None,
            Some(name) => Some(name.to_string()),
            None => Some(assumed_name(&self.path)),
        }
    }

    /// Whether the path belongs to the standard library.
    pub fn is_std(&self) -> bool {
        let first = self.path.split('/').next().unwrap_or_default();
        !first.contains('.')
    }

    fn render(&self) -> String {
        let spec = match &self.name {
            Some(name) => format!("{name} \"{}\"", self.path),
            None => format!("\"{}\"", self.path),
        };
        match &self.comment {
            Some(comment) => format!("{spec} {comment}"),
            None => spec,
        }
    }
}

/// Package name `go` assumes for an import path when it cannot load it.
///
/// The last path element, skipping a trailing major-version element
/// (`v2`), without a `go-` prefix and cut at the first character that is not
/// valid in an identifier.
pub fn assumed_name(path: &str) -> String {
    let mut base = path.rsplit('/').next().unwrap_or(path);
    if let Some(version) = base.strip_prefix('v') {
        if !version.is_empty() && version.bytes().all(|b| b.is_ascii_digit()) {
            if let Some((dir, _)) = path.rsplit_once('/') {
                base = dir.rsplit('/').next().unwrap_or(dir);
            }
        }
    }
    let base = base.strip_prefix("go-").unwrap_or(base);
    let end = base
        .find(|c: char| !(c.is_alphanumeric() || c == '_'))
        .unwrap_or(base.len());
    base[..end].to_string()
}

/// Parsed summary of a Go source file.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Package name from the package clause.
    pub package: String,

    /// Import specs in source order.
    pub imports: Vec<ImportSpec>,

    /// Names of top-level functions in source order.
    pub functions: Vec<String>,

    /// Identifiers used as package qualifiers (`pkg.Name`).
    pub qualifiers: BTreeSet<String>,

    /// Identifiers used anywhere else.
    pub identifiers: BTreeSet<String>,

    /// Comments inside the import declarations that precede no spec.
    pub import_comments: Vec<String>,

    /// Module path whose imports render in their own trailing group.
    pub local_module: Option<String>,

    package_end: usize,
    import_region: Option<Range<usize>>,
    cgo_imports: Vec<Range<usize>>,
}

/// Parse the file set's text.
pub fn parse_file(fset: &FileSet) -> Result<SourceFile> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_go::LANGUAGE.into())
        .map_err(|e| Error::Parse(format!("failed to load Go grammar: {e}")))?;

    let tree = parser
        .parse(fset.text(), None)
        .ok_or_else(|| Error::Parse(format!("{}: parser produced no tree", fset.name())))?;
    let root = tree.root_node();

    if root.has_error() {
        return Err(syntax_error(fset, root));
    }

    let mut package = None;
    let mut package_end = 0;
    let mut import_region: Option<Range<usize>> = None;
    let mut cgo_imports: Vec<Range<usize>> = Vec::new();
    let mut import_nodes: Vec<Node<'_>> = Vec::new();
    let mut pending_comments: Vec<Node<'_>> = Vec::new();
    // End row of the last import declaration and whether it was cgo.
    let mut last_import: Option<(usize, bool)> = None;
    let mut imports_done = false;
    let mut functions: Vec<(String, usize)> = Vec::new();

    let mut cursor = root.walk();
    for child in root.children(&mut cursor) {
        match child.kind() {
            "package_clause" => {
                package = find_first(child, |n| n.kind() == "package_identifier")
                    .map(|id| fset.slice(id.byte_range()).to_string());
                package_end = child.end_byte();
            }
            "import_declaration" if !imports_done => {
                let mut range = child.byte_range();
                let cgo = is_cgo_declaration(fset, child);
                if cgo {
                    range.start = preamble_start(child);
                    let start = range.start;
                    pending_comments.retain(|c| c.start_byte() < start);
                    cgo_imports.push(range.clone());
                }
                import_nodes.append(&mut pending_comments);
                if !cgo {
                    walk(child, |node| {
                        if matches!(node.kind(), "import_spec" | "comment") {
                            import_nodes.push(node);
                        }
                    });
                }
                import_region = Some(match import_region {
                    Some(region) => region.start..range.end,
                    None => range,
                });
                last_import = Some((child.end_position().row, cgo));
            }
            "comment" if !imports_done => {
                if let (Some(region), Some((row, cgo))) = (import_region.as_mut(), last_import) {
                    if child.start_position().row == row {
                        region.end = child.end_byte();
                        match cgo_imports.last_mut() {
                            Some(decl) if cgo => decl.end = child.end_byte(),
                            _ => import_nodes.push(child),
                        }
                    } else {
                        pending_comments.push(child);
                    }
                }
            }
            "function_declaration" => {
                if let Some(name) = child.child_by_field_name("name") {
                    functions.push((fset.slice(name.byte_range()).to_string(), name.start_byte()));
                }
            }
            _ => {}
        }
        if import_region.is_some()
            && child.is_named()
            && !matches!(child.kind(), "import_declaration" | "comment")
        {
            imports_done = true;
        }
    }

    let package = package.ok_or_else(|| {
        Error::Parse(format!("{}:1:1: expected 'package'", fset.name()))
    })?;
    check_redeclared(fset, &functions)?;

    let (imports, import_comments) = collect_imports(fset, &import_nodes);

    let mut qualifiers = BTreeSet::new();
    let mut identifiers = BTreeSet::new();
    walk(root, |node| match node.kind() {
        "identifier" => {
            let text = fset.slice(node.byte_range()).to_string();
            if is_selector_operand(node) {
                qualifiers.insert(text);
            } else if !is_composite_key(node) {
                identifiers.insert(text);
            }
        }
        "qualified_type" => {
            if let Some(pkg) = node.child_by_field_name("package") {
                qualifiers.insert(fset.slice(pkg.byte_range()).to_string());
            }
        }
        _ => {}
    });

    Ok(SourceFile {
        package,
        imports,
        functions: functions.into_iter().map(|(name, _)| name).collect(),
        qualifiers,
        identifiers,
        import_comments,
        local_module: None,
        package_end,
        import_region,
        cgo_imports,
    })
}

/// Render `file` back to text.
///
/// All import declarations are replaced by the cgo declarations, copied
/// verbatim, followed by one canonical block at the position of the first
/// declaration (or after the package clause). Everything else is copied from
/// the file set verbatim.
pub fn render(fset: &FileSet, file: &SourceFile) -> String {
    let text = fset.text();
    let region = file
        .import_region
        .clone()
        .unwrap_or(file.package_end..file.package_end);

    let head = text[..region.start].trim_end();
    let tail = text[region.end..].trim_start();

    let mut parts: Vec<&str> = file
        .cgo_imports
        .iter()
        .map(|range| fset.slice(range.clone()))
        .collect();
    let block = format_imports(
        &file.imports,
        &file.import_comments,
        file.local_module.as_deref(),
    );
    if !block.is_empty() {
        parts.push(&block);
    }

    let mut out = String::with_capacity(text.len() + block.len() + 4);
    out.push_str(head);
    out.push_str("\n\n");
    for part in parts {
        out.push_str(part);
        out.push_str("\n\n");
    }
    out.push_str(tail);
    if !out.ends_with('\n') {
        out.push('\n');
    }
    out
}

/// Format import specs as a single declaration, grouped and sorted by path.
pub fn format_import_block(specs: &[ImportSpec], local_module: Option<&str>) -> String {
    format_imports(specs, &[], local_module)
}

fn format_imports(specs: &[ImportSpec], dangling: &[String], local_module: Option<&str>) -> String {
    let mut groups: BTreeMap<u8, BTreeMap<(&str, Option<&str>), ImportSpec>> = BTreeMap::new();
    for spec in specs {
        let is_local = local_module
            .is_some_and(|m| spec.path == m || spec.path.starts_with(&format!("{m}/")));
        let group = if is_local {
            2
        } else if spec.is_std() {
            0
        } else {
            1
        };
        groups
            .entry(group)
            .or_default()
            .entry((spec.path.as_str(), spec.name.as_deref()))
            .and_modify(|merged| {
                merged.doc.extend(spec.doc.iter().cloned());
                if merged.comment.is_none() {
                    merged.comment = spec.comment.clone();
                }
            })
            .or_insert_with(|| spec.clone());
    }

    let count: usize = groups.values().map(BTreeMap::len).sum();
    if count == 0 && dangling.is_empty() {
        return String::new();
    }
    if count == 1 && dangling.is_empty() {
        let only = groups.values().flat_map(BTreeMap::values).next();
        if let Some(spec) = only.filter(|spec| spec.doc.is_empty()) {
            return format!("import {}", spec.render());
        }
    }

    let body: Vec<String> = groups
        .values()
        .map(|group| {
            let mut lines = String::new();
            for spec in group.values() {
                for doc in &spec.doc {
                    lines.push_str(&format!("\t{doc}\n"));
                }
                lines.push_str(&format!("\t{}\n", spec.render()));
            }
            lines
        })
        .collect();

    let mut block = format!("import (\n{}", body.join("\n"));
    for comment in dangling {
        block.push_str(&format!("\t{comment}\n"));
    }
    block.push(')');
    block
}

/// Import specs with their comments attached, plus comments that precede no spec.
fn collect_imports(fset: &FileSet, nodes: &[Node<'_>]) -> (Vec<ImportSpec>, Vec<String>) {
    let mut imports: Vec<ImportSpec> = Vec::new();
    let mut doc = Vec::new();
    let mut last_spec_row = None;

    for node in nodes {
        if node.kind() == "comment" {
            let text = fset.slice(node.byte_range()).to_string();
            match (last_spec_row, imports.last_mut()) {
                (Some(row), Some(spec)) if node.start_position().row == row && spec.comment.is_none() => {
                    spec.comment = Some(text);
                }
                _ => doc.push(text),
            }
            continue;
        }
        if let Some(mut spec) = import_spec(fset, *node) {
            spec.doc = std::mem::take(&mut doc);
            last_spec_row = Some(node.end_position().row);
            imports.push(spec);
        }
    }
    (imports, doc)
}

/// Whether `decl` imports only the cgo pseudo-package.
fn is_cgo_declaration(fset: &FileSet, decl: Node<'_>) -> bool {
    let mut specs = Vec::new();
    walk(decl, |node| {
        if node.kind() == "import_spec" {
            specs.push(node);
        }
    });
    matches!(specs.as_slice(), [spec] if import_spec(fset, *spec).is_some_and(|s| s.is_cgo()))
}

/// Start of the comment block directly above `decl` (no blank line between),
/// or of `decl` itself.
fn preamble_start(decl: Node<'_>) -> usize {
    let mut start = decl.start_byte();
    let mut row = decl.start_position().row;
    let mut prev = decl.prev_named_sibling();

    while let Some(node) = prev {
        let end = node.end_position().row;
        if node.kind() != "comment" || (end != row && end + 1 != row) {
            break;
        }
        let before = node.prev_named_sibling();
        // A comment trailing the previous declaration belongs to it.
        if before.is_some_and(|b| b.end_position().row == node.start_position().row) {
            break;
        }
        start = node.start_byte();
        row = node.start_position().row;
        prev = before;
    }
    start
}

fn import_spec(fset: &FileSet, node: Node<'_>) -> Option<ImportSpec> {
    let path = node.child_by_field_name("path")?;
    let path = fset
        .slice(path.byte_range())
        .trim_matches(|c| c == '"' || c == '`')
        .to_string();
    let name = node
        .child_by_field_name("name")
        .map(|n| fset.slice(n.byte_range()).to_string());
    Some(ImportSpec {
        name,
        path,
        ..Default::default()
    })
}

fn is_selector_operand(node: Node<'_>) -> bool {
    node.parent()
        .filter(|parent| parent.kind() == "selector_expression")
        .and_then(|parent| parent.child_by_field_name("operand"))
        .is_some_and(|operand| operand == node)
}

/// Key of a keyed element in a composite literal (`T{key: v}`).
fn is_composite_key(node: Node<'_>) -> bool {
    let Some(parent) = node.parent() else {
        return false;
    };
    let (key, keyed) = if parent.kind() == "literal_element" {
        (parent, parent.parent())
    } else {
        (node, Some(parent))
    };
    keyed
        .filter(|k| k.kind() == "keyed_element")
        .and_then(|k| k.child(0))
        .is_some_and(|first| first == key)
}

fn check_redeclared(fset: &FileSet, functions: &[(String, usize)]) -> Result<()> {
    let mut seen = BTreeSet::new();
    for (name, offset) in functions {
        if name == "init" || name == "_" {
            continue;
        }
        if !seen.insert(name.as_str()) {
            return Err(Error::Parse(format!(
                "{}:{}: {} redeclared in this block",
                fset.name(),
                fset.position(*offset),
                name
            )));
        }
    }
    Ok(())
}

fn syntax_error(fset: &FileSet, root: Node<'_>) -> Error {
    let Some(node) = find_first(root, |n| n.is_error() || n.is_missing()) else {
        return Error::Parse(format!("{}: syntax error", fset.name()));
    };

    let message = if node.is_missing() {
        format!("expected `{}`", node.kind())
    } else {
        let text = fset.slice(node.byte_range());
        let snippet: String = text.lines().next().unwrap_or_default().chars().take(24).collect();
        format!("syntax error near `{}`", snippet.trim())
    };

    Error::Parse(format!(
        "{}:{}: {}",
        fset.name(),
        fset.position(node.start_byte()),
        message
    ))
}

/// Pre-order search below (and including) `root`.
fn find_first<'t>(root: Node<'t>, mut pred: impl FnMut(&Node<'t>) -> bool) -> Option<Node<'t>> {
    let mut cursor = root.walk();
    loop {
        let node = cursor.node();
        if pred(&node) {
            return Some(node);
        }
        if cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return None;
            }
        }
    }
}

fn walk<'t>(root: Node<'t>, mut visit: impl FnMut(Node<'t>)) {
    find_first(root, |node| {
        visit(*node);
        false
    });
}
