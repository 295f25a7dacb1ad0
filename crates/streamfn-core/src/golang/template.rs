//! Entry-point rendering and source merging.

use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

/// Entry point appended to every handler source.
pub const MAIN_FUNC_TEMPLATE: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/templates/main.go.tmpl"
));

/// Values substituted into the entry-point template.
#[derive(Debug, Clone)]
pub struct TemplateContext<'a> {
    pub name: &'a str,
    pub host: &'a str,
    pub port: u16,
}

impl TemplateContext<'_> {
    /// Go source text for a placeholder key.
    fn lookup(&self, key: &str) -> Option<String> {
        match key {
            "name" => Some(go_quote(self.name)),
            "host" => Some(go_quote(self.host)),
            "port" => Some(self.port.to_string()),
            _ => None,
        }
    }
}

/// Render `template`, replacing each `{{key}}` with its value from `ctx`.
pub fn render_template(template: &str, ctx: &TemplateContext<'_>) -> Result<Vec<u8>> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find("{{") {
        out.push_str(&rest[..open]);
        let after = &rest[open + 2..];
        let close = after.find("}}").ok_or_else(|| {
            Error::Template(format!(
                "unterminated placeholder at byte {}",
                template.len() - rest.len() + open
            ))
        })?;
        let key = after[..close].trim();
        let value = ctx
            .lookup(key)
            .ok_or_else(|| Error::Template(format!("unknown placeholder `{key}`")))?;
        out.push_str(&value);
        rest = &after[close + 2..];
    }
    out.push_str(rest);

    Ok(out.into_bytes())
}

/// Quote `value` as a Go interpreted string literal.
pub fn go_quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        match c {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\t' => quoted.push_str("\\t"),
            c if c.is_control() => quoted.push_str(&format!("\\u{:04x}", c as u32)),
            c => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}

/// Read the user's handler source.
pub fn read_source(path: &Path) -> Result<Vec<u8>> {
    if !path.is_file() {
        return Err(Error::MissingFile(path.to_path_buf()));
    }
    let source = fs::read(path).map_err(|e| {
        Error::workspace(format!("failed to read {}", path.display()), e)
    })?;
    if source.is_empty() {
        return Err(Error::EmptySource(path.to_path_buf()));
    }
    Ok(source)
}

/// User source followed by the entry point.
pub fn merge(user: &[u8], entry: &[u8]) -> Vec<u8> {
    let mut merged = Vec::with_capacity(user.len() + entry.len() + 1);
    merged.extend_from_slice(user);
    if !user.ends_with(b"\n") {
        merged.push(b'\n');
    }
    merged.extend_from_slice(entry);
    merged
}
