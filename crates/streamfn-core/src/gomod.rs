//! Minimal go.mod inspection.

/// Module path of the streaming runtime.
pub const RUNTIME_MODULE: &str = "github.com/yomorun/yomo";

/// Path declared by the `module` directive.
pub fn module_path(go_mod: &str) -> Option<String> {
    go_mod.lines().find_map(|line| {
        let rest = strip_comment(line).trim().strip_prefix("module")?;
        if !rest.starts_with(char::is_whitespace) {
            return None;
        }
        let path = unquote(rest.trim());
        (!path.is_empty()).then(|| path.to_string())
    })
}

/// Version required for `module`, from either `require` form.
pub fn required_version(go_mod: &str, module: &str) -> Option<String> {
    let mut in_block = false;
    for line in go_mod.lines() {
        let line = strip_comment(line).trim();

        let spec = if in_block {
            if line == ")" {
                in_block = false;
                continue;
            }
            line
        } else if let Some(rest) = line.strip_prefix("require") {
            let rest = rest.trim();
            if rest == "(" {
                in_block = true;
                continue;
            }
            rest
        } else {
            continue;
        };

        let mut fields = spec.split_whitespace();
        if let (Some(path), Some(version)) = (fields.next(), fields.next()) {
            if unquote(path) == module {
                return Some(version.to_string());
            }
        }
    }
    None
}

/// Runtime version required by a go.mod, or `(none)`.
pub fn runtime_version(go_mod: &str) -> String {
    required_version(go_mod, RUNTIME_MODULE).unwrap_or_else(|| "(none)".to_string())
}

fn strip_comment(line: &str) -> &str {
    line.split_once("//").map_or(line, |(code, _)| code)
}

fn unquote(s: &str) -> &str {
    s.trim_matches(|c| c == '"' || c == '`')
}
