//! # YAML Rendering
//!
//! Renders sensitive field groups as block-style YAML. Scalars use the plainest
//! style that reads back as the same string; multi-line values become literal
//! block scalars so configuration files stay readable in the working tree.

use crate::manifest::harvest::{FieldGroup, SecretField};
use serde_yaml::Value;
use std::fmt::Write as _;

/// Indentation of entries inside a rendered group
const GROUP_INDENT: usize = 2;

const YAML11_KEYWORDS: &[&str] = &[
    "y", "Y", "yes", "Yes", "YES", "n", "N", "no", "No", "NO", "on", "On", "ON", "off", "Off",
    "OFF",
];

/// Render one group as a top-level entry, e.g. `stringData:\n  key: value\n`
///
/// An empty group renders as `group: {}`.
pub fn render_group<'a>(
    group: FieldGroup,
    fields: impl IntoIterator<Item = &'a SecretField>,
) -> String {
    let mut out = String::new();
    for field in fields {
        out.push_str(&render_entry(&field.key, &field.value, GROUP_INDENT));
    }
    if out.is_empty() {
        format!("{group}: {{}}\n")
    } else {
        format!("{group}:\n{out}")
    }
}

/// Render `key: value` at the given indentation, ending with a newline
pub fn render_entry(key: &str, value: &str, indent: usize) -> String {
    let pad = " ".repeat(indent);
    let key = render_scalar(key);
    match block_literal(value, indent) {
        Some(block) => format!("{pad}{key}: {block}"),
        None => format!("{pad}{key}: {}\n", render_scalar(value)),
    }
}

/// Render a string as a single-line YAML scalar
pub fn render_scalar(value: &str) -> String {
    if is_plain_safe(value) {
        value.to_string()
    } else if value.chars().any(needs_escape) || value.contains('\n') {
        double_quoted(value)
    } else {
        format!("'{}'", value.replace('\'', "''"))
    }
}

/// Characters that cannot appear raw in a single-line scalar
fn needs_escape(c: char) -> bool {
    (c.is_control() && c != '\t') || matches!(c, '\u{2028}' | '\u{2029}' | '\u{feff}')
}

fn is_plain_safe(value: &str) -> bool {
    let Some(first) = value.chars().next() else {
        return false;
    };
    if value.trim() != value || value.chars().any(|c| c == '\t' || needs_escape(c)) {
        return false;
    }
    if "-?:,[]{}#&*!|>'\"%@`".contains(first) {
        return false;
    }
    if value.contains(": ") || value.contains(" #") || value.ends_with(':') {
        return false;
    }
    // Kubernetes tooling reads YAML 1.1, where these are booleans or sexagesimal numbers
    if YAML11_KEYWORDS.contains(&value)
        || value.chars().all(|c| c.is_ascii_digit() || "+-.:_".contains(c))
    {
        return false;
    }
    // Rules out null, booleans, numbers and anything else that would resolve to a non-string
    matches!(serde_yaml::from_str::<Value>(value), Ok(Value::String(ref parsed)) if parsed == value)
}

fn double_quoted(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\0' => out.push_str("\\0"),
            c if needs_escape(c) => {
                let code = u32::from(c);
                if code <= 0xff {
                    let _ = write!(out, "\\x{code:02X}");
                } else {
                    let _ = write!(out, "\\u{code:04X}");
                }
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Literal block scalar (header line plus indented content) for multi-line values
///
/// Returns `None` when a literal block cannot reproduce the value exactly, in
/// which case the caller falls back to a double-quoted scalar.
fn block_literal(value: &str, indent: usize) -> Option<String> {
    if !value.contains('\n') || value.ends_with("\n\n") {
        return None;
    }
    if value.chars().any(|c| c != '\n' && needs_escape(c)) {
        return None;
    }

    let (body, chomp) = match value.strip_suffix('\n') {
        Some(body) => (body, ""),
        None => (value, "-"),
    };
    let lines: Vec<&str> = body.split('\n').collect();

    // Whitespace-only lines would be read back as empty lines
    if lines
        .iter()
        .any(|line| !line.is_empty() && line.trim_matches([' ', '\t']).is_empty())
    {
        return None;
    }
    let first_content = lines.iter().find(|line| !line.is_empty())?;
    let indicator = if first_content.starts_with(' ') {
        GROUP_INDENT.to_string()
    } else {
        String::new()
    };

    let pad = " ".repeat(indent + GROUP_INDENT);
    let mut out = format!("|{indicator}{chomp}\n");
    for line in lines {
        if !line.is_empty() {
            out.push_str(&pad);
            out.push_str(line);
        }
        out.push('\n');
    }
    Some(out)
}
