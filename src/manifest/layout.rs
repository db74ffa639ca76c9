//! # Manifest Layout
//!
//! Line-level view of a block-style YAML document: where each top-level entry
//! starts and ends in the original text. The rewriter uses these spans to edit
//! `kind`, `data`, `stringData` and `sops` while leaving every other byte alone.

use std::ops::Range;

/// One top-level `key: ...` entry and the bytes it occupies
///
/// The span runs from the start of the key line to the end of its last
/// continuation line. Blank lines and column-0 comments that follow the entry
/// are not part of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub key: String,
    pub span: Range<usize>,
}

#[derive(Debug, Clone)]
pub struct Layout<'a> {
    text: &'a str,
    entries: Vec<Entry>,
}

impl<'a> Layout<'a> {
    pub fn scan(text: &'a str) -> Self {
        let mut entries: Vec<Entry> = Vec::new();
        let mut offset = 0;

        for line in text.split_inclusive('\n') {
            let end = offset + line.len();
            let content = line.trim_end_matches(['\n', '\r']);

            if let Some(key) = top_level_key(content) {
                entries.push(Entry {
                    key,
                    span: offset..end,
                });
            } else if is_continuation(content) {
                if let Some(current) = entries.last_mut() {
                    current.span.end = end;
                }
            }

            offset = end;
        }

        Self { text, entries }
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// First entry with the given key
    pub fn entry(&self, key: &str) -> Option<&Entry> {
        self.entries.iter().find(|entry| entry.key == key)
    }

    /// Original text of an entry
    pub fn slice(&self, entry: &Entry) -> &'a str {
        &self.text[entry.span.clone()]
    }

    /// Offset just past the last entry, where new entries are appended
    pub fn append_offset(&self) -> usize {
        self.entries.last().map_or(self.text.len(), |entry| entry.span.end)
    }
}

/// Lines that belong to the entry above them: indented content and
/// column-0 block sequence items
fn is_continuation(line: &str) -> bool {
    if line.trim().is_empty() {
        return false;
    }
    line.starts_with([' ', '\t']) || line == "-" || line.starts_with("- ")
}

/// Parse the key of a column-0 mapping entry
fn top_level_key(line: &str) -> Option<String> {
    let first = line.chars().next()?;
    if first.is_whitespace() || matches!(first, '#' | '-' | '%' | '?' | '{' | '[') {
        return None;
    }
    if line.starts_with("...") {
        return None;
    }

    let (key, rest) = match first {
        '"' | '\'' => quoted_key(line, first)?,
        _ => {
            let colon = plain_key_end(line)?;
            (line[..colon].trim_end().to_string(), &line[colon..])
        }
    };

    let rest = rest.trim_start_matches([' ', '\t']);
    let after_colon = rest.strip_prefix(':')?;
    if after_colon.is_empty() || after_colon.starts_with([' ', '\t']) {
        Some(key)
    } else {
        None
    }
}

/// Byte index of the `:` that ends a plain key
fn plain_key_end(line: &str) -> Option<usize> {
    let bytes = line.as_bytes();
    for (index, byte) in bytes.iter().enumerate() {
        match byte {
            b':' => {
                let next = bytes.get(index + 1);
                if next.is_none() || matches!(next, Some(b' ' | b'\t')) {
                    return Some(index);
                }
            }
            b'#' if index > 0 && matches!(bytes[index - 1], b' ' | b'\t') => return None,
            _ => {}
        }
    }
    None
}

/// Unquote a `"key"` or `'key'` and return the remainder of the line
fn quoted_key(line: &str, quote: char) -> Option<(String, &str)> {
    let body = &line[1..];
    let mut key = String::new();
    let mut chars = body.char_indices().peekable();

    while let Some((index, c)) = chars.next() {
        if c == quote {
            if quote == '\'' && chars.peek().map(|(_, next)| *next) == Some('\'') {
                key.push('\'');
                chars.next();
                continue;
            }
            return Some((key, &body[index + 1..]));
        }
        if c == '\\' && quote == '"' {
            let (_, escaped) = chars.next()?;
            key.push(match escaped {
                'n' => '\n',
                't' => '\t',
                other => other,
            });
            continue;
        }
        key.push(c);
    }
    None
}
