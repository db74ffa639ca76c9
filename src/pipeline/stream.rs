//! # Document Streams
//!
//! Splits a YAML stream on `---` separator lines without losing a byte: the
//! concatenation of every document's separator and body is the original input.

/// One document of a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Document<'a> {
    /// The `---` line that opened this document (empty for the first document)
    pub separator: &'a str,
    /// Everything up to the next separator line
    pub body: &'a str,
}

impl Document<'_> {
    /// Whether the separator line carries document content (`--- !tag`, `--- {a: b}`)
    pub fn has_inline_content(&self) -> bool {
        let rest = self
            .separator
            .strip_prefix("---")
            .unwrap_or_default()
            .trim();
        !rest.is_empty() && !rest.starts_with('#')
    }
}

/// Split a stream into documents
///
/// A separator is a line starting with `---` followed by whitespace or the end
/// of the line. Separators inside block scalars are indented and never match.
pub fn split_documents(text: &str) -> Vec<Document<'_>> {
    let mut documents = Vec::new();
    let mut separator = 0..0;
    let mut body_start = 0;
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        let end = offset + line.len();
        if is_separator(line) {
            documents.push(Document {
                separator: &text[separator.clone()],
                body: &text[body_start..offset],
            });
            separator = offset..end;
            body_start = end;
        }
        offset = end;
    }

    documents.push(Document {
        separator: &text[separator],
        body: &text[body_start..],
    });

    // A stream opening with `---` has no document before it
    if documents.len() > 1 && documents[0].separator.is_empty() && documents[0].body.is_empty() {
        documents.remove(0);
    }
    documents
}

fn is_separator(line: &str) -> bool {
    match line.strip_prefix("---") {
        Some(rest) => rest.is_empty() || rest.starts_with([' ', '\t', '\n', '\r']),
        None => false,
    }
}
