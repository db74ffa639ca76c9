//! # Document Rewriter
//!
//! Reassembles a manifest after encryption or decryption by editing only the
//! `kind` value, the sensitive field groups and the `sops` metadata block.
//! Every other top-level entry, comment and blank line is copied byte-for-byte.

use crate::constants::SOPS_METADATA_KEY;
use crate::manifest::harvest::{harvest_fields, FieldGroup, FieldSet};
use crate::manifest::kind::{classify, ManifestKind};
use crate::manifest::layout::Layout;
use crate::manifest::render::render_group;
use crate::sops::detection::has_sops_metadata;
use crate::sops::SopsMetadata;
use std::ops::Range;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RewriteError {
    #[error("top-level `{0}` entry not found in block-style YAML")]
    MissingEntry(String),
    #[error("could not locate the `{0}` value on the kind line")]
    KindValueNotFound(String),
    #[error("rewritten document does not match the transformed content: {0}")]
    ValidationFailed(String),
}

/// What happens to the `sops` metadata block
#[derive(Debug, Clone, Copy)]
pub enum MetadataEdit<'a> {
    /// Insert (or replace) the block returned by the engine
    Attach(&'a SopsMetadata),
    /// Remove the block
    Remove,
    /// Leave the document's block, if any, as it is
    Keep,
}

#[derive(Debug, Clone, Copy)]
pub struct RewriteRequest<'a> {
    /// Kind the document currently has
    pub source: ManifestKind,
    /// Kind to write
    pub target: ManifestKind,
    /// Replacement contents of the sensitive groups
    pub fields: &'a FieldSet,
    pub metadata: MetadataEdit<'a>,
}

/// Produce the rewritten document text
///
/// Groups with no replacement fields are left untouched. The output is parsed
/// again and must carry the target kind and exactly the supplied fields.
pub fn rewrite_document(original: &str, request: &RewriteRequest<'_>) -> Result<String, RewriteError> {
    let layout = Layout::scan(original);
    let newline = line_ending(original);
    let mut edits: Vec<(Range<usize>, String)> = Vec::new();

    let kind_entry = layout
        .entry("kind")
        .ok_or_else(|| RewriteError::MissingEntry("kind".to_string()))?;
    edits.push((
        kind_entry.span.clone(),
        replace_kind(layout.slice(kind_entry), request.source, request.target)?,
    ));

    for group in FieldGroup::ALL {
        if request.fields.in_group(group).next().is_none() {
            continue;
        }
        let entry = layout
            .entry(group.as_str())
            .ok_or_else(|| RewriteError::MissingEntry(group.as_str().to_string()))?;
        let rendered = render_group(group, request.fields.in_group(group));
        edits.push((
            entry.span.clone(),
            match_entry_end(layout.slice(entry), with_line_ending(&rendered, newline), newline),
        ));
    }

    let existing_metadata = layout.entry(SOPS_METADATA_KEY);
    match (request.metadata, existing_metadata) {
        (MetadataEdit::Attach(metadata), Some(entry)) => {
            edits.push((entry.span.clone(), with_line_ending(metadata.block(), newline)));
        }
        (MetadataEdit::Attach(metadata), None) => {
            let at = layout.append_offset();
            let mut block = String::new();
            if at > 0 && !original[..at].ends_with('\n') {
                block.push_str(newline);
            }
            block.push_str(&with_line_ending(metadata.block(), newline));
            edits.push((at..at, block));
        }
        (MetadataEdit::Remove, Some(entry)) => edits.push((entry.span.clone(), String::new())),
        (MetadataEdit::Remove | MetadataEdit::Keep, None) | (MetadataEdit::Keep, Some(_)) => {}
    }

    // Apply back to front so earlier offsets stay valid
    edits.sort_by(|a, b| b.0.start.cmp(&a.0.start));
    let mut output = original.to_string();
    for (span, replacement) in edits {
        output.replace_range(span, &replacement);
    }

    validate(&output, request)?;
    debug!(
        "Rewrote {} document as {} ({} fields)",
        request.source.as_str(),
        request.target.as_str(),
        request.fields.len()
    );
    Ok(output)
}

/// Swap the kind value on the `kind:` line, keeping quotes and trailing comments
fn replace_kind(
    entry: &str,
    source: ManifestKind,
    target: ManifestKind,
) -> Result<String, RewriteError> {
    let colon = entry
        .find(':')
        .ok_or_else(|| RewriteError::KindValueNotFound(source.as_str().to_string()))?;
    let (head, value) = entry.split_at(colon + 1);
    let position = value
        .find(source.as_str())
        .ok_or_else(|| RewriteError::KindValueNotFound(source.as_str().to_string()))?;

    let mut replaced = String::with_capacity(entry.len() + target.as_str().len());
    replaced.push_str(head);
    replaced.push_str(&value[..position]);
    replaced.push_str(target.as_str());
    replaced.push_str(&value[position + source.as_str().len()..]);
    Ok(replaced)
}

/// Line break of the document, taken from its first line
fn line_ending(text: &str) -> &'static str {
    match text.find('\n') {
        Some(index) if text[..index].ends_with('\r') => "\r\n",
        _ => "\n",
    }
}

/// Rewrite the line breaks of generated text; raw `\r` never appears inside rendered values
fn with_line_ending(text: &str, newline: &str) -> String {
    if newline == "\n" {
        return text.to_string();
    }
    text.replace("\r\n", "\n").replace('\n', newline)
}

/// Drop the rendered trailing newline when the replaced entry ended the file without one
fn match_entry_end(original: &str, mut rendered: String, newline: &str) -> String {
    if !original.ends_with('\n') && rendered.ends_with(newline) {
        rendered.truncate(rendered.len() - newline.len());
    }
    rendered
}

fn validate(output: &str, request: &RewriteRequest<'_>) -> Result<(), RewriteError> {
    let document: serde_yaml::Value = serde_yaml::from_str(output)
        .map_err(|e| RewriteError::ValidationFailed(format!("output is not valid YAML: {e}")))?;

    let kind = classify(&document);
    if kind != request.target {
        return Err(RewriteError::ValidationFailed(format!(
            "expected kind {}, found {}",
            request.target.as_str(),
            kind.as_str()
        )));
    }

    let written = harvest_fields(&document)
        .map_err(|e| RewriteError::ValidationFailed(e.to_string()))?;
    if !request.fields.is_empty() && !written.same_groups_as(request.fields) {
        return Err(RewriteError::ValidationFailed(
            "sensitive fields differ from the transformed values".to_string(),
        ));
    }

    let has_metadata = has_sops_metadata(&document);
    match request.metadata {
        MetadataEdit::Attach(_) if !has_metadata => Err(RewriteError::ValidationFailed(
            "sops metadata block missing".to_string(),
        )),
        MetadataEdit::Remove if has_metadata => Err(RewriteError::ValidationFailed(
            "sops metadata block still present".to_string(),
        )),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::harvest::SecretField;

    const SECRET: &str = r#"apiVersion: v1
kind: Secret # plaintext in the working tree
metadata:
  name: basic-secret
  annotations:
    def.ms/sops-encrypt: "true"
type: Opaque
stringData:
  password: supersecretpassword123
"#;

    fn sealed() -> FieldSet {
        [SecretField::new(
            FieldGroup::StringData,
            "password",
            "ENC[AES256_GCM,data:abc,iv:def,tag:ghi,type:str]",
        )]
        .into_iter()
        .collect()
    }

    fn metadata() -> SopsMetadata {
        SopsMetadata::new("sops:\n    mac: ENC[AES256_GCM,data:m,iv:i,tag:t,type:str]\n    version: 3.8.1\n")
    }

    #[test]
    fn test_protect_rewrite_touches_only_sensitive_parts() {
        let fields = sealed();
        let metadata = metadata();
        let output = rewrite_document(
            SECRET,
            &RewriteRequest {
                source: ManifestKind::Secret,
                target: ManifestKind::SopsSecret,
                fields: &fields,
                metadata: MetadataEdit::Attach(&metadata),
            },
        )
        .unwrap();

        assert_eq!(
            output,
            r#"apiVersion: v1
kind: SopsSecret # plaintext in the working tree
metadata:
  name: basic-secret
  annotations:
    def.ms/sops-encrypt: "true"
type: Opaque
stringData:
  password: ENC[AES256_GCM,data:abc,iv:def,tag:ghi,type:str]
sops:
    mac: ENC[AES256_GCM,data:m,iv:i,tag:t,type:str]
    version: 3.8.1
"#
        );
    }

    #[test]
    fn test_reveal_rewrite_removes_metadata() {
        let fields = sealed();
        let metadata = metadata();
        let protected = rewrite_document(
            SECRET,
            &RewriteRequest {
                source: ManifestKind::Secret,
                target: ManifestKind::SopsSecret,
                fields: &fields,
                metadata: MetadataEdit::Attach(&metadata),
            },
        )
        .unwrap();

        let plain: FieldSet = [SecretField::new(
            FieldGroup::StringData,
            "password",
            "supersecretpassword123",
        )]
        .into_iter()
        .collect();
        let revealed = rewrite_document(
            &protected,
            &RewriteRequest {
                source: ManifestKind::SopsSecret,
                target: ManifestKind::Secret,
                fields: &plain,
                metadata: MetadataEdit::Remove,
            },
        )
        .unwrap();
        assert_eq!(revealed, SECRET);
    }

    #[test]
    fn test_quoted_kind_value() {
        assert_eq!(
            replace_kind("kind: \"Secret\"\n", ManifestKind::Secret, ManifestKind::SopsSecret)
                .unwrap(),
            "kind: \"SopsSecret\"\n"
        );
        assert_eq!(
            replace_kind("kind: SopsSecret\n", ManifestKind::SopsSecret, ManifestKind::Secret)
                .unwrap(),
            "kind: Secret\n"
        );
    }

    #[test]
    fn test_metadata_appended_before_document_end_marker() {
        let text = "kind: Secret\nstringData:\n  a: b\n...\n";
        let fields: FieldSet = [SecretField::new(
            FieldGroup::StringData,
            "a",
            "ENC[AES256_GCM,data:x,type:str]",
        )]
        .into_iter()
        .collect();
        let metadata = metadata();
        let output = rewrite_document(
            text,
            &RewriteRequest {
                source: ManifestKind::Secret,
                target: ManifestKind::SopsSecret,
                fields: &fields,
                metadata: MetadataEdit::Attach(&metadata),
            },
        )
        .unwrap();
        assert!(output.ends_with("version: 3.8.1\n...\n"));
    }

    #[test]
    fn test_crlf_document_keeps_its_line_endings() {
        let crlf = SECRET.replace('\n', "\r\n");
        let fields = sealed();
        let metadata = metadata();
        let protected = rewrite_document(
            &crlf,
            &RewriteRequest {
                source: ManifestKind::Secret,
                target: ManifestKind::SopsSecret,
                fields: &fields,
                metadata: MetadataEdit::Attach(&metadata),
            },
        )
        .unwrap();
        assert_eq!(protected.matches('\n').count(), protected.matches("\r\n").count());
        assert!(protected.ends_with("    version: 3.8.1\r\n"));

        let plain: FieldSet = [SecretField::new(
            FieldGroup::StringData,
            "password",
            "supersecretpassword123",
        )]
        .into_iter()
        .collect();
        let revealed = rewrite_document(
            &protected,
            &RewriteRequest {
                source: ManifestKind::SopsSecret,
                target: ManifestKind::Secret,
                fields: &plain,
                metadata: MetadataEdit::Remove,
            },
        )
        .unwrap();
        assert_eq!(revealed, crlf);
    }

    #[test]
    fn test_line_ending_detection() {
        assert_eq!(line_ending("kind: Secret\r\ndata:\n"), "\r\n");
        assert_eq!(line_ending("kind: Secret\n"), "\n");
        assert_eq!(line_ending("kind: Secret"), "\n");
        assert_eq!(with_line_ending("a: |\n  x\n", "\r\n"), "a: |\r\n  x\r\n");
    }

    #[test]
    fn test_flow_style_document_is_rejected() {
        let fields = sealed();
        let result = rewrite_document(
            "{kind: Secret, stringData: {password: x}}\n",
            &RewriteRequest {
                source: ManifestKind::Secret,
                target: ManifestKind::SopsSecret,
                fields: &fields,
                metadata: MetadataEdit::Keep,
            },
        );
        assert_eq!(result, Err(RewriteError::MissingEntry("kind".to_string())));
    }
}
