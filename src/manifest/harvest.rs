//! # Field Harvester
//!
//! Extracts the sensitive `data` and `stringData` groups from a parsed document,
//! keeping group membership, per-group key order and multi-line values intact.

use crate::sops::detection::{is_ciphertext, is_stored_encrypted};
use serde_yaml::Value;
use std::fmt;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Sensitive field group of a Secret
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldGroup {
    /// Base64-encoded values
    Data,
    /// Plaintext string values
    StringData,
}

impl FieldGroup {
    pub const ALL: [FieldGroup; 2] = [FieldGroup::Data, FieldGroup::StringData];

    /// Top-level manifest key of this group
    pub fn as_str(self) -> &'static str {
        match self {
            FieldGroup::Data => "data",
            FieldGroup::StringData => "stringData",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        FieldGroup::ALL.into_iter().find(|group| group.as_str() == key)
    }
}

impl fmt::Display for FieldGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One sensitive value, wiped from memory on drop
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SecretField {
    #[zeroize(skip)]
    pub group: FieldGroup,
    pub key: String,
    pub value: String,
}

impl SecretField {
    pub fn new(group: FieldGroup, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            group,
            key: key.into(),
            value: value.into(),
        }
    }
}

impl fmt::Debug for SecretField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretField")
            .field("group", &self.group)
            .field("key", &self.key)
            .field("value", &"<redacted>")
            .finish()
    }
}

/// Ordered set of harvested `(group, key, value)` triples
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSet {
    fields: Vec<SecretField>,
}

impl FieldSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: SecretField) {
        self.fields.push(field);
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SecretField> {
        self.fields.iter()
    }

    /// Fields of one group, in harvested order
    pub fn in_group(&self, group: FieldGroup) -> impl Iterator<Item = &SecretField> + '_ {
        self.fields.iter().filter(move |field| field.group == group)
    }

    /// Value of `group.key`, if present
    pub fn get(&self, group: FieldGroup, key: &str) -> Option<&str> {
        self.in_group(group)
            .find(|field| field.key == key)
            .map(|field| field.value.as_str())
    }

    /// Groups in order of first appearance
    pub fn groups(&self) -> Vec<FieldGroup> {
        let mut groups = Vec::with_capacity(FieldGroup::ALL.len());
        for field in &self.fields {
            if !groups.contains(&field.group) {
                groups.push(field.group);
            }
        }
        groups
    }

    /// Compare group by group, ignoring how the groups interleave
    pub fn same_groups_as(&self, other: &FieldSet) -> bool {
        FieldGroup::ALL
            .into_iter()
            .all(|group| self.in_group(group).eq(other.in_group(group)))
    }
}

impl FromIterator<SecretField> for FieldSet {
    fn from_iter<T: IntoIterator<Item = SecretField>>(iter: T) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a FieldSet {
    type Item = &'a SecretField;
    type IntoIter = std::slice::Iter<'a, SecretField>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

/// Structural problems in the sensitive field groups
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HarvestError {
    #[error("`{group}` must be a mapping")]
    GroupNotMapping { group: FieldGroup },
    #[error("`{group}` contains a non-string key")]
    NonStringKey { group: FieldGroup },
    #[error("`{group}.{key}` must be a string value")]
    NonStringValue { group: FieldGroup, key: String },
    #[error("duplicate key: {detail}")]
    DuplicateKey { detail: String },
    #[error("`{group}.{key}` is already encrypted but the document is still a Secret")]
    CiphertextInSecret { group: FieldGroup, key: String },
    #[error("`{group}.{key}` is not encrypted but the document is a SopsSecret")]
    PlaintextInSopsSecret { group: FieldGroup, key: String },
    #[error("SopsSecret carries encrypted values but no sops metadata block")]
    MissingSopsMetadata,
}

/// Harvest both sensitive groups in document order
///
/// Absent or null groups harvest to nothing. Values are taken verbatim, so block
/// scalars keep their newlines.
pub fn harvest_fields(document: &Value) -> Result<FieldSet, HarvestError> {
    let mut fields = FieldSet::new();
    let Some(mapping) = document.as_mapping() else {
        return Ok(fields);
    };

    for (name, group_value) in mapping {
        let Some(group) = name.as_str().and_then(FieldGroup::from_key) else {
            continue;
        };

        let entries = match group_value {
            Value::Null => continue,
            Value::Mapping(entries) => entries,
            _ => return Err(HarvestError::GroupNotMapping { group }),
        };

        for (key, value) in entries {
            let key = key.as_str().ok_or(HarvestError::NonStringKey { group })?;
            let value = value
                .as_str()
                .ok_or_else(|| HarvestError::NonStringValue {
                    group,
                    key: key.to_string(),
                })?;
            fields.push(SecretField::new(group, key, value));
        }
    }

    Ok(fields)
}

/// Harvest a `Secret` for encryption; no value may already be ciphertext
pub fn harvest_plaintext(document: &Value) -> Result<FieldSet, HarvestError> {
    let fields = harvest_fields(document)?;
    if let Some(field) = fields.iter().find(|field| is_ciphertext(&field.value)) {
        return Err(HarvestError::CiphertextInSecret {
            group: field.group,
            key: field.key.clone(),
        });
    }
    Ok(fields)
}

/// Harvest a `SopsSecret` for decryption; every value must be ciphertext or empty
pub fn harvest_ciphertext(document: &Value) -> Result<FieldSet, HarvestError> {
    let fields = harvest_fields(document)?;
    if let Some(field) = fields.iter().find(|field| !is_stored_encrypted(&field.value)) {
        return Err(HarvestError::PlaintextInSopsSecret {
            group: field.group,
            key: field.key.clone(),
        });
    }
    Ok(fields)
}
