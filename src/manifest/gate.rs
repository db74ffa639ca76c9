//! # Annotation Gate
//!
//! Decides whether a document opted into encryption through the marker annotation.

use crate::constants::{DEFAULT_ANNOTATION_KEY, DEFAULT_ANNOTATION_VALUE};
use serde_yaml::Value;

/// Annotation key and the exact value that marks a document for protection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationMarker {
    pub key: String,
    pub value: String,
}

impl Default for AnnotationMarker {
    fn default() -> Self {
        Self {
            key: DEFAULT_ANNOTATION_KEY.to_string(),
            value: DEFAULT_ANNOTATION_VALUE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    InScope,
    OutOfScope,
}

/// Marker check, optionally disabled so every Secret is in scope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationGate {
    marker: AnnotationMarker,
    required: bool,
}

impl AnnotationGate {
    pub fn new(marker: AnnotationMarker, required: bool) -> Self {
        Self { marker, required }
    }

    pub fn marker(&self) -> &AnnotationMarker {
        &self.marker
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Evaluate the gate against `metadata.annotations`
    ///
    /// The annotation value must be a string equal to the marker value; a YAML
    /// boolean `true` does not match `"true"`.
    pub fn evaluate(&self, document: &Value) -> GateDecision {
        if !self.required {
            return GateDecision::InScope;
        }

        let matches = document
            .get("metadata")
            .and_then(|metadata| metadata.get("annotations"))
            .and_then(|annotations| annotations.get(self.marker.key.as_str()))
            .and_then(Value::as_str)
            == Some(self.marker.value.as_str());

        if matches {
            GateDecision::InScope
        } else {
            GateDecision::OutOfScope
        }
    }
}
