//! Spec comparison
//!
//! Only the `spec` region of a document takes part in the feasibility
//! decision. Both sides are wrapped in a `{"spec": ...}` envelope before
//! diffing, so an absent spec and an empty envelope compare as equal and
//! rendered paths start with `spec.`.

use crate::diff::{Diff, DiffRenderer, StructuralDiff};
use crate::error::CompareError;
use inplace_document::{ResourceDocument, SPEC_FIELD};
use serde_json::{Map, Value};
use tracing::trace;

/// Outcome of comparing two specs
#[derive(Debug, Clone, PartialEq)]
pub struct SpecMatch {
    diff: Diff,
}

impl SpecMatch {
    /// Check if the specs are equal
    #[inline]
    #[must_use]
    pub fn is_equal(&self) -> bool {
        self.diff.is_equal()
    }

    /// Get the rendered difference
    #[inline]
    #[must_use]
    pub fn diff(&self) -> &Diff {
        &self.diff
    }

    /// Human-readable reason, or `None` if the specs are equal
    ///
    /// `subject` names the resource, e.g. `Machine` or the document kind.
    #[must_use]
    pub fn reason(&self, subject: &str) -> Option<String> {
        (!self.is_equal()).then(|| format!("{subject} cannot be updated in-place: {}", self.diff))
    }
}

/// Compares the spec envelopes of two documents
#[derive(Debug, Clone, Default)]
pub struct SpecComparator<R = StructuralDiff> {
    renderer: R,
}

impl SpecComparator {
    /// Create comparator using [`StructuralDiff`]
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl<R: DiffRenderer> SpecComparator<R> {
    /// Create comparator using a custom renderer
    #[inline]
    #[must_use]
    pub fn with_renderer(renderer: R) -> Self {
        Self { renderer }
    }

    /// Compare the spec of `current` against the spec of `desired`
    pub fn matches(
        &self,
        current: &ResourceDocument,
        desired: &ResourceDocument,
    ) -> Result<SpecMatch, CompareError> {
        if current.kind() != desired.kind() {
            return Err(CompareError::KindMismatch {
                current: current.type_identity().to_string(),
                desired: desired.type_identity().to_string(),
            });
        }

        let diff = self
            .renderer
            .diff(&spec_envelope(current), &spec_envelope(desired))?;
        trace!(
            kind = %current.kind(),
            equal = diff.is_equal(),
            changes = diff.changes().len(),
            "Compared spec envelopes"
        );
        Ok(SpecMatch { diff })
    }
}

fn spec_envelope(document: &ResourceDocument) -> Value {
    let mut envelope = Map::new();
    if let Some(spec) = document.spec() {
        envelope.insert(SPEC_FIELD.to_string(), spec.clone());
    }
    Value::Object(envelope)
}
