//! Structural diffs between JSON values
//!
//! Objects are compared member by member (in key order), arrays element by
//! element by index. Every differing leaf becomes one [`Change`].

use crate::error::CompareError;
use inplace_document::FieldPath;
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

/// Default depth past which [`StructuralDiff`] compares whole subtrees
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Default number of changes rendered by [`Diff`]'s `Display`
pub const DEFAULT_MAX_RENDERED: usize = 16;

/// One differing location
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    /// Where the values differ
    pub path: FieldPath,
    /// Value on the current side (`None` if absent)
    pub current: Option<Value>,
    /// Value on the desired side (`None` if absent)
    pub desired: Option<Value>,
}

impl Change {
    fn new(path: FieldPath, current: Option<&Value>, desired: Option<&Value>) -> Self {
        Self {
            path,
            current: current.cloned(),
            desired: desired.cloned(),
        }
    }
}

impl Display for Change {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} -> {}",
            self.path,
            render(self.current.as_ref()),
            render(self.desired.as_ref())
        )
    }
}

fn render(value: Option<&Value>) -> String {
    value.map_or_else(|| "<absent>".to_string(), Value::to_string)
}

/// Result of comparing two values
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diff {
    changes: Vec<Change>,
    max_rendered: usize,
}

impl Diff {
    /// Create diff from a list of changes
    #[must_use]
    pub fn new(changes: Vec<Change>) -> Self {
        Self {
            changes,
            max_rendered: DEFAULT_MAX_RENDERED,
        }
    }

    /// Limit the number of changes rendered by `Display`
    #[must_use]
    pub fn with_max_rendered(mut self, max_rendered: usize) -> Self {
        self.max_rendered = max_rendered;
        self
    }

    /// Check if both sides were equal
    #[inline]
    #[must_use]
    pub fn is_equal(&self) -> bool {
        self.changes.is_empty()
    }

    /// Get the differing locations
    #[inline]
    #[must_use]
    pub fn changes(&self) -> &[Change] {
        &self.changes
    }
}

impl Display for Diff {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let shown = self.changes.len().min(self.max_rendered.max(1));
        for (i, change) in self.changes.iter().take(shown).enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{change}")?;
        }
        let hidden = self.changes.len() - shown;
        if hidden > 0 {
            write!(f, "; ... and {hidden} more")?;
        }
        Ok(())
    }
}

/// Renders the difference between two values
///
/// Implementations must report equality exactly: [`Diff::is_equal`] is true
/// if and only if the values are structurally equal.
pub trait DiffRenderer: Send + Sync {
    /// Compare `current` against `desired`
    fn diff(&self, current: &Value, desired: &Value) -> Result<Diff, CompareError>;
}

impl<R: DiffRenderer + ?Sized> DiffRenderer for Box<R> {
    fn diff(&self, current: &Value, desired: &Value) -> Result<Diff, CompareError> {
        (**self).diff(current, desired)
    }
}

impl<R: DiffRenderer + ?Sized> DiffRenderer for Arc<R> {
    fn diff(&self, current: &Value, desired: &Value) -> Result<Diff, CompareError> {
        (**self).diff(current, desired)
    }
}

/// Default [`DiffRenderer`] walking both trees in lockstep
#[derive(Debug, Clone, Copy)]
pub struct StructuralDiff {
    max_depth: usize,
    max_rendered: usize,
}

impl Default for StructuralDiff {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_rendered: DEFAULT_MAX_RENDERED,
        }
    }
}

impl StructuralDiff {
    /// Create renderer with default limits
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set depth past which whole subtrees are compared
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set how many changes the produced diffs render
    #[must_use]
    pub fn with_max_rendered(mut self, max_rendered: usize) -> Self {
        self.max_rendered = max_rendered;
        self
    }

    fn walk(
        &self,
        path: &FieldPath,
        current: Option<&Value>,
        desired: Option<&Value>,
        out: &mut Vec<Change>,
    ) {
        // Past the depth limit whole subtrees are compared and reported as one change
        if path.len() >= self.max_depth {
            if current != desired {
                out.push(Change::new(path.clone(), current, desired));
            }
            return;
        }

        match (current, desired) {
            (Some(Value::Object(a)), Some(Value::Object(b))) => {
                let keys: BTreeSet<&String> = a.keys().chain(b.keys()).collect();
                for key in keys {
                    self.walk(&path.field(key.as_str()), a.get(key), b.get(key), out);
                }
            }
            (Some(Value::Array(a)), Some(Value::Array(b))) => {
                for i in 0..a.len().max(b.len()) {
                    self.walk(&path.index(i), a.get(i), b.get(i), out);
                }
            }
            (a, b) if a == b => {}
            (a, b) => out.push(Change::new(path.clone(), a, b)),
        }
    }
}

impl DiffRenderer for StructuralDiff {
    fn diff(&self, current: &Value, desired: &Value) -> Result<Diff, CompareError> {
        let mut changes = Vec::new();
        self.walk(&FieldPath::root(), Some(current), Some(desired), &mut changes);
        Ok(Diff::new(changes).with_max_rendered(self.max_rendered))
    }
}
