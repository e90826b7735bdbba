//! Field paths for addressing within documents
//!
//! Provides [`FieldPath`] for naming a location inside a document's
//! structured form, e.g. `spec.template.containers[0].image`.

use std::fmt::{self, Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum PathSegment {
    Field(String),
    Index(usize),
}

/// Path within a document tree
///
/// Rendered with dots between fields and brackets for array indices.
///
/// # Examples
/// - `spec` + field `version` → `spec.version`
/// - `spec` + field `taints` + index `1` → `spec.taints[1]`
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldPath(Vec<PathSegment>);

impl FieldPath {
    /// Empty path (document root)
    #[inline]
    #[must_use]
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Path of a single top-level field
    #[inline]
    #[must_use]
    pub fn single(field: impl Into<String>) -> Self {
        Self(vec![PathSegment::Field(field.into())])
    }

    /// Get number of segments
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if path is empty (root)
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Append an object member, returning new path
    #[inline]
    #[must_use]
    pub fn field(&self, name: impl Into<String>) -> Self {
        let mut new = self.clone();
        new.0.push(PathSegment::Field(name.into()));
        new
    }

    /// Append an array index, returning new path
    #[inline]
    #[must_use]
    pub fn index(&self, index: usize) -> Self {
        let mut new = self.clone();
        new.0.push(PathSegment::Index(index));
        new
    }
}

impl Display for FieldPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, ".");
        }
        for (i, segment) in self.0.iter().enumerate() {
            match segment {
                PathSegment::Field(name) if i == 0 => write!(f, "{name}")?,
                PathSegment::Field(name) => write!(f, ".{name}")?,
                PathSegment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_renders_as_dot() {
        assert_eq!(FieldPath::root().to_string(), ".");
        assert!(FieldPath::root().is_empty());
    }

    #[test]
    fn fields_and_indices_render() {
        let path = FieldPath::single("spec")
            .field("taints")
            .index(1)
            .field("key");
        assert_eq!(path.to_string(), "spec.taints[1].key");
        assert_eq!(path.len(), 4);
    }
}
