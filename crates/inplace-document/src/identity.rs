//! Type and object identity of a document

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Type identity (apiVersion + kind)
///
/// Carried on every document so an extension can decode opaque payloads.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeIdentity {
    /// API group and version, e.g. `cluster.x-k8s.io/v1beta2`
    pub api_version: String,
    /// Kind, e.g. `Machine`
    pub kind: String,
}

impl TypeIdentity {
    /// Create new type identity
    #[inline]
    #[must_use]
    pub fn new(api_version: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            api_version: api_version.into(),
            kind: kind.into(),
        }
    }
}

impl Display for TypeIdentity {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}, Kind={}", self.api_version, self.kind)
    }
}

/// Namespaced object name, rendered as `namespace/name`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ObjectKey {
    /// Namespace (empty for cluster-scoped objects)
    pub namespace: String,
    /// Name
    pub name: String,
}

impl Display for ObjectKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}/{}", self.namespace, self.name)
        }
    }
}
