//! Resource documents for in-place update feasibility checks
//!
//! Semi-structured resources held in a canonical serialized form and a
//! decoded structured form that are never allowed to diverge.
//!
//! # Core Concepts
//!
//! - [`ResourceDocument`]: one subject resource (Machine, bootstrap config,
//!   infrastructure machine) whose only diffable region is `spec`
//! - [`TypeIdentity`]: apiVersion + kind carried on every document
//! - [`ContentHash`]: 32-byte Blake3 hash of the canonical form
//! - [`FieldPath`]: addressing within a document, used when rendering diffs
//!
//! # Example
//!
//! ```rust
//! use inplace_document::ResourceDocument;
//! use serde_json::json;
//!
//! let doc = ResourceDocument::from_value(json!({
//!     "apiVersion": "cluster.x-k8s.io/v1beta2",
//!     "kind": "Machine",
//!     "metadata": {"name": "m-1", "namespace": "default"},
//!     "spec": {"version": "v1.31.0"}
//! }))
//! .unwrap();
//!
//! assert_eq!(doc.key().to_string(), "default/m-1");
//! assert_eq!(doc.spec().unwrap()["version"], "v1.31.0");
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod document;
mod hash;
mod identity;
mod path;

pub use document::{DocumentError, ResourceDocument, SPEC_FIELD};
pub use hash::ContentHash;
pub use identity::{ObjectKey, TypeIdentity};
pub use path::FieldPath;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
