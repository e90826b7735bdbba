//! Spec-restricted patch application
//!
//! Applies the patches an update extension proposes to the documents of a
//! feasibility request.
//!
//! # Core Concepts
//!
//! - [`Patch`]: (format, payload) pair as it travels on the wire
//! - [`PatchEngine`]: applies a patch, copying back only `spec`
//! - [`PatchError`]: why a patch was rejected; the target is then untouched
//!
//! # Example
//!
//! ```rust
//! use inplace_document::ResourceDocument;
//! use inplace_patch::{Patch, PatchEngine};
//! use serde_json::json;
//!
//! let mut doc = ResourceDocument::from_value(json!({
//!     "apiVersion": "cluster.x-k8s.io/v1beta2",
//!     "kind": "Machine",
//!     "metadata": {"name": "m-1"},
//!     "spec": {"version": "v1.30.0"}
//! }))
//! .unwrap();
//!
//! let patch = Patch::merge_patch(&json!({"spec": {"version": "v1.31.0"}}));
//! assert!(PatchEngine::new().apply(&mut doc, &patch).unwrap());
//! assert_eq!(doc.spec().unwrap()["version"], "v1.31.0");
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod engine;
mod error;
mod patch;

pub use engine::{catch_patch_panic, PatchEngine};
pub use error::PatchError;
pub use patch::{Patch, PatchType};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
