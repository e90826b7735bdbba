//! Spec comparison for in-place update feasibility
//!
//! Decides whether the spec of a patched current document equals the spec
//! of its desired counterpart, and renders a readable difference when it
//! does not.
//!
//! # Core Concepts
//!
//! - [`SpecComparator`]: compares `{"spec": ...}` envelopes of two documents
//! - [`DiffRenderer`]: pluggable diff rendering, [`StructuralDiff`] by default
//! - [`Diff`]: list of differing paths, rendered one change per clause

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod comparator;
mod diff;
mod error;

pub use comparator::{SpecComparator, SpecMatch};
pub use diff::{Change, Diff, DiffRenderer, StructuralDiff, DEFAULT_MAX_DEPTH, DEFAULT_MAX_RENDERED};
pub use error::CompareError;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
