//! Patch engine
//!
//! Applies one extension [`Patch`] to a [`ResourceDocument`] and copies back
//! only the `spec` subtree of the result. Everything outside `spec` is
//! preserved from the document as it was before the patch.
//!
//! The underlying patch routines run inside a panic guard: a panic while
//! patching is contained and reported as [`PatchError::Panicked`].

use crate::error::PatchError;
use crate::patch::{Patch, PatchType};
use inplace_document::ResourceDocument;
use serde_json::Value;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, error, trace, warn};

/// Spec-restricted patch applier
///
/// Stateless; a single engine can be shared across evaluations.
#[derive(Debug, Clone, Copy, Default)]
pub struct PatchEngine;

impl PatchEngine {
    /// Create new patch engine
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Apply `patch` to `document`
    ///
    /// Returns `Ok(true)` if a non-empty patch was applied, `Ok(false)` if
    /// the patch was empty (`[]` for JSON Patch; no payload or `{}` for
    /// JSON Merge Patch). On error `document` is left untouched.
    pub fn apply(
        &self,
        document: &mut ResourceDocument,
        patch: &Patch,
    ) -> Result<bool, PatchError> {
        apply_with(&Rfc, document, patch)
    }
}

/// Patch routines invoked under the panic guard
trait PatchRoutines {
    fn patch(
        &self,
        target: &mut Value,
        operations: &[json_patch::PatchOperation],
    ) -> Result<(), json_patch::PatchError>;

    fn merge(&self, target: &mut Value, overlay: &Value);
}

/// RFC 6902 / RFC 7386 routines from `json-patch`
struct Rfc;

impl PatchRoutines for Rfc {
    fn patch(
        &self,
        target: &mut Value,
        operations: &[json_patch::PatchOperation],
    ) -> Result<(), json_patch::PatchError> {
        json_patch::patch(target, operations)
    }

    fn merge(&self, target: &mut Value, overlay: &Value) {
        json_patch::merge(target, overlay);
    }
}

fn apply_with(
    routines: &impl PatchRoutines,
    document: &mut ResourceDocument,
    patch: &Patch,
) -> Result<bool, PatchError> {
    let patched = match &patch.patch_type {
        None => return Err(PatchError::TypeNotSet),
        Some(PatchType::Unknown(other)) => return Err(PatchError::UnknownType(other.clone())),
        Some(PatchType::JsonPatch) => match apply_json_patch(routines, document, patch)? {
            Some(patched) => patched,
            None => return Ok(false),
        },
        Some(PatchType::JsonMergePatch) => match apply_merge_patch(routines, document, patch)? {
            Some(patched) => patched,
            None => return Ok(false),
        },
    };

    let before = *document.hash();
    document.patch_spec(&patched).map_err(|e| {
        error!(
            kind = %document.kind(),
            error = %e,
            "Failed to copy patched spec back into document"
        );
        PatchError::CopySpec(e)
    })?;

    debug!(
        kind = %document.kind(),
        before = %before.short(),
        after = %document.hash().short(),
        "Applied patch to document spec"
    );
    Ok(true)
}

/// Returns `None` for an empty operation list
fn apply_json_patch(
    routines: &impl PatchRoutines,
    document: &ResourceDocument,
    patch: &Patch,
) -> Result<Option<Vec<u8>>, PatchError> {
    let payload = patch.payload().into_owned();
    trace!(kind = %document.kind(), patch = %payload, "Applying JSON patch");

    let operations: json_patch::Patch =
        serde_json::from_slice(&patch.patch).map_err(|source| {
            error!(patch = %payload, error = %source, "Failed to decode JSON patch");
            PatchError::DecodeJsonPatch {
                source,
                patch: payload.clone(),
            }
        })?;
    if operations.0.is_empty() {
        return Ok(None);
    }

    let mut target = decode_target(document)?;
    catch_patch_panic(&payload, || routines.patch(&mut target, &operations.0))?.map_err(
        |source| {
            error!(patch = %payload, error = %source, "Failed to apply JSON patch");
            PatchError::ApplyJsonPatch {
                source,
                patch: payload.clone(),
            }
        },
    )?;
    encode_target(&target).map(Some)
}

/// Returns `None` for an absent or `{}` overlay
fn apply_merge_patch(
    routines: &impl PatchRoutines,
    document: &ResourceDocument,
    patch: &Patch,
) -> Result<Option<Vec<u8>>, PatchError> {
    let payload = patch.payload().into_owned();
    trace!(kind = %document.kind(), patch = %payload, "Applying JSON merge patch");

    if payload.trim().is_empty() {
        return Ok(None);
    }
    let overlay: Value = serde_json::from_slice(&patch.patch).map_err(|source| {
        error!(patch = %payload, error = %source, "Failed to decode JSON merge patch");
        PatchError::ApplyMergePatch {
            source,
            patch: payload.clone(),
        }
    })?;
    if overlay.as_object().is_some_and(serde_json::Map::is_empty) {
        return Ok(None);
    }

    let mut target = decode_target(document)?;
    catch_patch_panic(&payload, || routines.merge(&mut target, &overlay))?;
    encode_target(&target).map(Some)
}

fn decode_target(document: &ResourceDocument) -> Result<Value, PatchError> {
    serde_json::from_slice(document.raw()).map_err(PatchError::Target)
}

fn encode_target(target: &Value) -> Result<Vec<u8>, PatchError> {
    serde_json::to_vec(target).map_err(PatchError::Target)
}

/// Run `f`, converting a panic into [`PatchError::Panicked`]
///
/// `payload` is the patch text attached to the error and the log record.
pub fn catch_patch_panic<T>(payload: &str, f: impl FnOnce() -> T) -> Result<T, PatchError> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|cause| {
        let message = panic_message(cause.as_ref());
        warn!(
            patch = %payload,
            panic = %message,
            backtrace = %std::backtrace::Backtrace::force_capture(),
            "Observed a panic when applying patch"
        );
        PatchError::Panicked {
            message,
            patch: payload.to_string(),
        }
    })
}

fn panic_message(cause: &(dyn Any + Send)) -> String {
    if let Some(message) = cause.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = cause.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
