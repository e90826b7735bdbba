//! Patch application errors

use inplace_document::DocumentError;
use thiserror::Error;

/// Errors that can occur while applying a [`Patch`](crate::Patch)
///
/// Whenever one of these is returned the target document is unchanged.
#[derive(Debug, Error)]
pub enum PatchError {
    /// Patch carries no format
    #[error("failed to apply patch: patchType is not set")]
    TypeNotSet,

    /// Patch carries a format the engine does not support
    #[error("failed to apply patch: unknown patchType {0}")]
    UnknownType(String),

    /// RFC 6902 payload is not a valid operation list
    #[error("failed to apply patch: error decoding json patch (RFC6902): {source}")]
    DecodeJsonPatch {
        source: serde_json::Error,
        patch: String,
    },

    /// RFC 6902 operations could not be applied
    #[error("failed to apply patch: error applying json patch (RFC6902): {source}")]
    ApplyJsonPatch {
        source: json_patch::PatchError,
        patch: String,
    },

    /// RFC 7386 payload is not valid JSON
    #[error("failed to apply patch: error applying json merge patch (RFC7386): {source}")]
    ApplyMergePatch {
        source: serde_json::Error,
        patch: String,
    },

    /// The patch library panicked; the panic was contained
    #[error("failed to apply patch: observed a panic: {message}")]
    Panicked { message: String, patch: String },

    /// The current document could not be decoded as a patch target
    #[error("failed to apply patch: error decoding target document: {0}")]
    Target(#[source] serde_json::Error),

    /// The patched result could not be copied back into the document
    #[error("failed to apply patch to object: {0}")]
    CopySpec(#[source] DocumentError),
}

impl PatchError {
    /// Offending patch payload, when one was decoded
    #[must_use]
    pub fn payload(&self) -> Option<&str> {
        match self {
            Self::DecodeJsonPatch { patch, .. }
            | Self::ApplyJsonPatch { patch, .. }
            | Self::ApplyMergePatch { patch, .. }
            | Self::Panicked { patch, .. } => Some(patch),
            _ => None,
        }
    }

    /// Check if the error comes from a malformed or unsupported patch
    /// rather than from the document it targeted
    #[must_use]
    pub fn is_malformed_patch(&self) -> bool {
        matches!(
            self,
            Self::TypeNotSet
                | Self::UnknownType(_)
                | Self::DecodeJsonPatch { .. }
                | Self::ApplyMergePatch { .. }
        )
    }
}
