//! Error types for the feasibility gate
//!
//! Ineligibility is never an error: it is reported through
//! [`Decision`](crate::Decision). Errors here are faults:
//! - Configuration faults (more handlers than supported, invalid settings)
//! - Operational faults (collaborator failures, malformed patches,
//!   comparator faults, deadline expiry)

use crate::types::{Side, SubjectResource};
use inplace_compare::CompareError;
use inplace_document::DocumentError;
use inplace_patch::PatchError;

/// Main feasibility error type
#[derive(Debug, thiserror::Error)]
pub enum FeasibilityError {
    /// More handlers registered than the gate supports
    #[error(
        "found multiple CanUpdateMachine hooks ({}) (more than one is not supported yet)",
        .handlers.join(",")
    )]
    MultipleExtensions { handlers: Vec<String> },

    /// Extension discovery failed
    #[error("failed to get CanUpdateMachine extensions: {0:#}")]
    DiscoverExtensions(#[source] anyhow::Error),

    /// Building the request failed
    #[error("failed to generate CanUpdateMachine request: {0}")]
    CreateRequest(#[from] SnapshotError),

    /// Extension call failed
    #[error("failed to call CanUpdateMachine extension {handler}: {source:#}")]
    CallExtension {
        handler: String,
        source: anyhow::Error,
    },

    /// A returned patch could not be applied
    #[error(
        "failed to apply patches from extension {handler} to the CanUpdateMachine request: {subject}: {source}"
    )]
    ApplyPatches {
        handler: String,
        subject: SubjectResource,
        source: PatchError,
    },

    /// The comparator faulted
    #[error(
        "failed to compare current and desired objects after calling extension {handler}: failed to match {kind}: {source}"
    )]
    Compare {
        handler: String,
        kind: String,
        source: CompareError,
    },

    /// The evaluation deadline passed
    #[error("{operation} exceeded the evaluation deadline")]
    Timeout { operation: String },

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl FeasibilityError {
    /// Check if the error stems from configuration rather than operation
    #[inline]
    #[must_use]
    pub fn is_configuration_fault(&self) -> bool {
        matches!(self, Self::MultipleExtensions { .. } | Self::Config(_))
    }

    /// Check if re-running the evaluation may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::DiscoverExtensions(_) | Self::CallExtension { .. } | Self::Timeout { .. } => true,
            Self::CreateRequest(inner) => inner.is_retryable(),
            _ => false,
        }
    }

    /// Create timeout error
    #[inline]
    pub fn timeout(operation: impl Into<String>) -> Self {
        Self::Timeout {
            operation: operation.into(),
        }
    }

    /// Handler involved in the fault, if any
    #[must_use]
    pub fn handler(&self) -> Option<&str> {
        match self {
            Self::CallExtension { handler, .. }
            | Self::ApplyPatches { handler, .. }
            | Self::Compare { handler, .. } => Some(handler),
            _ => None,
        }
    }
}

/// Request construction errors
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// Copying labels and annotations from desired to current failed
    #[error("failed to sync labels and annotations of current {subject}: {source}")]
    SyncMetadata {
        subject: SubjectResource,
        source: DocumentError,
    },

    /// Dry-run normalization failed
    #[error("failed to perform dry-run apply of {side} {subject}: {source:#}")]
    Normalize {
        subject: SubjectResource,
        side: Side,
        source: anyhow::Error,
    },

    /// Bootstrap config preparation failed
    #[error("failed to prepare bootstrap configs for diff: {0:#}")]
    PrepareForDiff(#[source] anyhow::Error),

    /// Stripping a document down to its diffable fields failed
    #[error("failed to clean up {side} {subject}: {source}")]
    Cleanup {
        subject: SubjectResource,
        side: Side,
        source: DocumentError,
    },

    /// The evaluation deadline passed
    #[error("{operation} exceeded the evaluation deadline")]
    Timeout { operation: String },
}

impl SnapshotError {
    /// Check if rebuilding the request may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Normalize { .. } | Self::PrepareForDiff(_) | Self::Timeout { .. }
        )
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Configuration could not be parsed
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// A setting is out of range
    #[error("invalid {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

impl ConfigError {
    /// Create invalid-setting error
    #[inline]
    pub fn invalid(field: &'static str, reason: &'static str) -> Self {
        Self::Invalid { field, reason }
    }
}
