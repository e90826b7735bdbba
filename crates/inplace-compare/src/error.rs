//! Comparison errors

use thiserror::Error;

/// Errors that can occur while comparing documents
#[derive(Debug, Error)]
pub enum CompareError {
    /// The two documents are not of the same type
    #[error("cannot compare {current} with {desired}")]
    KindMismatch { current: String, desired: String },

    /// A custom renderer failed
    #[error("failed to render diff: {0}")]
    Renderer(String),
}
