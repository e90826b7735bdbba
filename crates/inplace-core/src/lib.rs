//! In-place update feasibility gate
//!
//! Decides whether a Machine can be moved to its desired state by mutating
//! it in place, or must be replaced:
//! - Builds a normalized current/desired request from the caller's inputs
//! - Negotiates with registered CanUpdateMachine extensions, applying the
//!   spec patches they propose
//! - Reports eligibility, or the per-resource reasons it was refused
//!
//! # Example
//!
//! ```rust,ignore
//! use inplace_core::{FeasibilityConfig, FeasibilityGate};
//! use std::sync::Arc;
//!
//! # async fn example(
//! #     normalizer: Arc<dyn inplace_core::ObjectNormalizer>,
//! #     preparer: Arc<dyn inplace_core::BootstrapConfigPreparer>,
//! #     client: Arc<dyn inplace_core::ExtensionClient>,
//! #     machine: inplace_document::ResourceDocument,
//! #     up_to_date: inplace_core::UpToDateResult,
//! # ) -> Result<(), inplace_core::FeasibilityError> {
//! let config = FeasibilityConfig::new().with_in_place_updates(true);
//! let gate = FeasibilityGate::new(config, normalizer, preparer, client)?;
//!
//! let decision = gate.evaluate(&machine, &up_to_date).await?;
//! if !decision.is_eligible() {
//!     println!("rollout required: {:?}", decision.reasons());
//! }
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

// Core modules
pub mod collaborators;
pub mod config;
pub mod deadline;
pub mod error;
pub mod gate;
pub mod orchestrator;
pub mod snapshot;
pub mod types;

// Re-exports for convenience
pub use collaborators::{BootstrapConfigPreparer, ExtensionClient, ObjectNormalizer};
pub use config::{FeasibilityConfig, DEFAULT_FIELD_MANAGER};
pub use deadline::{Deadline, Expired};
pub use error::{ConfigError, FeasibilityError, SnapshotError};
pub use gate::{Decision, FeasibilityGate, IneligibleReason};
pub use orchestrator::{NegotiationOrchestrator, NegotiationOutcome, NegotiationState};
pub use snapshot::{IncompleteInput, SnapshotBuilder, SnapshotInputs};
pub use types::{
    CanUpdateMachineRequest, CanUpdateMachineResponse, RequestObjects, Side, SubjectResource,
    UpToDateResult, MACHINE_KIND,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with the feasibility gate
    pub use crate::{
        BootstrapConfigPreparer, CanUpdateMachineRequest, CanUpdateMachineResponse, Decision,
        ExtensionClient, FeasibilityConfig, FeasibilityError, FeasibilityGate, ObjectNormalizer,
        UpToDateResult,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
