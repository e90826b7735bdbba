//! Core types for the feasibility gate
//!
//! Defines:
//! - The up-to-date bundle handed in by the caller
//! - CanUpdateMachine request and response wire types
//! - Subject resource addressing

use inplace_document::ResourceDocument;
use inplace_patch::Patch;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Kind reported for the node record in reasons and errors
pub const MACHINE_KIND: &str = "Machine";

/// One of the three resources an evaluation negotiates over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubjectResource {
    /// The Machine node record
    Machine,
    /// The bootstrap config (KubeadmConfig)
    BootstrapConfig,
    /// The infrastructure machine
    InfrastructureMachine,
}

impl SubjectResource {
    /// All subjects, in request order
    pub const ALL: [Self; 3] = [
        Self::Machine,
        Self::BootstrapConfig,
        Self::InfrastructureMachine,
    ];

    /// Field name in the wire protocol
    #[inline]
    #[must_use]
    pub fn field_name(&self) -> &'static str {
        match self {
            Self::Machine => "machine",
            Self::BootstrapConfig => "bootstrapConfig",
            Self::InfrastructureMachine => "infrastructureMachine",
        }
    }
}

impl Display for SubjectResource {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.field_name())
    }
}

/// Which side of a state pair a document belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// Observed state
    Current,
    /// Target state
    Desired,
}

impl Display for Side {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Current => f.write_str("current"),
            Self::Desired => f.write_str("desired"),
        }
    }
}

/// Desired and current state computed by the caller's up-to-date check
///
/// Any member may be missing; the gate treats a missing member as
/// incomplete input.
#[derive(Debug, Clone, Default)]
pub struct UpToDateResult {
    /// Desired Machine
    pub desired_machine: Option<ResourceDocument>,
    /// Current infrastructure machine
    pub current_infra_machine: Option<ResourceDocument>,
    /// Desired infrastructure machine
    pub desired_infra_machine: Option<ResourceDocument>,
    /// Current bootstrap config
    pub current_bootstrap_config: Option<ResourceDocument>,
    /// Desired bootstrap config
    pub desired_bootstrap_config: Option<ResourceDocument>,
}

impl UpToDateResult {
    /// Create empty result
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With desired Machine
    #[inline]
    #[must_use]
    pub fn with_desired_machine(mut self, doc: ResourceDocument) -> Self {
        self.desired_machine = Some(doc);
        self
    }

    /// With current and desired bootstrap config
    #[inline]
    #[must_use]
    pub fn with_bootstrap_config(
        mut self,
        current: ResourceDocument,
        desired: ResourceDocument,
    ) -> Self {
        self.current_bootstrap_config = Some(current);
        self.desired_bootstrap_config = Some(desired);
        self
    }

    /// With current and desired infrastructure machine
    #[inline]
    #[must_use]
    pub fn with_infra_machine(mut self, current: ResourceDocument, desired: ResourceDocument) -> Self {
        self.current_infra_machine = Some(current);
        self.desired_infra_machine = Some(desired);
        self
    }
}

/// One side (current or desired) of a request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestObjects {
    /// Machine
    pub machine: ResourceDocument,
    /// Bootstrap config
    pub bootstrap_config: ResourceDocument,
    /// Infrastructure machine
    pub infrastructure_machine: ResourceDocument,
}

impl RequestObjects {
    /// Get the document of one subject
    #[inline]
    #[must_use]
    pub fn get(&self, subject: SubjectResource) -> &ResourceDocument {
        match subject {
            SubjectResource::Machine => &self.machine,
            SubjectResource::BootstrapConfig => &self.bootstrap_config,
            SubjectResource::InfrastructureMachine => &self.infrastructure_machine,
        }
    }

    /// Get the document of one subject, mutably
    #[inline]
    pub fn get_mut(&mut self, subject: SubjectResource) -> &mut ResourceDocument {
        match subject {
            SubjectResource::Machine => &mut self.machine,
            SubjectResource::BootstrapConfig => &mut self.bootstrap_config,
            SubjectResource::InfrastructureMachine => &mut self.infrastructure_machine,
        }
    }
}

/// Request sent to a CanUpdateMachine extension
///
/// `current` accumulates patches round by round; `desired` never changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanUpdateMachineRequest {
    /// Current state, patched as extensions respond
    pub current: RequestObjects,
    /// Desired state
    pub desired: RequestObjects,
}

/// Response from a CanUpdateMachine extension
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CanUpdateMachineResponse {
    /// Patch for the Machine
    #[serde(skip_serializing_if = "Option::is_none")]
    pub machine_patch: Option<Patch>,
    /// Patch for the bootstrap config
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bootstrap_config_patch: Option<Patch>,
    /// Patch for the infrastructure machine
    #[serde(skip_serializing_if = "Option::is_none")]
    pub infrastructure_machine_patch: Option<Patch>,
}

impl CanUpdateMachineResponse {
    /// Get the patch proposed for one subject, if defined
    #[must_use]
    pub fn patch_for(&self, subject: SubjectResource) -> Option<&Patch> {
        let patch = match subject {
            SubjectResource::Machine => self.machine_patch.as_ref(),
            SubjectResource::BootstrapConfig => self.bootstrap_config_patch.as_ref(),
            SubjectResource::InfrastructureMachine => self.infrastructure_machine_patch.as_ref(),
        };
        patch.filter(|p| p.is_defined())
    }

    /// With Machine patch
    #[inline]
    #[must_use]
    pub fn with_machine_patch(mut self, patch: Patch) -> Self {
        self.machine_patch = Some(patch);
        self
    }

    /// With bootstrap config patch
    #[inline]
    #[must_use]
    pub fn with_bootstrap_config_patch(mut self, patch: Patch) -> Self {
        self.bootstrap_config_patch = Some(patch);
        self
    }

    /// With infrastructure machine patch
    #[inline]
    #[must_use]
    pub fn with_infrastructure_machine_patch(mut self, patch: Patch) -> Self {
        self.infrastructure_machine_patch = Some(patch);
        self
    }
}
