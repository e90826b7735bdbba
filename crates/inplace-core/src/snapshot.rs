//! Snapshot builder
//!
//! Turns the caller's Machine and up-to-date bundle into a
//! [`CanUpdateMachineRequest`]:
//! 1. Check every referenced object is present and type-consistent
//! 2. Copy labels and annotations from desired to current bootstrap config
//!    and infrastructure machine, so metadata drift never blocks an update
//! 3. Normalize through dry-run apply (desired Machine, current and desired
//!    infrastructure machine) and bootstrap-specific preparation
//! 4. Strip every document down to identity, metadata and spec

use crate::collaborators::{BootstrapConfigPreparer, ObjectNormalizer};
use crate::config::DEFAULT_FIELD_MANAGER;
use crate::deadline::Deadline;
use crate::error::SnapshotError;
use crate::types::{
    CanUpdateMachineRequest, RequestObjects, Side, SubjectResource, UpToDateResult,
};
use inplace_document::{ResourceDocument, TypeIdentity};
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

/// Why the inputs cannot form a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IncompleteInput {
    /// An object was not provided
    Missing {
        subject: SubjectResource,
        side: Side,
    },
    /// Current and desired are of different types
    TypeMismatch {
        subject: SubjectResource,
        current: TypeIdentity,
        desired: TypeIdentity,
    },
}

impl Display for IncompleteInput {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing { subject, side } => write!(f, "{side} {subject} is missing"),
            Self::TypeMismatch {
                subject,
                current,
                desired,
            } => write!(
                f,
                "{subject} type mismatch: current is {current}, desired is {desired}"
            ),
        }
    }
}

/// Complete, type-consistent inputs for one evaluation
#[derive(Debug, Clone)]
pub struct SnapshotInputs {
    machine: ResourceDocument,
    desired_machine: ResourceDocument,
    current_bootstrap_config: ResourceDocument,
    desired_bootstrap_config: ResourceDocument,
    current_infra_machine: ResourceDocument,
    desired_infra_machine: ResourceDocument,
}

impl SnapshotInputs {
    /// Collect inputs, reporting the first missing or mismatched object
    pub fn collect(
        machine: &ResourceDocument,
        up_to_date: &UpToDateResult,
    ) -> Result<Self, IncompleteInput> {
        let desired_machine = require(
            up_to_date.desired_machine.as_ref(),
            SubjectResource::Machine,
            Side::Desired,
        )?;
        let current_bootstrap_config = require(
            up_to_date.current_bootstrap_config.as_ref(),
            SubjectResource::BootstrapConfig,
            Side::Current,
        )?;
        let desired_bootstrap_config = require(
            up_to_date.desired_bootstrap_config.as_ref(),
            SubjectResource::BootstrapConfig,
            Side::Desired,
        )?;
        let current_infra_machine = require(
            up_to_date.current_infra_machine.as_ref(),
            SubjectResource::InfrastructureMachine,
            Side::Current,
        )?;
        let desired_infra_machine = require(
            up_to_date.desired_infra_machine.as_ref(),
            SubjectResource::InfrastructureMachine,
            Side::Desired,
        )?;

        check_types(SubjectResource::Machine, machine, desired_machine)?;
        check_types(
            SubjectResource::BootstrapConfig,
            current_bootstrap_config,
            desired_bootstrap_config,
        )?;
        check_types(
            SubjectResource::InfrastructureMachine,
            current_infra_machine,
            desired_infra_machine,
        )?;

        Ok(Self {
            machine: machine.clone(),
            desired_machine: desired_machine.clone(),
            current_bootstrap_config: current_bootstrap_config.clone(),
            desired_bootstrap_config: desired_bootstrap_config.clone(),
            current_infra_machine: current_infra_machine.clone(),
            desired_infra_machine: desired_infra_machine.clone(),
        })
    }

    /// Get the live Machine
    #[inline]
    #[must_use]
    pub fn machine(&self) -> &ResourceDocument {
        &self.machine
    }
}

fn require(
    doc: Option<&ResourceDocument>,
    subject: SubjectResource,
    side: Side,
) -> Result<&ResourceDocument, IncompleteInput> {
    doc.ok_or(IncompleteInput::Missing { subject, side })
}

fn check_types(
    subject: SubjectResource,
    current: &ResourceDocument,
    desired: &ResourceDocument,
) -> Result<(), IncompleteInput> {
    let (current, desired) = (current.type_identity(), desired.type_identity());
    if current == desired {
        Ok(())
    } else {
        Err(IncompleteInput::TypeMismatch {
            subject,
            current,
            desired,
        })
    }
}

/// Builds the request an evaluation negotiates over
#[derive(Clone)]
pub struct SnapshotBuilder {
    normalizer: Arc<dyn ObjectNormalizer>,
    preparer: Arc<dyn BootstrapConfigPreparer>,
    field_manager: String,
}

impl SnapshotBuilder {
    /// Create builder using the default field manager
    pub fn new(
        normalizer: Arc<dyn ObjectNormalizer>,
        preparer: Arc<dyn BootstrapConfigPreparer>,
    ) -> Self {
        Self {
            normalizer,
            preparer,
            field_manager: DEFAULT_FIELD_MANAGER.to_string(),
        }
    }

    /// With field manager for dry-run apply
    #[must_use]
    pub fn with_field_manager(mut self, field_manager: impl Into<String>) -> Self {
        self.field_manager = field_manager.into();
        self
    }

    /// Build the request
    ///
    /// The live Machine is taken as-is; it was just written by the caller.
    pub async fn build(
        &self,
        inputs: SnapshotInputs,
        deadline: Deadline,
    ) -> Result<CanUpdateMachineRequest, SnapshotError> {
        let SnapshotInputs {
            machine,
            desired_machine,
            mut current_bootstrap_config,
            desired_bootstrap_config,
            mut current_infra_machine,
            desired_infra_machine,
        } = inputs;

        sync_metadata(
            SubjectResource::BootstrapConfig,
            &mut current_bootstrap_config,
            &desired_bootstrap_config,
        )?;
        sync_metadata(
            SubjectResource::InfrastructureMachine,
            &mut current_infra_machine,
            &desired_infra_machine,
        )?;

        let desired_machine = self
            .normalize(SubjectResource::Machine, Side::Desired, desired_machine, deadline)
            .await?;
        let current_infra_machine = self
            .normalize(
                SubjectResource::InfrastructureMachine,
                Side::Current,
                current_infra_machine,
                deadline,
            )
            .await?;
        let desired_infra_machine = self
            .normalize(
                SubjectResource::InfrastructureMachine,
                Side::Desired,
                desired_infra_machine,
                deadline,
            )
            .await?;

        let (desired_bootstrap_config, current_bootstrap_config) = deadline
            .run(
                self.preparer
                    .prepare_for_diff(desired_bootstrap_config, current_bootstrap_config),
            )
            .await
            .map_err(|_| SnapshotError::Timeout {
                operation: "preparing bootstrap configs for diff".to_string(),
            })?
            .map_err(SnapshotError::PrepareForDiff)?;

        let request = CanUpdateMachineRequest {
            current: RequestObjects {
                machine: clean(SubjectResource::Machine, Side::Current, &machine)?,
                bootstrap_config: clean(
                    SubjectResource::BootstrapConfig,
                    Side::Current,
                    &current_bootstrap_config,
                )?,
                infrastructure_machine: clean(
                    SubjectResource::InfrastructureMachine,
                    Side::Current,
                    &current_infra_machine,
                )?,
            },
            desired: RequestObjects {
                machine: clean(SubjectResource::Machine, Side::Desired, &desired_machine)?,
                bootstrap_config: clean(
                    SubjectResource::BootstrapConfig,
                    Side::Desired,
                    &desired_bootstrap_config,
                )?,
                infrastructure_machine: clean(
                    SubjectResource::InfrastructureMachine,
                    Side::Desired,
                    &desired_infra_machine,
                )?,
            },
        };

        tracing::debug!(
            machine = %machine.key(),
            current_machine = %request.current.machine.hash().short(),
            desired_machine = %request.desired.machine.hash().short(),
            "Built CanUpdateMachine request"
        );
        Ok(request)
    }

    async fn normalize(
        &self,
        subject: SubjectResource,
        side: Side,
        object: ResourceDocument,
        deadline: Deadline,
    ) -> Result<ResourceDocument, SnapshotError> {
        deadline
            .run(self.normalizer.dry_run_apply(&self.field_manager, object))
            .await
            .map_err(|_| SnapshotError::Timeout {
                operation: format!("dry-run apply of {side} {subject}"),
            })?
            .map_err(|source| SnapshotError::Normalize {
                subject,
                side,
                source,
            })
    }
}

impl std::fmt::Debug for SnapshotBuilder {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshotBuilder")
            .field("field_manager", &self.field_manager)
            .finish_non_exhaustive()
    }
}

fn sync_metadata(
    subject: SubjectResource,
    current: &mut ResourceDocument,
    desired: &ResourceDocument,
) -> Result<(), SnapshotError> {
    current
        .set_labels(desired.labels().cloned())
        .and_then(|()| current.set_annotations(desired.annotations().cloned()))
        .map_err(|source| SnapshotError::SyncMetadata { subject, source })
}

fn clean(
    subject: SubjectResource,
    side: Side,
    doc: &ResourceDocument,
) -> Result<ResourceDocument, SnapshotError> {
    doc.cleaned()
        .map_err(|source| SnapshotError::Cleanup {
            subject,
            side,
            source,
        })
}
