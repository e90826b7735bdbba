//! External collaborators of the feasibility gate
//!
//! Every call through these traits is a suspension point and runs under the
//! evaluation deadline.

use crate::types::{CanUpdateMachineRequest, CanUpdateMachineResponse};
use async_trait::async_trait;
use inplace_document::ResourceDocument;

#[cfg(test)]
use mockall::automock;

/// Server-side dry-run apply
///
/// Fills defaults and drops fields the caller does not own, so current and
/// desired objects can be compared. Must be idempotent and must not persist
/// anything.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ObjectNormalizer: Send + Sync {
    /// Dry-run apply `object` as `field_manager`, returning the result
    async fn dry_run_apply(
        &self,
        field_manager: &str,
        object: ResourceDocument,
    ) -> anyhow::Result<ResourceDocument>;
}

/// Bootstrap-config specific normalization
#[cfg_attr(test, automock)]
#[async_trait]
pub trait BootstrapConfigPreparer: Send + Sync {
    /// Prepare a (desired, current) bootstrap config pair for diffing
    async fn prepare_for_diff(
        &self,
        desired: ResourceDocument,
        current: ResourceDocument,
    ) -> anyhow::Result<(ResourceDocument, ResourceDocument)>;
}

/// Registry and transport for CanUpdateMachine extensions
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ExtensionClient: Send + Sync {
    /// Names of the handlers registered for `machine`, in call order
    async fn discover(&self, machine: &ResourceDocument) -> anyhow::Result<Vec<String>>;

    /// Call handler `name` with `request`
    async fn call(
        &self,
        name: &str,
        request: &CanUpdateMachineRequest,
    ) -> anyhow::Result<CanUpdateMachineResponse>;
}
