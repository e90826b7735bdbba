//! Feasibility gate
//!
//! Entry point deciding whether a Machine can be updated in place:
//! capability flag, input completeness, extension discovery and the handler
//! limit, then request construction and negotiation.

use crate::collaborators::{BootstrapConfigPreparer, ExtensionClient, ObjectNormalizer};
use crate::config::FeasibilityConfig;
use crate::deadline::Deadline;
use crate::error::FeasibilityError;
use crate::orchestrator::{NegotiationOrchestrator, NegotiationOutcome};
use crate::snapshot::{IncompleteInput, SnapshotBuilder, SnapshotInputs};
use crate::types::UpToDateResult;
use inplace_compare::DiffRenderer;
use inplace_document::ResourceDocument;
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

/// Why a Machine is not eligible for an in-place update
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IneligibleReason {
    /// In-place updates are switched off
    CapabilityDisabled,
    /// Some input object is missing or mismatched
    IncompleteSnapshot(IncompleteInput),
    /// No CanUpdateMachine extension is registered
    NoExtensions,
    /// Extensions ran but specs still differ
    NotConverged {
        /// One reason per subject that did not match in the final round
        reasons: Vec<String>,
    },
}

impl Display for IneligibleReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::CapabilityDisabled => f.write_str("in-place updates are disabled"),
            Self::IncompleteSnapshot(input) => write!(f, "incomplete input: {input}"),
            Self::NoExtensions => f.write_str("no CanUpdateMachine extensions registered"),
            Self::NotConverged { reasons } => f.write_str(&reasons.join(",")),
        }
    }
}

/// Eligibility decision for one Machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// The Machine can be updated in place
    Eligible {
        /// Handler whose patches completed convergence
        handler: String,
        /// Number of negotiation rounds run
        rounds: usize,
    },
    /// The Machine cannot be updated in place
    Ineligible(IneligibleReason),
}

impl Decision {
    /// Check if the Machine is eligible
    #[inline]
    #[must_use]
    pub fn is_eligible(&self) -> bool {
        matches!(self, Self::Eligible { .. })
    }

    /// Mismatch reasons, empty unless negotiation failed to converge
    #[must_use]
    pub fn reasons(&self) -> &[String] {
        match self {
            Self::Ineligible(IneligibleReason::NotConverged { reasons }) => reasons,
            _ => &[],
        }
    }
}

/// Decides in-place update eligibility
///
/// Holds no per-evaluation state; concurrent evaluations each build and own
/// their request.
#[derive(Clone)]
pub struct FeasibilityGate {
    config: FeasibilityConfig,
    client: Arc<dyn ExtensionClient>,
    snapshot: SnapshotBuilder,
    orchestrator: NegotiationOrchestrator,
}

impl FeasibilityGate {
    /// Create gate, validating `config`
    pub fn new(
        config: FeasibilityConfig,
        normalizer: Arc<dyn ObjectNormalizer>,
        preparer: Arc<dyn BootstrapConfigPreparer>,
        client: Arc<dyn ExtensionClient>,
    ) -> Result<Self, FeasibilityError> {
        config.validate()?;
        let snapshot = SnapshotBuilder::new(normalizer, preparer)
            .with_field_manager(config.field_manager.clone());
        let orchestrator = NegotiationOrchestrator::new(Arc::clone(&client));
        Ok(Self {
            config,
            client,
            snapshot,
            orchestrator,
        })
    }

    /// With custom diff renderer
    #[must_use]
    pub fn with_diff_renderer(mut self, renderer: Arc<dyn DiffRenderer>) -> Self {
        self.orchestrator = NegotiationOrchestrator::with_renderer(Arc::clone(&self.client), renderer);
        self
    }

    /// Get configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &FeasibilityConfig {
        &self.config
    }

    /// Decide whether `machine` can be updated in place
    ///
    /// Ineligibility is `Ok(false)`; only faults are errors.
    pub async fn can_update_machine(
        &self,
        machine: &ResourceDocument,
        up_to_date: &UpToDateResult,
    ) -> Result<bool, FeasibilityError> {
        Ok(self.evaluate(machine, up_to_date).await?.is_eligible())
    }

    /// Decide eligibility under the configured evaluation deadline
    pub async fn evaluate(
        &self,
        machine: &ResourceDocument,
        up_to_date: &UpToDateResult,
    ) -> Result<Decision, FeasibilityError> {
        let deadline = Deadline::after(self.config.evaluation_timeout());
        self.evaluate_until(machine, up_to_date, deadline).await
    }

    /// Decide eligibility under an explicit deadline
    pub async fn evaluate_until(
        &self,
        machine: &ResourceDocument,
        up_to_date: &UpToDateResult,
        deadline: Deadline,
    ) -> Result<Decision, FeasibilityError> {
        let decision = self.decide(machine, up_to_date, deadline).await?;
        match &decision {
            Decision::Eligible { handler, rounds } => tracing::debug!(
                machine = %machine.key(),
                extension = %handler,
                rounds,
                "Machine can be updated in-place"
            ),
            Decision::Ineligible(reason) => tracing::info!(
                machine = %machine.key(),
                reason = %reason,
                "Machine cannot be updated in-place by extensions"
            ),
        }
        Ok(decision)
    }

    async fn decide(
        &self,
        machine: &ResourceDocument,
        up_to_date: &UpToDateResult,
        deadline: Deadline,
    ) -> Result<Decision, FeasibilityError> {
        if !self.config.in_place_updates {
            return Ok(Decision::Ineligible(IneligibleReason::CapabilityDisabled));
        }

        let inputs = match SnapshotInputs::collect(machine, up_to_date) {
            Ok(inputs) => inputs,
            Err(incomplete) => {
                return Ok(Decision::Ineligible(IneligibleReason::IncompleteSnapshot(
                    incomplete,
                )))
            }
        };

        let handlers = deadline
            .run(self.client.discover(machine))
            .await
            .map_err(|_| FeasibilityError::timeout("discovering CanUpdateMachine extensions"))?
            .map_err(FeasibilityError::DiscoverExtensions)?;
        if handlers.is_empty() {
            return Ok(Decision::Ineligible(IneligibleReason::NoExtensions));
        }
        if handlers.len() > self.config.max_extension_handlers {
            return Err(FeasibilityError::MultipleExtensions { handlers });
        }

        let request = self.snapshot.build(inputs, deadline).await?;
        let outcome = self
            .orchestrator
            .negotiate(&machine.key(), &handlers, request, deadline)
            .await?;

        Ok(match outcome {
            NegotiationOutcome::Converged { handler, rounds } => {
                Decision::Eligible { handler, rounds }
            }
            NegotiationOutcome::Exhausted { reasons } => {
                Decision::Ineligible(IneligibleReason::NotConverged { reasons })
            }
        })
    }
}

impl fmt::Debug for FeasibilityGate {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeasibilityGate")
            .field("config", &self.config)
            .field("snapshot", &self.snapshot)
            .field("orchestrator", &self.orchestrator)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{
        MockBootstrapConfigPreparer, MockExtensionClient, MockObjectNormalizer,
    };
    use crate::types::CanUpdateMachineResponse;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    fn doc(kind: &str, spec: Value) -> ResourceDocument {
        ResourceDocument::from_value(json!({
            "apiVersion": "test/v1",
            "kind": kind,
            "metadata": {"name": "m-1", "namespace": "default"},
            "spec": spec
        }))
        .unwrap()
    }

    fn inputs() -> (ResourceDocument, UpToDateResult) {
        let machine = doc("Machine", json!({"version": "v1"}));
        let result = UpToDateResult::new()
            .with_desired_machine(doc("Machine", json!({"version": "v1"})))
            .with_bootstrap_config(doc("KubeadmConfig", json!({})), doc("KubeadmConfig", json!({})))
            .with_infra_machine(doc("DockerMachine", json!({})), doc("DockerMachine", json!({})));
        (machine, result)
    }

    fn passthrough_normalizer() -> MockObjectNormalizer {
        let mut normalizer = MockObjectNormalizer::new();
        normalizer
            .expect_dry_run_apply()
            .returning(|_, object| Ok(object));
        normalizer
    }

    fn passthrough_preparer() -> MockBootstrapConfigPreparer {
        let mut preparer = MockBootstrapConfigPreparer::new();
        preparer
            .expect_prepare_for_diff()
            .returning(|desired, current| Ok((desired, current)));
        preparer
    }

    fn gate(config: FeasibilityConfig, client: MockExtensionClient) -> FeasibilityGate {
        FeasibilityGate::new(
            config,
            Arc::new(passthrough_normalizer()),
            Arc::new(passthrough_preparer()),
            Arc::new(client),
        )
        .unwrap()
    }

    fn enabled() -> FeasibilityConfig {
        FeasibilityConfig::new().with_in_place_updates(true)
    }

    #[tokio::test]
    async fn disabled_capability_is_ineligible_without_discovery() {
        let mut client = MockExtensionClient::new();
        client.expect_discover().never();
        let (machine, result) = inputs();

        let decision = gate(FeasibilityConfig::new(), client)
            .evaluate(&machine, &result)
            .await
            .unwrap();
        assert_eq!(decision, Decision::Ineligible(IneligibleReason::CapabilityDisabled));
    }

    #[tokio::test]
    async fn incomplete_inputs_are_ineligible_without_discovery() {
        let mut client = MockExtensionClient::new();
        client.expect_discover().never();
        let (machine, mut result) = inputs();
        result.desired_bootstrap_config = None;

        let decision = gate(enabled(), client).evaluate(&machine, &result).await.unwrap();
        assert!(matches!(
            decision,
            Decision::Ineligible(IneligibleReason::IncompleteSnapshot(_))
        ));
    }

    #[tokio::test]
    async fn no_extensions_is_ineligible() {
        let mut client = MockExtensionClient::new();
        client.expect_discover().returning(|_| Ok(Vec::new()));
        client.expect_call().never();
        let (machine, result) = inputs();

        let eligible = gate(enabled(), client)
            .can_update_machine(&machine, &result)
            .await
            .unwrap();
        assert!(!eligible);
    }

    #[tokio::test]
    async fn multiple_extensions_is_a_configuration_fault() {
        let mut client = MockExtensionClient::new();
        client
            .expect_discover()
            .returning(|_| Ok(vec!["a".to_string(), "b".to_string()]));
        client.expect_call().never();
        let (machine, result) = inputs();

        let err = gate(enabled(), client)
            .can_update_machine(&machine, &result)
            .await
            .unwrap_err();
        assert!(err.is_configuration_fault());
        assert_eq!(
            err.to_string(),
            "found multiple CanUpdateMachine hooks (a,b) (more than one is not supported yet)"
        );
    }

    #[tokio::test]
    async fn discovery_failure_is_an_error() {
        let mut client = MockExtensionClient::new();
        client
            .expect_discover()
            .returning(|_| Err(anyhow::anyhow!("registry unavailable")));
        let (machine, result) = inputs();

        let err = gate(enabled(), client)
            .can_update_machine(&machine, &result)
            .await
            .unwrap_err();
        assert!(matches!(err, FeasibilityError::DiscoverExtensions(_)));
    }

    #[tokio::test]
    async fn converged_negotiation_is_eligible() {
        let mut client = MockExtensionClient::new();
        client
            .expect_discover()
            .returning(|_| Ok(vec!["ext".to_string()]));
        client
            .expect_call()
            .times(1)
            .returning(|_, _| Ok(CanUpdateMachineResponse::default()));
        let (machine, result) = inputs();

        let decision = gate(enabled(), client).evaluate(&machine, &result).await.unwrap();
        assert_eq!(
            decision,
            Decision::Eligible {
                handler: "ext".to_string(),
                rounds: 1
            }
        );
        assert!(decision.reasons().is_empty());
    }

    #[tokio::test]
    async fn not_converged_carries_reasons() {
        let mut client = MockExtensionClient::new();
        client
            .expect_discover()
            .returning(|_| Ok(vec!["ext".to_string()]));
        client
            .expect_call()
            .returning(|_, _| Ok(CanUpdateMachineResponse::default()));
        let (machine, mut result) = inputs();
        result.desired_machine = Some(doc("Machine", json!({"version": "v2"})));

        let decision = gate(enabled(), client).evaluate(&machine, &result).await.unwrap();
        assert!(!decision.is_eligible());
        assert_eq!(
            decision.reasons(),
            &[r#"Machine cannot be updated in-place: spec.version: "v1" -> "v2""#.to_string()]
        );
    }

    #[test]
    fn invalid_config_is_rejected() {
        let err = FeasibilityGate::new(
            FeasibilityConfig::new().with_max_extension_handlers(0),
            Arc::new(MockObjectNormalizer::new()),
            Arc::new(MockBootstrapConfigPreparer::new()),
            Arc::new(MockExtensionClient::new()),
        )
        .unwrap_err();
        assert!(err.is_configuration_fault());
    }

    #[test]
    fn ineligible_reason_display() {
        let reason = IneligibleReason::NotConverged {
            reasons: vec!["a".to_string(), "b".to_string()],
        };
        assert_eq!(reason.to_string(), "a,b");
        assert_eq!(
            IneligibleReason::NoExtensions.to_string(),
            "no CanUpdateMachine extensions registered"
        );
    }
}
