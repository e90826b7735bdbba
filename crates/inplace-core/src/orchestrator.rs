//! Negotiation orchestrator
//!
//! Drives the extension rounds of one evaluation as an explicit state
//! machine:
//!
//! ```text
//! Initial ──► Round(0) ──► Round(1) ──► … ──► Round(n-1) ──► Exhausted
//!                │            │                   │
//!                └────────────┴───────────────────┴────────► Converged
//! ```
//!
//! Each round calls one handler with the request as accumulated so far,
//! applies the returned patches to the current documents and compares every
//! subject against its desired counterpart. Any fault ends the negotiation
//! with an error.

use crate::collaborators::ExtensionClient;
use crate::deadline::Deadline;
use crate::error::FeasibilityError;
use crate::types::{
    CanUpdateMachineRequest, CanUpdateMachineResponse, SubjectResource, MACHINE_KIND,
};
use inplace_compare::{DiffRenderer, SpecComparator, StructuralDiff};
use inplace_document::ObjectKey;
use inplace_patch::PatchEngine;
use std::fmt;
use std::sync::Arc;

/// Negotiation state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationState {
    /// Nothing called yet
    Initial,
    /// Calling the handler at this index
    Round(usize),
    /// The handler at this index made every spec match
    Converged(usize),
    /// Every handler was called without convergence
    Exhausted,
}

/// Result of a negotiation that did not fault
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NegotiationOutcome {
    /// Every spec matched after `handler` responded
    Converged {
        /// Handler whose patches completed convergence
        handler: String,
        /// Number of rounds run
        rounds: usize,
    },
    /// No handler achieved convergence
    Exhausted {
        /// Mismatch reasons of the last round, one per subject
        reasons: Vec<String>,
    },
}

impl NegotiationOutcome {
    /// Check if negotiation converged
    #[inline]
    #[must_use]
    pub fn is_converged(&self) -> bool {
        matches!(self, Self::Converged { .. })
    }
}

/// Runs extension rounds over a request
#[derive(Clone)]
pub struct NegotiationOrchestrator {
    client: Arc<dyn ExtensionClient>,
    engine: PatchEngine,
    comparator: SpecComparator<Arc<dyn DiffRenderer>>,
}

impl NegotiationOrchestrator {
    /// Create orchestrator using the structural diff renderer
    pub fn new(client: Arc<dyn ExtensionClient>) -> Self {
        Self::with_renderer(client, Arc::new(StructuralDiff::new()))
    }

    /// Create orchestrator using a custom diff renderer
    pub fn with_renderer(
        client: Arc<dyn ExtensionClient>,
        renderer: Arc<dyn DiffRenderer>,
    ) -> Self {
        Self {
            client,
            engine: PatchEngine::new(),
            comparator: SpecComparator::with_renderer(renderer),
        }
    }

    /// Negotiate over `request` with `handlers`, in order
    ///
    /// Handlers after the converging one are not called. When no handler
    /// converges, only the reasons of the final round are reported.
    pub async fn negotiate(
        &self,
        machine: &ObjectKey,
        handlers: &[String],
        mut request: CanUpdateMachineRequest,
        deadline: Deadline,
    ) -> Result<NegotiationOutcome, FeasibilityError> {
        let mut state = NegotiationState::Initial;
        let mut reasons = Vec::new();

        loop {
            state = match state {
                NegotiationState::Initial => {
                    if handlers.is_empty() {
                        NegotiationState::Exhausted
                    } else {
                        NegotiationState::Round(0)
                    }
                }
                NegotiationState::Round(index) => {
                    let Some(handler) = handlers.get(index) else {
                        break Ok(NegotiationOutcome::Exhausted { reasons });
                    };
                    reasons = self.round(machine, handler, &mut request, deadline).await?;
                    if reasons.is_empty() {
                        NegotiationState::Converged(index)
                    } else {
                        tracing::debug!(
                            machine = %machine,
                            extension = %handler,
                            round = index,
                            reasons = %reasons.join(","),
                            "Extension did not make current and desired objects match"
                        );
                        if index + 1 < handlers.len() {
                            NegotiationState::Round(index + 1)
                        } else {
                            NegotiationState::Exhausted
                        }
                    }
                }
                NegotiationState::Converged(index) => {
                    break Ok(NegotiationOutcome::Converged {
                        handler: handlers.get(index).cloned().unwrap_or_default(),
                        rounds: index + 1,
                    });
                }
                NegotiationState::Exhausted => {
                    break Ok(NegotiationOutcome::Exhausted { reasons });
                }
            };
        }
    }

    /// Run one round, returning the mismatch reasons (empty on convergence)
    async fn round(
        &self,
        machine: &ObjectKey,
        handler: &str,
        request: &mut CanUpdateMachineRequest,
        deadline: Deadline,
    ) -> Result<Vec<String>, FeasibilityError> {
        let response = deadline
            .run(self.client.call(handler, request))
            .await
            .map_err(|_| FeasibilityError::timeout(format!("calling extension {handler}")))?
            .map_err(|source| FeasibilityError::CallExtension {
                handler: handler.to_string(),
                source,
            })?;

        self.apply_patches(machine, handler, request, &response)?;
        self.compare(handler, request)
    }

    fn apply_patches(
        &self,
        machine: &ObjectKey,
        handler: &str,
        request: &mut CanUpdateMachineRequest,
        response: &CanUpdateMachineResponse,
    ) -> Result<(), FeasibilityError> {
        for subject in SubjectResource::ALL {
            let Some(patch) = response.patch_for(subject) else {
                continue;
            };
            tracing::trace!(
                machine = %machine,
                extension = %handler,
                subject = %subject,
                patch = %patch.payload(),
                "Accumulating patch"
            );
            self.engine
                .apply(request.current.get_mut(subject), patch)
                .map_err(|source| FeasibilityError::ApplyPatches {
                    handler: handler.to_string(),
                    subject,
                    source,
                })?;
        }
        Ok(())
    }

    fn compare(
        &self,
        handler: &str,
        request: &CanUpdateMachineRequest,
    ) -> Result<Vec<String>, FeasibilityError> {
        let mut reasons = Vec::new();
        for subject in SubjectResource::ALL {
            let current = request.current.get(subject);
            let kind = match subject {
                SubjectResource::Machine => MACHINE_KIND,
                _ => current.kind(),
            };
            let result = self
                .comparator
                .matches(current, request.desired.get(subject))
                .map_err(|source| FeasibilityError::Compare {
                    handler: handler.to_string(),
                    kind: kind.to_string(),
                    source,
                })?;
            reasons.extend(result.reason(kind));
        }
        Ok(reasons)
    }
}

impl fmt::Debug for NegotiationOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NegotiationOrchestrator")
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}
