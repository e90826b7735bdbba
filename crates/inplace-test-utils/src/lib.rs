//! Testing utilities for the in-place feasibility workspace
//!
//! Shared fixtures, scripted collaborators and tracing setup.

#![allow(missing_docs)]

pub mod collaborators;
pub mod fixtures;

pub use collaborators::{
    machine_spec_patch, DefaultingNormalizer, FailingNormalizer, PassthroughNormalizer,
    PassthroughPreparer, ScriptedExtensionClient,
};
pub use fixtures::{docker_machine, kubeadm_config, machine, Scenario};

use inplace_core::{FeasibilityConfig, FeasibilityGate, FeasibilityError};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Install a test subscriber honoring `RUST_LOG`; repeated calls are no-ops
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Configuration with in-place updates switched on
pub fn enabled_config() -> FeasibilityConfig {
    FeasibilityConfig::new().with_in_place_updates(true)
}

/// Gate over passthrough normalization and the given extension client
pub fn setup_test_gate(
    config: FeasibilityConfig,
    client: Arc<ScriptedExtensionClient>,
) -> Result<FeasibilityGate, FeasibilityError> {
    FeasibilityGate::new(
        config,
        Arc::new(PassthroughNormalizer::new()),
        Arc::new(PassthroughPreparer),
        client,
    )
}
