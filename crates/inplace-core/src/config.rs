//! Feasibility gate configuration

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default field manager used for dry-run normalization
pub const DEFAULT_FIELD_MANAGER: &str = "capi-kubeadmcontrolplane";

/// Configuration for [`FeasibilityGate`](crate::FeasibilityGate)
///
/// Missing keys take their default when loaded from TOML:
///
/// ```toml
/// in_place_updates = true
/// max_extension_handlers = 1
/// evaluation_timeout_secs = 30
/// field_manager = "capi-kubeadmcontrolplane"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FeasibilityConfig {
    /// Capability flag; when off every machine is ineligible
    pub in_place_updates: bool,
    /// Maximum number of registered CanUpdateMachine handlers
    pub max_extension_handlers: usize,
    /// Deadline for a whole evaluation, in seconds
    pub evaluation_timeout_secs: u64,
    /// Field manager passed to the dry-run normalizer
    pub field_manager: String,
}

impl FeasibilityConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate configuration from TOML
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// With capability flag
    #[inline]
    #[must_use]
    pub fn with_in_place_updates(mut self, enabled: bool) -> Self {
        self.in_place_updates = enabled;
        self
    }

    /// With handler limit
    #[inline]
    #[must_use]
    pub fn with_max_extension_handlers(mut self, max: usize) -> Self {
        self.max_extension_handlers = max;
        self
    }

    /// With evaluation deadline
    #[inline]
    #[must_use]
    pub fn with_evaluation_timeout(mut self, timeout: Duration) -> Self {
        self.evaluation_timeout_secs = timeout.as_secs();
        self
    }

    /// With field manager
    #[inline]
    #[must_use]
    pub fn with_field_manager(mut self, field_manager: impl Into<String>) -> Self {
        self.field_manager = field_manager.into();
        self
    }

    /// Evaluation deadline as a duration
    #[inline]
    #[must_use]
    pub fn evaluation_timeout(&self) -> Duration {
        Duration::from_secs(self.evaluation_timeout_secs)
    }

    /// Reject settings the gate cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_extension_handlers == 0 {
            return Err(ConfigError::invalid(
                "max_extension_handlers",
                "must be at least 1",
            ));
        }
        if self.evaluation_timeout_secs == 0 {
            return Err(ConfigError::invalid(
                "evaluation_timeout_secs",
                "must be at least 1",
            ));
        }
        if self.field_manager.trim().is_empty() {
            return Err(ConfigError::invalid("field_manager", "must not be empty"));
        }
        Ok(())
    }
}

impl Default for FeasibilityConfig {
    fn default() -> Self {
        Self {
            in_place_updates: false,
            max_extension_handlers: 1,
            evaluation_timeout_secs: 30,
            field_manager: DEFAULT_FIELD_MANAGER.to_string(),
        }
    }
}
