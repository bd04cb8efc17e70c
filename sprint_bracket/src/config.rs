//! Engine configuration.

use serde::{Deserialize, Serialize};

use crate::bracket::errors::ConfigError;

/// Seed labels bound during seeding; brackets may reference up to this many.
pub const DEFAULT_SEED_SLOT_CAPACITY: usize = 128;

/// Tunables of the bracket engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BracketConfig {
    /// Number of `N{k}` seed labels bound to riders or byes (default: 128)
    pub seed_slot_capacity: usize,

    /// Estimated seconds per rider for the 200m qualifying time trial
    pub sprint_qualifying_secs: f64,

    /// Estimated seconds per single-heat sprint event
    pub sprint_final_secs: f64,

    /// Estimated seconds per Keirin event
    pub keirin_secs: f64,
}

impl Default for BracketConfig {
    fn default() -> Self {
        Self {
            seed_slot_capacity: DEFAULT_SEED_SLOT_CAPACITY,
            sprint_qualifying_secs: 60.0,
            sprint_final_secs: 3.0 * 60.0,
            keirin_secs: 5.0 * 60.0,
        }
    }
}

impl BracketConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.seed_slot_capacity == 0 {
            return Err(invalid("seed_slot_capacity", "must be at least 1"));
        }

        for (field, secs) in [
            ("sprint_qualifying_secs", self.sprint_qualifying_secs),
            ("sprint_final_secs", self.sprint_final_secs),
            ("keirin_secs", self.keirin_secs),
        ] {
            if !secs.is_finite() || secs <= 0.0 {
                return Err(invalid(field, "must be a positive number of seconds"));
            }
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}
