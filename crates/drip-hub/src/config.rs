//! Ledger configuration.
//!
//! [`HubConfig`] fixes the cycle length for the lifetime of a hub. It is
//! plain serde data so hosts can embed it in their own configuration files.

use drip_core::constants::{DEFAULT_CYCLE_SECS, MIN_CYCLE_SECS};
use drip_core::cycle::CycleMath;
use serde::{Deserialize, Serialize};

use crate::error::HubError;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct HubConfig {
    /// Cycle length in seconds. Funds streamed in a cycle are receivable
    /// once it ends.
    pub cycle_secs: u32,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            cycle_secs: DEFAULT_CYCLE_SECS,
        }
    }
}

impl HubConfig {
    pub fn with_cycle_secs(cycle_secs: u32) -> Self {
        Self { cycle_secs }
    }

    /// Check the configuration and build the cycle math it describes.
    pub fn validate(&self) -> Result<CycleMath, HubError> {
        CycleMath::new(self.cycle_secs).ok_or_else(|| {
            HubError::InvalidConfig(format!(
                "cycle_secs must be at least {MIN_CYCLE_SECS}, got {}",
                self.cycle_secs
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_cycle_is_a_week() {
        assert_eq!(HubConfig::default().cycle_secs, 7 * 24 * 60 * 60);
        assert!(HubConfig::default().validate().is_ok());
    }

    #[test]
    fn one_second_cycles_are_rejected() {
        let err = HubConfig::with_cycle_secs(1).validate().unwrap_err();
        assert!(matches!(err, HubError::InvalidConfig(_)));
    }

    #[test]
    fn missing_fields_take_defaults() {
        let cfg: HubConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, HubConfig::default());
    }
}
