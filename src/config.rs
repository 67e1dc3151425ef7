//! Distribution engine configuration.

use serde::{Deserialize, Serialize};

/// Maximum agents considered by the flat distributor
pub const DEFAULT_MAX_FLAT_AGENTS: usize = 5;

/// Configuration for distribution runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionConfig {
    /// Cap on the agent pool for flat distribution (default: 5)
    pub max_flat_agents: usize,
}

impl Default for DistributionConfig {
    fn default() -> Self {
        Self {
            max_flat_agents: DEFAULT_MAX_FLAT_AGENTS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = DistributionConfig::default();
        assert_eq!(config.max_flat_agents, 5);
    }
}
