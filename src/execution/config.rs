//! Risk limits for the paper executor

use serde::{Deserialize, Serialize};

/// Independent risk checks applied before a signal is acted on (`risk.*`)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RiskConfig {
    /// Signals below this confidence are not traded
    pub min_confidence: u8,

    /// Maximum position size in contracts
    pub max_position_size: u32,

    /// Daily loss limit in points (trading stops when reached)
    pub daily_loss_limit: f64,

    /// Max losing trades per day (trading stops when reached)
    pub max_daily_losses: u32,

    /// Balance the session starts from
    pub starting_balance: f64,

    /// Completed trades kept in memory
    pub max_history: usize,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            min_confidence: 6,
            max_position_size: 2,
            daily_loss_limit: 100.0, // $2,000 with 1 NQ
            max_daily_losses: 3,     // Stop after 3 losing trades
            starting_balance: 50000.0,
            max_history: 1000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_yaml() {
        let config: RiskConfig = serde_yaml::from_str("min_confidence: 8\n").unwrap();
        assert_eq!(config.min_confidence, 8);
        assert_eq!(config.max_daily_losses, 3);
    }
}
