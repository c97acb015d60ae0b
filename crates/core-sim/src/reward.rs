use crate::config::RewardType;
use crate::ledger::PositionLedger;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewardScheme {
    /// Zero until the episode completes, then the cumulative percentage PnL.
    FinalOnly,
}

impl RewardScheme {
    pub fn from_type(reward_type: RewardType) -> Self {
        match reward_type {
            RewardType::FinalOnly => Self::FinalOnly,
        }
    }

    pub fn reward(&self, ledger: &PositionLedger, is_complete: bool) -> f64 {
        match self {
            Self::FinalOnly if is_complete => ledger.pnl_pct(),
            Self::FinalOnly => 0.0,
        }
    }
}
