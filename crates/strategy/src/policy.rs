use std::{fmt, str::FromStr};

use core_sim::{Action, Observation};
use rand::{seq::SliceRandom, Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::divergence::{emit_signal, latest_rank_position, Signal, StrategyError};

pub const DEFAULT_MOMENTUM_THRESHOLD: f64 = 0.25;

/// Chooses the next action code. Codes are returned raw so a policy can
/// submit illegal or malformed actions the way an untrained agent would.
pub trait Policy: Send {
    fn act(&mut self, observation: &Observation, valid: &[Action]) -> i64;
}

/// Samples any of the five codes, legal or not.
#[derive(Debug, Clone)]
pub struct UniformPolicy {
    rng: ChaCha8Rng,
}

impl UniformPolicy {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl Policy for UniformPolicy {
    fn act(&mut self, _observation: &Observation, _valid: &[Action]) -> i64 {
        self.rng.gen_range(0..Action::ALL.len() as i64)
    }
}

/// Samples among the currently legal actions.
#[derive(Debug, Clone)]
pub struct LegalRandomPolicy {
    rng: ChaCha8Rng,
}

impl LegalRandomPolicy {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl Policy for LegalRandomPolicy {
    fn act(&mut self, _observation: &Observation, valid: &[Action]) -> i64 {
        valid
            .choose(&mut self.rng)
            .copied()
            .unwrap_or(Action::Hold)
            .code()
    }
}

/// Goes with the trend: buys when the newest price ranks near the top of the
/// window, sells near the bottom. Prefers batch exits when they are legal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankMomentumPolicy {
    threshold: f64,
}

impl RankMomentumPolicy {
    pub fn new(threshold: f64) -> Result<Self, StrategyError> {
        if !threshold.is_finite() || !(0.0..0.5).contains(&threshold) {
            return Err(StrategyError::InvalidThreshold);
        }

        Ok(Self { threshold })
    }

    pub fn signal(&self, observation: &Observation) -> Signal {
        let scaled = matches!(observation, Observation::Scaled(_));
        let position = latest_rank_position(&observation.as_f32_vec(), scaled);
        emit_signal(position, 0.5, self.threshold)
    }
}

impl Default for RankMomentumPolicy {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_MOMENTUM_THRESHOLD,
        }
    }
}

impl Policy for RankMomentumPolicy {
    fn act(&mut self, observation: &Observation, valid: &[Action]) -> i64 {
        let preferred: &[Action] = match self.signal(observation) {
            Signal::Buy => &[Action::BuyAll, Action::Buy],
            Signal::Sell => &[Action::SellAll, Action::Sell],
            Signal::Hold => &[],
        };

        preferred
            .iter()
            .find(|action| valid.contains(action))
            .copied()
            .unwrap_or(Action::Hold)
            .code()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyKind {
    Uniform,
    LegalRandom,
    RankMomentum,
}

impl PolicyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uniform => "uniform",
            Self::LegalRandom => "legal-random",
            Self::RankMomentum => "rank-momentum",
        }
    }

    pub fn build(self, seed: u64) -> Box<dyn Policy> {
        match self {
            Self::Uniform => Box::new(UniformPolicy::new(seed)),
            Self::LegalRandom => Box::new(LegalRandomPolicy::new(seed)),
            Self::RankMomentum => Box::new(RankMomentumPolicy::default()),
        }
    }
}

impl FromStr for PolicyKind {
    type Err = StrategyError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "uniform" => Ok(Self::Uniform),
            "legal-random" => Ok(Self::LegalRandom),
            "rank-momentum" => Ok(Self::RankMomentum),
            other => Err(StrategyError::UnknownPolicy(other.to_string())),
        }
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use core_sim::{Action, Observation};

    use super::{LegalRandomPolicy, Policy, PolicyKind, RankMomentumPolicy, UniformPolicy};
    use crate::divergence::StrategyError;

    #[test]
    fn uniform_policy_emits_every_code_eventually() {
        let mut policy = UniformPolicy::new(3);
        let observation = Observation::Ranks(vec![1]);
        let mut seen = [false; 5];

        for _ in 0..500 {
            let code = policy.act(&observation, &[]);
            assert!((0..5).contains(&code));
            seen[code as usize] = true;
        }

        assert!(seen.iter().all(|hit| *hit));
    }

    #[test]
    fn legal_random_policy_stays_within_valid_actions() {
        let mut policy = LegalRandomPolicy::new(8);
        let observation = Observation::Ranks(vec![1, 2]);
        let valid = [Action::Buy, Action::Hold, Action::SellAll];

        for _ in 0..200 {
            let code = policy.act(&observation, &valid);
            let action = Action::try_from(code).unwrap();
            assert!(valid.contains(&action));
        }

        assert_eq!(policy.act(&observation, &[]), Action::Hold.code());
    }

    #[test]
    fn momentum_policy_buys_rising_windows_and_exits_in_batches() {
        let mut policy = RankMomentumPolicy::default();
        let rising = Observation::Ranks(vec![1, 2, 3, 4, 5]);
        let falling = Observation::Ranks(vec![5, 4, 3, 2, 1]);

        assert_eq!(
            policy.act(&rising, &[Action::Buy, Action::Sell, Action::Hold]),
            Action::Buy.code()
        );
        assert_eq!(
            policy.act(&falling, &[Action::Buy, Action::Hold, Action::SellAll]),
            Action::SellAll.code()
        );
        assert_eq!(
            policy.act(&falling, &[Action::Sell, Action::Hold]),
            Action::Sell.code()
        );
    }

    #[test]
    fn momentum_policy_holds_inside_the_band() {
        let mut policy = RankMomentumPolicy::default();
        let flat = Observation::Ranks(vec![1, 2, 5, 4, 3]);

        assert_eq!(
            policy.act(&flat, &[Action::Buy, Action::Sell, Action::Hold]),
            Action::Hold.code()
        );
    }

    #[test]
    fn momentum_threshold_is_validated() {
        assert_eq!(
            RankMomentumPolicy::new(0.5),
            Err(StrategyError::InvalidThreshold)
        );
        assert!(RankMomentumPolicy::new(f64::NAN).is_err());
        assert!(RankMomentumPolicy::new(0.1).is_ok());
    }

    #[test]
    fn policy_kind_parses_cli_names() {
        assert_eq!("uniform".parse::<PolicyKind>(), Ok(PolicyKind::Uniform));
        assert_eq!(
            "legal-random".parse::<PolicyKind>(),
            Ok(PolicyKind::LegalRandom)
        );
        assert_eq!(
            "rank-momentum".parse::<PolicyKind>(),
            Ok(PolicyKind::RankMomentum)
        );
        assert_eq!(
            "greedy".parse::<PolicyKind>(),
            Err(StrategyError::UnknownPolicy("greedy".to_string()))
        );
        assert_eq!(
            serde_json::to_value(PolicyKind::LegalRandom).unwrap(),
            serde_json::json!("legal-random")
        );
    }
}
