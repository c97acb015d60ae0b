use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

pub const DEFAULT_MIN_OFFSET: f64 = 0.01;
pub const DEFAULT_INVALID_ACTION_PENALTY: f64 = -100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StateType {
    #[default]
    Basic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RewardType {
    #[default]
    FinalOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PriceMovementType {
    #[default]
    Linear,
}

impl StateType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Basic => "Basic",
        }
    }
}

impl RewardType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FinalOnly => "FinalOnly",
        }
    }
}

impl PriceMovementType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Linear => "Linear",
        }
    }
}

impl FromStr for StateType {
    type Err = EngineError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "Basic" => Ok(Self::Basic),
            other => Err(EngineError::unsupported("state type", other)),
        }
    }
}

impl FromStr for RewardType {
    type Err = EngineError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "FinalOnly" => Ok(Self::FinalOnly),
            other => Err(EngineError::unsupported("reward type", other)),
        }
    }
}

impl FromStr for PriceMovementType {
    type Err = EngineError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "Linear" => Ok(Self::Linear),
            other => Err(EngineError::unsupported("price movement type", other)),
        }
    }
}

impl fmt::Display for StateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for RewardType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for PriceMovementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable settings for one episode. Unknown fields fall back to their
/// defaults when deserialized; unknown variant names are rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EpisodeConfig {
    pub state_type: StateType,
    pub reward_type: RewardType,
    pub price_movement_type: PriceMovementType,
    pub starting_price: f64,
    pub slope: f64,
    pub noise: f64,
    pub num_steps: usize,
    pub allow_multiple_units: bool,
    pub num_prev_observations: usize,
    pub scale: bool,
    pub offset_scaling: bool,
    pub min_offset: f64,
    pub allow_variable_length_window: bool,
    pub invalid_action_penalty: f64,
    pub seed: Option<u64>,
}

impl Default for EpisodeConfig {
    fn default() -> Self {
        Self {
            state_type: StateType::Basic,
            reward_type: RewardType::FinalOnly,
            price_movement_type: PriceMovementType::Linear,
            starting_price: 100.0,
            slope: 1.0,
            noise: 0.1,
            num_steps: 100,
            allow_multiple_units: true,
            num_prev_observations: 5,
            scale: false,
            offset_scaling: false,
            min_offset: DEFAULT_MIN_OFFSET,
            allow_variable_length_window: true,
            invalid_action_penalty: DEFAULT_INVALID_ACTION_PENALTY,
            seed: None,
        }
    }
}

impl EpisodeConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        // Percentage PnL divides by entry and exit prices.
        if !self.starting_price.is_finite() || self.starting_price <= 0.0 {
            return Err(EngineError::invalid_config(
                "starting_price",
                "must be finite and positive",
            ));
        }
        if !self.slope.is_finite() {
            return Err(EngineError::invalid_config("slope", "must be finite"));
        }
        if !self.noise.is_finite() || self.noise < 0.0 {
            return Err(EngineError::invalid_config(
                "noise",
                "must be finite and non-negative",
            ));
        }
        if self.num_steps == 0 {
            return Err(EngineError::invalid_config(
                "num_steps",
                "must be at least 1",
            ));
        }
        if self.num_prev_observations == 0 {
            return Err(EngineError::invalid_config(
                "num_prev_observations",
                "must be at least 1",
            ));
        }
        if !self.min_offset.is_finite() || !(0.0..1.0).contains(&self.min_offset) {
            return Err(EngineError::invalid_config(
                "min_offset",
                "must be within [0, 1)",
            ));
        }
        if !self.invalid_action_penalty.is_finite() {
            return Err(EngineError::invalid_config(
                "invalid_action_penalty",
                "must be finite",
            ));
        }

        Ok(())
    }
}
