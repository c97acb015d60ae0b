use serde::{Deserialize, Serialize};

use crate::config::{EpisodeConfig, StateType};
use crate::error::EngineError;

/// Rank-encoded view of the most recent prices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "values", rename_all = "snake_case")]
pub enum Observation {
    Ranks(Vec<u32>),
    Scaled(Vec<f32>),
}

impl Observation {
    pub fn len(&self) -> usize {
        match self {
            Self::Ranks(values) => values.len(),
            Self::Scaled(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_f32_vec(&self) -> Vec<f32> {
        match self {
            Self::Ranks(values) => values.iter().map(|rank| *rank as f32).collect(),
            Self::Scaled(values) => values.clone(),
        }
    }

    pub fn last(&self) -> Option<f32> {
        match self {
            Self::Ranks(values) => values.last().map(|rank| *rank as f32),
            Self::Scaled(values) => values.last().copied(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObservationSpace {
    pub shape: [usize; 1],
    pub low: f32,
    pub high: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObservationEncoder {
    state_type: StateType,
    window: usize,
    scale: bool,
    offset_scaling: bool,
    min_offset: f64,
    allow_variable_length_window: bool,
}

impl ObservationEncoder {
    pub fn from_config(config: &EpisodeConfig) -> Self {
        Self {
            state_type: config.state_type,
            window: config.num_prev_observations,
            scale: config.scale,
            offset_scaling: config.offset_scaling,
            min_offset: config.min_offset,
            allow_variable_length_window: config.allow_variable_length_window,
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn observation_space(&self) -> ObservationSpace {
        let (low, high) = if self.scale {
            (0.0, 1.0)
        } else {
            (1.0, self.window as f32)
        };

        ObservationSpace {
            shape: [self.window],
            low,
            high,
        }
    }

    /// Encodes the tail of `price_history`. Shorter histories yield a shorter
    /// observation unless variable-length windows are disabled.
    pub fn encode(&self, price_history: &[f64]) -> Result<Observation, EngineError> {
        match self.state_type {
            StateType::Basic => self.encode_basic(price_history),
        }
    }

    fn encode_basic(&self, price_history: &[f64]) -> Result<Observation, EngineError> {
        let available = price_history.len();
        if available < self.window && !self.allow_variable_length_window {
            return Err(EngineError::InsufficientHistory {
                available,
                required: self.window,
            });
        }

        let k = available.min(self.window);
        let ranks = rank_window(&price_history[available - k..]);
        if !self.scale {
            return Ok(Observation::Ranks(ranks));
        }

        let mut scaled = min_max_scale(&ranks);
        if self.offset_scaling {
            for value in &mut scaled {
                *value += self.min_offset * (1.0 - *value);
            }
        }

        Ok(Observation::Scaled(
            scaled.into_iter().map(|value| value as f32).collect(),
        ))
    }
}

/// 1-based ranks via a stable double argsort; equal prices rank in arrival order.
pub fn rank_window(prices: &[f64]) -> Vec<u32> {
    let mut order: Vec<usize> = (0..prices.len()).collect();
    order.sort_by(|left, right| prices[*left].total_cmp(&prices[*right]));

    let mut ranks = vec![0_u32; prices.len()];
    for (rank, index) in order.into_iter().enumerate() {
        ranks[index] = rank as u32 + 1;
    }
    ranks
}

fn min_max_scale(ranks: &[u32]) -> Vec<f64> {
    let min = ranks.iter().copied().min().unwrap_or_default() as f64;
    let max = ranks.iter().copied().max().unwrap_or_default() as f64;
    let range = max - min;

    ranks
        .iter()
        .map(|rank| {
            if range == 0.0 {
                0.0
            } else {
                (*rank as f64 - min) / range
            }
        })
        .collect()
}
