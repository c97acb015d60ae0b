use std::fmt;

use rand::{Rng, RngCore};

use crate::config::{EpisodeConfig, PriceMovementType};
use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

/// Additive drift plus uniform noise: `price += slope + U(-noise, noise)`.
/// Unbounded in both directions.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearPriceMovement {
    slope: f64,
    noise: f64,
    starting_price: f64,
    current_price: f64,
}

impl LinearPriceMovement {
    pub fn new(slope: f64, noise: f64, starting_price: f64) -> Result<Self, EngineError> {
        if !starting_price.is_finite() {
            return Err(EngineError::invalid_config(
                "starting_price",
                "must be finite",
            ));
        }
        if !slope.is_finite() {
            return Err(EngineError::invalid_config("slope", "must be finite"));
        }
        if !noise.is_finite() || noise < 0.0 {
            return Err(EngineError::invalid_config(
                "noise",
                "must be finite and non-negative",
            ));
        }

        Ok(Self {
            slope,
            noise,
            starting_price,
            current_price: starting_price,
        })
    }

    pub fn next_price(&mut self, rng: &mut dyn RngCore) -> f64 {
        let noise_factor = if self.noise > 0.0 {
            rng.gen_range(-self.noise..=self.noise)
        } else {
            0.0
        };
        self.current_price += self.slope + noise_factor;
        self.current_price
    }

    pub fn slope(&self) -> f64 {
        self.slope
    }

    pub fn noise(&self) -> f64 {
        self.noise
    }

    pub fn direction(&self) -> Direction {
        if self.slope > 0.0 {
            Direction::Up
        } else {
            Direction::Down
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PriceGenerator {
    Linear(LinearPriceMovement),
}

impl PriceGenerator {
    pub fn from_config(config: &EpisodeConfig) -> Result<Self, EngineError> {
        match config.price_movement_type {
            PriceMovementType::Linear => Ok(Self::Linear(LinearPriceMovement::new(
                config.slope,
                config.noise,
                config.starting_price,
            )?)),
        }
    }

    pub fn next_price(&mut self, rng: &mut dyn RngCore) -> f64 {
        match self {
            Self::Linear(model) => model.next_price(rng),
        }
    }

    pub fn current_price(&self) -> f64 {
        match self {
            Self::Linear(model) => model.current_price,
        }
    }

    pub fn starting_price(&self) -> f64 {
        match self {
            Self::Linear(model) => model.starting_price,
        }
    }

    pub fn kind(&self) -> PriceMovementType {
        match self {
            Self::Linear(_) => PriceMovementType::Linear,
        }
    }
}

impl fmt::Display for PriceGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Linear(model) => write!(
                f,
                "Linear(slope={}, noise={}, starting_price={}, current_price={})",
                model.slope, model.noise, model.starting_price, model.current_price
            ),
        }
    }
}
