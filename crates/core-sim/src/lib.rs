//! Single-instrument trading episode engine: a synthetic price process, a
//! position ledger and the controller that turns them into observations and
//! rewards for a training loop.

mod config;
mod episode;
mod error;
mod generators;
mod ledger;
mod observation;
mod reward;

pub use config::{
    EpisodeConfig, PriceMovementType, RewardType, StateType, DEFAULT_INVALID_ACTION_PENALTY,
    DEFAULT_MIN_OFFSET,
};
pub use episode::{EpisodeController, EpisodeStatus, StepInfo, StepResult, Strictness};
pub use error::EngineError;
pub use generators::{Direction, LinearPriceMovement, PriceGenerator};
pub use ledger::{Action, ClosedTrade, Position, PositionLedger, Side};
pub use observation::{rank_window, Observation, ObservationEncoder, ObservationSpace};
pub use reward::RewardScheme;
