pub mod divergence;
pub mod policy;

pub use divergence::{divergence, emit_signal, Signal, StrategyError};
pub use policy::{
    LegalRandomPolicy, Policy, PolicyKind, RankMomentumPolicy, UniformPolicy,
    DEFAULT_MOMENTUM_THRESHOLD,
};
