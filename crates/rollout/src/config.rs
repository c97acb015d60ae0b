use std::{env, str::FromStr};

use core_sim::{EngineError, EpisodeConfig};
use strategy::PolicyKind;
use thiserror::Error;

const DEFAULT_EPISODES: usize = 10;
const DEFAULT_SEED: u64 = 7;
const DEFAULT_POLICY: PolicyKind = PolicyKind::LegalRandom;
const DEFAULT_PARALLEL: bool = false;
const DEFAULT_REPLAY_OUTPUT_PATH: &str = "artifacts/replay.csv";

const ENV_EPISODES: &str = "ROLLOUT_EPISODES";
const ENV_SEED: &str = "ROLLOUT_SEED";
const ENV_POLICY: &str = "ROLLOUT_POLICY";
const ENV_PARALLEL: &str = "ROLLOUT_PARALLEL";
const ENV_REPLAY_OUTPUT: &str = "ROLLOUT_REPLAY_OUTPUT";
const ENV_NUM_STEPS: &str = "ROLLOUT_NUM_STEPS";
const ENV_MULTIPLE_UNITS: &str = "ROLLOUT_MULTIPLE_UNITS";
const ENV_NUM_PREV_OBS: &str = "ROLLOUT_NUM_PREV_OBS";
const ENV_SCALE: &str = "ROLLOUT_SCALE";
const ENV_OFFSET_SCALING: &str = "ROLLOUT_OFFSET_SCALING";

#[derive(Debug, Clone)]
pub struct Config {
    pub episodes: usize,
    pub seed: u64,
    pub policy: PolicyKind,
    pub parallel: bool,
    pub replay_output_path: String,
    pub episode: EpisodeConfig,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} must be {expected}")]
    Invalid {
        key: &'static str,
        expected: &'static str,
    },
    #[error("{key} contains non-unicode data")]
    NonUnicode { key: &'static str },
    #[error("ROLLOUT_REPLAY_OUTPUT must not be empty or whitespace")]
    InvalidReplayOutputPath,
    #[error("episode configuration rejected: {0}")]
    Episode(#[from] EngineError),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let episodes = parse_env(ENV_EPISODES, "a positive integer", |value| {
            value.parse::<usize>().ok().filter(|episodes| *episodes > 0)
        })?
        .unwrap_or(DEFAULT_EPISODES);

        let seed = parse_env(ENV_SEED, "an unsigned integer", |value| {
            value.parse::<u64>().ok()
        })?
        .unwrap_or(DEFAULT_SEED);

        let policy = parse_env(
            ENV_POLICY,
            "one of: uniform, legal-random, rank-momentum",
            |value| PolicyKind::from_str(value).ok(),
        )?
        .unwrap_or(DEFAULT_POLICY);

        let parallel = parse_env(ENV_PARALLEL, "true or false", parse_bool)?
            .unwrap_or(DEFAULT_PARALLEL);

        let replay_output_path = match env::var(ENV_REPLAY_OUTPUT) {
            Ok(value) => {
                if value.trim().is_empty() {
                    return Err(ConfigError::InvalidReplayOutputPath);
                }
                value
            }
            Err(env::VarError::NotPresent) => DEFAULT_REPLAY_OUTPUT_PATH.to_owned(),
            Err(env::VarError::NotUnicode(_)) => {
                return Err(ConfigError::NonUnicode {
                    key: ENV_REPLAY_OUTPUT,
                });
            }
        };

        let mut episode = EpisodeConfig::default();
        if let Some(num_steps) = parse_env(ENV_NUM_STEPS, "a positive integer", |value| {
            value.parse::<usize>().ok().filter(|value| *value > 0)
        })? {
            episode.num_steps = num_steps;
        }
        if let Some(allow) = parse_env(ENV_MULTIPLE_UNITS, "true or false", parse_bool)? {
            episode.allow_multiple_units = allow;
        }
        if let Some(window) = parse_env(ENV_NUM_PREV_OBS, "a positive integer", |value| {
            value.parse::<usize>().ok().filter(|value| *value > 0)
        })? {
            episode.num_prev_observations = window;
        }
        if let Some(scale) = parse_env(ENV_SCALE, "true or false", parse_bool)? {
            episode.scale = scale;
        }
        if let Some(offset_scaling) = parse_env(ENV_OFFSET_SCALING, "true or false", parse_bool)? {
            episode.offset_scaling = offset_scaling;
        }
        episode.validate()?;

        Ok(Self {
            episodes,
            seed,
            policy,
            parallel,
            replay_output_path,
            episode,
        })
    }
}

/// `Ok(None)` when `key` is unset.
fn parse_env<T>(
    key: &'static str,
    expected: &'static str,
    parse: impl FnOnce(&str) -> Option<T>,
) -> Result<Option<T>, ConfigError> {
    match env::var(key) {
        Ok(value) => parse(value.trim())
            .map(Some)
            .ok_or(ConfigError::Invalid { key, expected }),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(env::VarError::NotUnicode(_)) => Err(ConfigError::NonUnicode { key }),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}
