use std::fmt;

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::EpisodeConfig;
use crate::error::EngineError;
use crate::generators::PriceGenerator;
use crate::ledger::{Action, ClosedTrade, PositionLedger};
use crate::observation::{Observation, ObservationEncoder, ObservationSpace};
use crate::reward::RewardScheme;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EpisodeStatus {
    Running,
    Done,
    Truncated,
}

/// What `step` does with a malformed or currently illegal action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strictness {
    /// End the episode with the configured penalty and `truncated = true`.
    #[default]
    Truncate,
    /// Return `EngineError::InvalidAction` and leave the episode untouched.
    Strict,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepInfo {
    pub step: usize,
    pub price: f64,
    pub pnl: f64,
    pub pnl_pct: f64,
    pub open_long: usize,
    pub open_short: usize,
    pub action: Option<Action>,
    pub closed: Vec<ClosedTrade>,
    pub truncation_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub observation: Observation,
    pub reward: f64,
    pub done: bool,
    pub truncated: bool,
    pub info: StepInfo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Seeding {
    Fixed(u64),
    Random,
    Injected,
}

/// Runs one trading episode at a time: advances the price process, forwards
/// actions to the ledger and scores the outcome.
///
/// Lifecycle: `Running --step--> Running | Done | Truncated`, and `reset`
/// from any state starts a fresh episode in `Running`.
pub struct EpisodeController {
    config: EpisodeConfig,
    strictness: Strictness,
    generator: PriceGenerator,
    ledger: PositionLedger,
    encoder: ObservationEncoder,
    reward: RewardScheme,
    rng: Box<dyn RngCore + Send>,
    seeding: Seeding,
    episode: u64,
    episode_seed: Option<u64>,
    step_count: usize,
    status: EpisodeStatus,
}

impl EpisodeController {
    /// Starts the first episode. Seeds from `config.seed` when set; the k-th
    /// reset then uses `seed + k`.
    pub fn new(config: EpisodeConfig) -> Result<Self, EngineError> {
        let seeding = match config.seed {
            Some(seed) => Seeding::Fixed(seed),
            None => Seeding::Random,
        };
        Self::build(config, Box::new(ChaCha8Rng::seed_from_u64(0)), seeding)
    }

    /// Starts the first episode with a caller-supplied noise source. The same
    /// source keeps streaming across resets.
    pub fn with_rng<R>(config: EpisodeConfig, rng: R) -> Result<Self, EngineError>
    where
        R: RngCore + Send + 'static,
    {
        Self::build(config, Box::new(rng), Seeding::Injected)
    }

    pub fn with_strictness(mut self, strictness: Strictness) -> Self {
        self.strictness = strictness;
        self
    }

    fn build(
        config: EpisodeConfig,
        rng: Box<dyn RngCore + Send>,
        seeding: Seeding,
    ) -> Result<Self, EngineError> {
        config.validate()?;

        let mut controller = Self {
            generator: PriceGenerator::from_config(&config)?,
            ledger: PositionLedger::new(config.allow_multiple_units),
            encoder: ObservationEncoder::from_config(&config),
            reward: RewardScheme::from_type(config.reward_type),
            strictness: Strictness::default(),
            rng,
            seeding,
            episode: 0,
            episode_seed: None,
            step_count: 0,
            status: EpisodeStatus::Running,
            config,
        };
        controller.start_episode()?;
        Ok(controller)
    }

    pub fn reset(&mut self) -> Result<Observation, EngineError> {
        self.episode += 1;
        self.start_episode()?;
        self.observation()
    }

    fn start_episode(&mut self) -> Result<(), EngineError> {
        self.episode_seed = match self.seeding {
            Seeding::Fixed(base) => Some(base.wrapping_add(self.episode)),
            Seeding::Random => Some(rand::random()),
            Seeding::Injected => None,
        };
        if let Some(seed) = self.episode_seed {
            self.rng = Box::new(ChaCha8Rng::seed_from_u64(seed));
        }

        self.generator = PriceGenerator::from_config(&self.config)?;
        self.ledger = PositionLedger::new(self.config.allow_multiple_units);
        self.ledger.record_price(self.generator.current_price());
        self.step_count = 0;
        self.status = EpisodeStatus::Running;

        debug!(
            episode = self.episode,
            seed = ?self.episode_seed,
            generator = %self.generator,
            "episode started"
        );
        Ok(())
    }

    /// Steps with a raw action code; codes outside `0..=4` are treated like
    /// illegal actions.
    pub fn step(&mut self, code: i64) -> Result<StepResult, EngineError> {
        self.ensure_running()?;

        match Action::try_from(code) {
            Ok(action) => self.step_action(action),
            Err(_) => self.reject(code, None, "action code must be within 0..=4"),
        }
    }

    pub fn step_action(&mut self, action: Action) -> Result<StepResult, EngineError> {
        self.ensure_running()?;

        if !self.ledger.is_legal(action) {
            return self.reject(
                action.code(),
                Some(action),
                "action is not legal for the open positions",
            );
        }

        let mut closed = self.ledger.apply(action)?;
        debug!(
            episode = self.episode,
            step = self.step_count,
            action = %action,
            price = self.generator.current_price(),
            closed = closed.len(),
            "action applied"
        );

        if self.step_count + 1 < self.config.num_steps {
            self.advance_price();
            let observation = self.observation()?;
            let reward = self.reward.reward(&self.ledger, false);

            return Ok(StepResult {
                observation,
                reward,
                done: false,
                truncated: false,
                info: self.info(Some(action), closed, None),
            });
        }

        closed.extend(self.ledger.close_all());
        self.status = EpisodeStatus::Done;
        let observation = self.observation()?;
        let reward = self.reward.reward(&self.ledger, true);
        info!(
            episode = self.episode,
            steps = self.config.num_steps,
            pnl = self.ledger.pnl(),
            pnl_pct = self.ledger.pnl_pct(),
            "episode done"
        );

        Ok(StepResult {
            observation,
            reward,
            done: true,
            truncated: false,
            info: self.info(Some(action), closed, None),
        })
    }

    fn reject(
        &mut self,
        code: i64,
        action: Option<Action>,
        reason: &'static str,
    ) -> Result<StepResult, EngineError> {
        if self.strictness == Strictness::Strict {
            return Err(EngineError::InvalidAction { code, reason });
        }

        let observation = self.observation()?;
        self.status = EpisodeStatus::Truncated;
        warn!(
            episode = self.episode,
            step = self.step_count,
            code,
            reason,
            "episode truncated"
        );

        Ok(StepResult {
            observation,
            reward: self.config.invalid_action_penalty,
            done: false,
            truncated: true,
            info: self.info(action, Vec::new(), Some(reason.to_string())),
        })
    }

    fn ensure_running(&self) -> Result<(), EngineError> {
        match self.status {
            EpisodeStatus::Running => Ok(()),
            EpisodeStatus::Done | EpisodeStatus::Truncated => Err(EngineError::EpisodeFinished),
        }
    }

    fn advance_price(&mut self) {
        let price = self.generator.next_price(self.rng.as_mut());
        self.ledger.record_price(price);
        self.step_count += 1;
    }

    fn info(
        &self,
        action: Option<Action>,
        closed: Vec<ClosedTrade>,
        truncation_reason: Option<String>,
    ) -> StepInfo {
        StepInfo {
            step: self.step_count,
            price: self.generator.current_price(),
            pnl: self.ledger.pnl(),
            pnl_pct: self.ledger.pnl_pct(),
            open_long: self.ledger.open_long().len(),
            open_short: self.ledger.open_short().len(),
            action,
            closed,
            truncation_reason,
        }
    }

    pub fn observation(&self) -> Result<Observation, EngineError> {
        self.encoder.encode(self.ledger.price_history())
    }

    pub fn observation_space(&self) -> ObservationSpace {
        self.encoder.observation_space()
    }

    /// Legal actions for the current state; empty once the episode has ended.
    pub fn valid_actions(&self) -> Vec<Action> {
        match self.status {
            EpisodeStatus::Running => self.ledger.legal_actions(),
            EpisodeStatus::Done | EpisodeStatus::Truncated => Vec::new(),
        }
    }

    pub fn valid_action_codes(&self) -> Vec<i64> {
        self.valid_actions()
            .into_iter()
            .map(Action::code)
            .collect()
    }

    pub fn current_price(&self) -> f64 {
        self.generator.current_price()
    }

    pub fn pnl(&self) -> f64 {
        self.ledger.pnl()
    }

    pub fn pnl_pct(&self) -> f64 {
        self.ledger.pnl_pct()
    }

    pub fn price_history(&self) -> &[f64] {
        self.ledger.price_history()
    }

    pub fn action_history(&self) -> &[Action] {
        self.ledger.action_history()
    }

    pub fn closed_trades(&self) -> &[ClosedTrade] {
        self.ledger.closed_trades()
    }

    pub fn ledger(&self) -> &PositionLedger {
        &self.ledger
    }

    pub fn step_count(&self) -> usize {
        self.step_count
    }

    pub fn status(&self) -> EpisodeStatus {
        self.status
    }

    pub fn episode(&self) -> u64 {
        self.episode
    }

    pub fn episode_seed(&self) -> Option<u64> {
        self.episode_seed
    }

    pub fn config(&self) -> &EpisodeConfig {
        &self.config
    }
}

impl fmt::Debug for EpisodeController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EpisodeController")
            .field("config", &self.config)
            .field("strictness", &self.strictness)
            .field("generator", &self.generator)
            .field("ledger", &self.ledger)
            .field("episode", &self.episode)
            .field("episode_seed", &self.episode_seed)
            .field("step_count", &self.step_count)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::mock::StepRng;
    use serde_json::json;

    use super::{EpisodeController, EpisodeStatus, Strictness};
    use crate::config::EpisodeConfig;
    use crate::error::EngineError;
    use crate::ledger::Action;
    use crate::observation::Observation;

    fn flat_config(num_steps: usize) -> EpisodeConfig {
        EpisodeConfig {
            slope: 2.0,
            noise: 0.0,
            starting_price: 100.0,
            num_steps,
            seed: Some(11),
            ..EpisodeConfig::default()
        }
    }

    #[test]
    fn new_episode_records_starting_price() {
        let controller = EpisodeController::new(flat_config(10)).unwrap();

        assert_eq!(controller.price_history(), &[100.0]);
        assert_eq!(controller.status(), EpisodeStatus::Running);
        assert_eq!(controller.step_count(), 0);
        assert_eq!(controller.observation().unwrap(), Observation::Ranks(vec![1]));
    }

    #[test]
    fn non_terminal_steps_pay_zero_and_advance_price() {
        let mut controller = EpisodeController::new(flat_config(10)).unwrap();

        let result = controller.step_action(Action::Buy).unwrap();

        assert_eq!(result.reward, 0.0);
        assert!(!result.done);
        assert!(!result.truncated);
        assert_eq!(result.observation, Observation::Ranks(vec![1, 2]));
        assert_eq!(controller.current_price(), 102.0);
        assert_eq!(result.info.step, 1);
        assert_eq!(result.info.open_long, 1);
    }

    #[test]
    fn episode_is_done_on_exactly_the_nth_step() {
        let mut controller = EpisodeController::new(flat_config(4)).unwrap();

        for _ in 0..3 {
            let result = controller.step_action(Action::Hold).unwrap();
            assert!(!result.done);
        }
        let result = controller.step_action(Action::Hold).unwrap();

        assert!(result.done);
        assert!(!result.truncated);
        assert_eq!(controller.status(), EpisodeStatus::Done);
        assert_eq!(controller.price_history().len(), 4);
    }

    #[test]
    fn final_step_force_closes_and_pays_pnl_pct() {
        let mut controller = EpisodeController::new(flat_config(3)).unwrap();

        controller.step_action(Action::Buy).unwrap();
        controller.step_action(Action::Buy).unwrap();
        let result = controller.step_action(Action::Hold).unwrap();

        // Longs opened at 100 and 102, force-closed at 104.
        let expected_pct = 4.0 + (104.0 / 102.0 - 1.0) * 100.0;
        assert!(result.done);
        assert!((result.reward - expected_pct).abs() < 1e-9);
        assert!((controller.pnl() - 6.0).abs() < 1e-9);
        assert!(controller.ledger().open_long().is_empty());
        assert_eq!(result.info.closed.len(), 2);
    }

    #[test]
    fn illegal_action_truncates_with_penalty_and_keeps_positions() {
        let mut controller = EpisodeController::new(flat_config(10)).unwrap();
        controller.step_action(Action::Buy).unwrap();
        controller.step_action(Action::Buy).unwrap();
        let positions_before = controller.ledger().open_long().to_vec();

        let result = controller.step_action(Action::Sell).unwrap();

        assert!(result.truncated);
        assert!(!result.done);
        assert_eq!(result.reward, -100.0);
        assert_eq!(controller.status(), EpisodeStatus::Truncated);
        assert_eq!(controller.ledger().open_long(), positions_before.as_slice());
        assert_eq!(controller.action_history(), &[Action::Buy, Action::Buy]);
        assert!(result.info.truncation_reason.is_some());
    }

    #[test]
    fn malformed_code_truncates() {
        let mut controller = EpisodeController::new(flat_config(10)).unwrap();

        let result = controller.step(7).unwrap();

        assert!(result.truncated);
        assert_eq!(result.reward, -100.0);
        assert!(controller.action_history().is_empty());

        let mut controller = EpisodeController::new(flat_config(10)).unwrap();
        assert!(controller.step(-1).unwrap().truncated);
    }

    #[test]
    fn strict_mode_raises_instead_of_truncating() {
        let mut controller = EpisodeController::new(flat_config(10))
            .unwrap()
            .with_strictness(Strictness::Strict);

        let err = controller.step(Action::BuyAll.code()).unwrap_err();

        assert!(matches!(err, EngineError::InvalidAction { code: 3, .. }));
        assert_eq!(controller.status(), EpisodeStatus::Running);
        assert!(controller.step(Action::Hold.code()).is_ok());
    }

    #[test]
    fn strict_mode_rejects_malformed_codes() {
        let mut controller = EpisodeController::new(flat_config(10))
            .unwrap()
            .with_strictness(Strictness::Strict);

        let err = controller.step(9).unwrap_err();

        assert!(matches!(err, EngineError::InvalidAction { code: 9, .. }));
        assert_eq!(controller.status(), EpisodeStatus::Running);
        assert_eq!(controller.price_history(), &[100.0]);
    }

    #[test]
    fn scaled_observations_carry_the_offset_through_step() {
        let config = EpisodeConfig {
            scale: true,
            offset_scaling: true,
            min_offset: 0.1,
            ..flat_config(10)
        };
        let mut controller = EpisodeController::new(config).unwrap();

        controller.step_action(Action::Hold).unwrap();
        let result = controller.step_action(Action::Hold).unwrap();

        let values = match &result.observation {
            Observation::Scaled(values) => values,
            other => panic!("expected a scaled observation, got {other:?}"),
        };
        let expected = [0.1_f32, 0.55, 1.0];
        assert_eq!(values.len(), expected.len());
        for (actual, expected) in values.iter().zip(expected) {
            assert!((actual - expected).abs() < 1e-6, "got {values:?}");
        }
    }

    #[test]
    fn stepping_a_finished_episode_requires_reset() {
        let mut controller = EpisodeController::new(flat_config(1)).unwrap();
        assert!(controller.step_action(Action::Hold).unwrap().done);

        assert_eq!(
            controller.step_action(Action::Hold).unwrap_err(),
            EngineError::EpisodeFinished
        );
        assert!(controller.valid_actions().is_empty());

        let observation = controller.reset().unwrap();
        assert_eq!(observation, Observation::Ranks(vec![1]));
        assert_eq!(controller.status(), EpisodeStatus::Running);
        assert_eq!(controller.price_history(), &[100.0]);
        assert_eq!(controller.pnl(), 0.0);
    }

    #[test]
    fn valid_actions_follow_ledger_legality() {
        let mut controller = EpisodeController::new(flat_config(10)).unwrap();
        assert_eq!(controller.valid_action_codes(), vec![0, 1, 2]);

        controller.step_action(Action::Buy).unwrap();
        assert_eq!(
            controller.valid_actions(),
            vec![Action::Buy, Action::Hold, Action::SellAll]
        );
    }

    #[test]
    fn seeded_resets_are_reproducible() {
        let config = EpisodeConfig {
            noise: 1.0,
            num_steps: 20,
            seed: Some(5),
            ..EpisodeConfig::default()
        };
        let mut first = EpisodeController::new(config.clone()).unwrap();
        let mut second = EpisodeController::new(config).unwrap();

        for _ in 0..5 {
            first.step_action(Action::Hold).unwrap();
            second.step_action(Action::Hold).unwrap();
        }
        assert_eq!(first.price_history(), second.price_history());
        assert_eq!(first.episode_seed(), Some(5));

        first.reset().unwrap();
        assert_eq!(first.episode_seed(), Some(6));
        first.step_action(Action::Hold).unwrap();
        assert_ne!(first.price_history()[1], second.price_history()[1]);
    }

    #[test]
    fn injected_noise_source_drives_prices() {
        let config = EpisodeConfig {
            slope: 0.0,
            noise: 1.0,
            num_steps: 5,
            ..EpisodeConfig::default()
        };
        let mut a = EpisodeController::with_rng(config.clone(), StepRng::new(0, 0)).unwrap();
        let mut b = EpisodeController::with_rng(config, StepRng::new(0, 0)).unwrap();

        a.step_action(Action::Hold).unwrap();
        b.step_action(Action::Hold).unwrap();

        assert_eq!(a.current_price(), b.current_price());
        assert_eq!(a.episode_seed(), None);
    }

    #[test]
    fn insufficient_history_surfaces_when_window_must_be_full() {
        let config = EpisodeConfig {
            allow_variable_length_window: false,
            ..flat_config(10)
        };
        let controller = EpisodeController::new(config).unwrap();

        assert_eq!(
            controller.observation().unwrap_err(),
            EngineError::InsufficientHistory {
                available: 1,
                required: 5,
            }
        );
    }

    #[test]
    fn unsupported_config_fails_at_construction() {
        let config = EpisodeConfig {
            num_steps: 0,
            ..EpisodeConfig::default()
        };

        assert!(matches!(
            EpisodeController::new(config),
            Err(EngineError::InvalidConfig {
                field: "num_steps",
                ..
            })
        ));
    }

    #[test]
    fn step_result_serializes_for_collaborators() {
        let mut controller = EpisodeController::new(flat_config(10)).unwrap();
        let result = controller.step_action(Action::Hold).unwrap();

        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["observation"], json!({ "kind": "ranks", "values": [1, 2] }));
        assert_eq!(json["done"], json!(false));
        assert_eq!(json["info"]["action"], json!("hold"));
        assert_eq!(json["info"]["price"], json!(102.0));
    }
}
