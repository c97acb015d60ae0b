use std::ops::Range;

use core_sim::{EngineError, EpisodeConfig, EpisodeController, EpisodeStatus};
use rayon::prelude::*;
use serde::Serialize;
use strategy::{Policy, PolicyKind};

use crate::logging::{RunLogEvent, RunLogEventKind, RunLogWriter, TracingRunLogWriter};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpisodeReport {
    pub index: usize,
    pub seed: Option<u64>,
    pub steps: usize,
    pub reward: f64,
    pub pnl: f64,
    pub pnl_pct: f64,
    pub trades: usize,
    pub outcome: EpisodeStatus,
}

impl EpisodeReport {
    pub fn truncated(&self) -> bool {
        self.outcome == EpisodeStatus::Truncated
    }
}

/// Plays the loaded episode to the end, resetting first if the previous one
/// already finished. Run-log events are keyed by `index`.
pub fn run_episode(
    index: usize,
    controller: &mut EpisodeController,
    policy: &mut dyn Policy,
    log: &mut dyn RunLogWriter,
) -> Result<EpisodeReport, EngineError> {
    let episode = index as u64;
    let mut observation = match controller.status() {
        EpisodeStatus::Running => controller.observation()?,
        EpisodeStatus::Done | EpisodeStatus::Truncated => {
            let observation = controller.reset()?;
            log.write(RunLogEvent::new(episode, 0, RunLogEventKind::EpisodeReset));
            observation
        }
    };

    let mut actions_taken = 0;
    loop {
        let step = controller.step_count();
        let code = policy.act(&observation, &controller.valid_actions());
        let result = controller.step(code)?;

        if result.truncated {
            log.write(
                RunLogEvent::new(episode, step, RunLogEventKind::EpisodeTruncated)
                    .with_value(result.reward),
            );
            return Ok(report(index, controller, actions_taken, result.reward));
        }

        actions_taken += 1;
        if let Some(action) = result.info.action {
            log.write(
                RunLogEvent::new(episode, step, RunLogEventKind::ActionApplied)
                    .with_action(action),
            );
        }
        for trade in &result.info.closed {
            log.write(
                RunLogEvent::new(episode, trade.exit_step, RunLogEventKind::PositionClosed)
                    .with_value(trade.pnl),
            );
        }

        if result.done {
            log.write(
                RunLogEvent::new(episode, step, RunLogEventKind::EpisodeDone)
                    .with_value(result.reward),
            );
            return Ok(report(index, controller, actions_taken, result.reward));
        }
        observation = result.observation;
    }
}

fn report(
    index: usize,
    controller: &EpisodeController,
    steps: usize,
    reward: f64,
) -> EpisodeReport {
    EpisodeReport {
        index,
        seed: controller.episode_seed(),
        steps,
        reward,
        pnl: controller.pnl(),
        pnl_pct: controller.pnl_pct(),
        trades: controller.closed_trades().len(),
        outcome: controller.status(),
    }
}

/// Builds a fresh controller and policy for episode `index` seeded with
/// `base_seed + index`, and plays it.
pub fn run_seeded_episode(
    config: &EpisodeConfig,
    policy_kind: PolicyKind,
    base_seed: u64,
    index: usize,
    log: &mut dyn RunLogWriter,
) -> Result<(EpisodeController, EpisodeReport), EngineError> {
    let seed = base_seed.wrapping_add(index as u64);
    let episode_config = EpisodeConfig {
        seed: Some(seed),
        ..config.clone()
    };
    let mut controller = EpisodeController::new(episode_config)?;
    let mut policy = policy_kind.build(seed);

    let report = run_episode(index, &mut controller, policy.as_mut(), log)?;
    Ok((controller, report))
}

/// Runs `episodes` independent episodes. Each owns its controller and policy,
/// so the parallel path only changes scheduling, not results.
pub fn run_batch(
    config: &EpisodeConfig,
    policy_kind: PolicyKind,
    base_seed: u64,
    episodes: usize,
    parallel: bool,
) -> Result<Vec<EpisodeReport>, EngineError> {
    run_batch_range(config, policy_kind, base_seed, 0..episodes, parallel)
}

/// Same as [`run_batch`] over an arbitrary index range; episode `i` is seeded
/// `base_seed + i` regardless of where the range starts.
pub fn run_batch_range(
    config: &EpisodeConfig,
    policy_kind: PolicyKind,
    base_seed: u64,
    indices: Range<usize>,
    parallel: bool,
) -> Result<Vec<EpisodeReport>, EngineError> {
    let run = |index: usize| {
        let mut log = TracingRunLogWriter;
        run_seeded_episode(config, policy_kind, base_seed, index, &mut log)
            .map(|(_, report)| report)
    };

    if parallel {
        indices.into_par_iter().map(run).collect()
    } else {
        indices.map(run).collect()
    }
}
