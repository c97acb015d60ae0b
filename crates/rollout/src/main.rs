mod config;

use std::error::Error;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

use core_sim::{EngineError, EpisodeController};
use runtime::logging::{RunLogWriter, TracingRunLogWriter};
use runtime::metrics::RolloutMetrics;
use runtime::replay::ReplayCsvWriter;
use runtime::runner::{run_batch_range, run_seeded_episode, EpisodeReport};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn Error>> {
    init_logging();

    let config = config::Config::from_env()?;
    info!(
        episodes = config.episodes,
        seed = config.seed,
        policy = %config.policy,
        parallel = config.parallel,
        num_steps = config.episode.num_steps,
        "starting rollout"
    );

    let (first_episode, reports) = run_rollout(&config, &mut TracingRunLogWriter)?;
    write_replay_output(&config.replay_output_path, &first_episode)?;

    let mut metrics = RolloutMetrics::new();
    metrics.extend(&reports);
    if let Some(summary) = metrics.summary() {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }
    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}

/// Plays episode 0 in place so its controller can feed the replay export,
/// then the remaining indices through the batch runner.
fn run_rollout(
    config: &config::Config,
    log: &mut dyn RunLogWriter,
) -> Result<(EpisodeController, Vec<EpisodeReport>), EngineError> {
    let (first_episode, first_report) =
        run_seeded_episode(&config.episode, config.policy, config.seed, 0, log)?;

    let mut reports = Vec::with_capacity(config.episodes);
    reports.push(first_report);
    reports.extend(run_batch_range(
        &config.episode,
        config.policy,
        config.seed,
        1..config.episodes,
        config.parallel,
    )?);
    Ok((first_episode, reports))
}

fn write_replay_output(path: &str, controller: &EpisodeController) -> Result<usize, std::io::Error> {
    let replay_path = Path::new(path);

    if let Some(parent) = replay_path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
    {
        fs::create_dir_all(parent)?;
    }

    let replay_file = BufWriter::new(File::create(replay_path)?);
    let mut replay_writer = ReplayCsvWriter::new(replay_file);
    replay_writer.write_episode_and_log(0, controller, &mut TracingRunLogWriter)
}
