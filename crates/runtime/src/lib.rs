pub mod logging;
pub mod metrics;
pub mod replay;
pub mod runner;

/// Steps per second the single-threaded step loop is expected to sustain;
/// the benches report against it.
pub const TARGET_STEPS_PER_SEC: u64 = 200_000;

#[cfg(test)]
mod tests {
    use core_sim::EpisodeConfig;
    use strategy::PolicyKind;

    use crate::metrics::RolloutMetrics;
    use crate::runner::run_batch;

    #[test]
    fn batch_summary_counts_every_episode() {
        let config = EpisodeConfig {
            num_steps: 20,
            ..EpisodeConfig::default()
        };
        let reports = run_batch(&config, PolicyKind::Uniform, 11, 12, false).unwrap();

        let mut metrics = RolloutMetrics::new();
        metrics.extend(&reports);
        let summary = metrics.summary().expect("summary should exist");

        assert_eq!(summary.episodes, 12);
        assert_eq!(summary.completed + summary.truncated, 12);
        assert!(summary.min_reward <= summary.p50_reward);
        assert!(summary.p50_reward <= summary.p90_reward);
        assert!(summary.p99_reward <= summary.max_reward);
        assert!((0.0..=1.0).contains(&summary.win_rate));
    }

    #[test]
    fn rank_momentum_batch_is_deterministic() {
        let config = EpisodeConfig {
            num_steps: 30,
            noise: 0.5,
            seed: None,
            ..EpisodeConfig::default()
        };

        let first = run_batch(&config, PolicyKind::RankMomentum, 3, 4, true).unwrap();
        let second = run_batch(&config, PolicyKind::RankMomentum, 3, 4, true).unwrap();

        assert_eq!(first, second);
        assert!(first.iter().all(|report| !report.truncated()));
    }
}
