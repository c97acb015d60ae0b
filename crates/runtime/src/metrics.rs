use serde::Serialize;

use crate::runner::EpisodeReport;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RolloutSummary {
    pub episodes: usize,
    pub completed: usize,
    pub truncated: usize,
    pub win_rate: f64,
    pub mean_reward: f64,
    pub mean_pnl: f64,
    pub p50_reward: f64,
    pub p90_reward: f64,
    pub p99_reward: f64,
    pub min_reward: f64,
    pub max_reward: f64,
}

#[derive(Debug, Default, Clone)]
pub struct RolloutMetrics {
    rewards: Vec<f64>,
    pnls: Vec<f64>,
    truncated: usize,
    wins: usize,
}

impl RolloutMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, report: &EpisodeReport) {
        self.rewards.push(report.reward);
        self.pnls.push(report.pnl);
        if report.truncated() {
            self.truncated += 1;
        } else if report.reward > 0.0 {
            self.wins += 1;
        }
    }

    pub fn summary(&self) -> Option<RolloutSummary> {
        if self.rewards.is_empty() {
            return None;
        }

        let mut sorted = self.rewards.clone();
        sorted.sort_by(f64::total_cmp);
        let episodes = sorted.len();
        let completed = episodes - self.truncated;
        let win_rate = if completed == 0 {
            0.0
        } else {
            self.wins as f64 / completed as f64
        };

        Some(RolloutSummary {
            episodes,
            completed,
            truncated: self.truncated,
            win_rate,
            mean_reward: mean(&self.rewards),
            mean_pnl: mean(&self.pnls),
            p50_reward: percentile_nearest_rank(&sorted, 50),
            p90_reward: percentile_nearest_rank(&sorted, 90),
            p99_reward: percentile_nearest_rank(&sorted, 99),
            min_reward: sorted[0],
            max_reward: sorted[episodes - 1],
        })
    }
}

impl<'a> Extend<&'a EpisodeReport> for RolloutMetrics {
    fn extend<I: IntoIterator<Item = &'a EpisodeReport>>(&mut self, reports: I) {
        for report in reports {
            self.record(report);
        }
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Nearest-rank percentile of an ascending slice. Panics on an empty slice.
pub fn percentile_nearest_rank<T: Copy>(sorted: &[T], percentile: usize) -> T {
    let count = sorted.len();
    let rank = (percentile * count).div_ceil(100);
    sorted[rank.saturating_sub(1)]
}
