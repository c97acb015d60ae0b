use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Buy,
    Sell,
    Hold,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StrategyError {
    #[error("unknown policy `{0}`; expected one of: uniform, legal-random, rank-momentum")]
    UnknownPolicy(String),
    #[error("threshold must be finite and within [0, 0.5)")]
    InvalidThreshold,
}

pub fn divergence(latest: f64, reference: f64) -> f64 {
    latest - reference
}

pub fn emit_signal(latest: f64, reference: f64, threshold: f64) -> Signal {
    let divergence = divergence(latest, reference);
    let threshold = threshold.abs();

    if divergence > threshold {
        Signal::Buy
    } else if divergence < -threshold {
        Signal::Sell
    } else {
        Signal::Hold
    }
}

/// Where the newest price sits in the window, in `[0, 1]`. A single-price
/// window sits in the middle.
pub fn latest_rank_position(values: &[f32], scaled: bool) -> f64 {
    let Some(latest) = values.last().copied() else {
        return 0.5;
    };
    if values.len() < 2 {
        return 0.5;
    }
    if scaled {
        return f64::from(latest);
    }

    (f64::from(latest) - 1.0) / (values.len() as f64 - 1.0)
}

#[cfg(test)]
mod tests {
    use super::{emit_signal, latest_rank_position, Signal};

    #[test]
    fn emits_buy_signal_when_latest_sits_above_threshold_band() {
        assert_eq!(emit_signal(0.9, 0.5, 0.2), Signal::Buy);
    }

    #[test]
    fn emits_sell_signal_when_latest_sits_below_threshold_band() {
        assert_eq!(emit_signal(0.1, 0.5, 0.2), Signal::Sell);
    }

    #[test]
    fn emits_hold_signal_when_divergence_is_within_threshold_band() {
        assert_eq!(emit_signal(0.6, 0.5, 0.2), Signal::Hold);
        assert_eq!(emit_signal(0.6, 0.5, -0.2), Signal::Hold);
    }

    #[test]
    fn rank_position_normalizes_unscaled_ranks() {
        assert_eq!(latest_rank_position(&[1.0, 2.0, 3.0, 4.0, 5.0], false), 1.0);
        assert_eq!(latest_rank_position(&[5.0, 4.0, 3.0, 2.0, 1.0], false), 0.0);
        assert_eq!(latest_rank_position(&[2.0, 3.0, 1.0], false), 0.0);
        assert_eq!(latest_rank_position(&[1.0], false), 0.5);
        assert_eq!(latest_rank_position(&[], false), 0.5);
        assert_eq!(latest_rank_position(&[0.0, 0.25], true), 0.25);
    }
}
