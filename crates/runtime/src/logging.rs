use core_sim::Action;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunLogEventKind {
    EpisodeReset,
    ActionApplied,
    PositionClosed,
    EpisodeTruncated,
    EpisodeDone,
    ReplayArtifactWritten,
}

/// One entry in a rollout journal. `value` carries the realized PnL for
/// closes and the reward for terminal events.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunLogEvent {
    pub episode: u64,
    pub step: usize,
    pub kind: RunLogEventKind,
    pub action: Option<Action>,
    pub value: Option<f64>,
}

impl RunLogEvent {
    pub fn new(episode: u64, step: usize, kind: RunLogEventKind) -> Self {
        Self {
            episode,
            step,
            kind,
            action: None,
            value: None,
        }
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.action = Some(action);
        self
    }

    pub fn with_value(mut self, value: f64) -> Self {
        self.value = Some(value);
        self
    }
}

pub trait RunLogWriter {
    fn write(&mut self, event: RunLogEvent);
}

#[derive(Debug, Default)]
pub struct InMemoryRunLogWriter {
    events: Vec<RunLogEvent>,
}

impl InMemoryRunLogWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[RunLogEvent] {
        &self.events
    }

    pub fn count(&self, kind: RunLogEventKind) -> usize {
        self.events.iter().filter(|event| event.kind == kind).count()
    }
}

impl RunLogWriter for InMemoryRunLogWriter {
    fn write(&mut self, event: RunLogEvent) {
        self.events.push(event);
    }
}

/// Forwards every event to `tracing`; per-step events at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingRunLogWriter;

impl RunLogWriter for TracingRunLogWriter {
    fn write(&mut self, event: RunLogEvent) {
        let action = event.action.map(Action::as_str);
        match event.kind {
            RunLogEventKind::ActionApplied | RunLogEventKind::PositionClosed => {
                tracing::debug!(
                    episode = event.episode,
                    step = event.step,
                    kind = ?event.kind,
                    action,
                    value = event.value,
                    "run log"
                );
            }
            RunLogEventKind::EpisodeTruncated => {
                tracing::warn!(
                    episode = event.episode,
                    step = event.step,
                    reward = event.value,
                    "episode truncated"
                );
            }
            RunLogEventKind::EpisodeReset
            | RunLogEventKind::EpisodeDone
            | RunLogEventKind::ReplayArtifactWritten => {
                tracing::info!(
                    episode = event.episode,
                    step = event.step,
                    kind = ?event.kind,
                    value = event.value,
                    "run log"
                );
            }
        }
    }
}
