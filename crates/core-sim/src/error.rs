use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("invalid action {code}: {reason}")]
    InvalidAction { code: i64, reason: &'static str },

    #[error("unsupported {kind} `{name}`")]
    UnsupportedConfiguration { kind: &'static str, name: String },

    #[error("invalid config field `{field}`: {reason}")]
    InvalidConfig {
        field: &'static str,
        reason: &'static str,
    },

    #[error("insufficient price history: {available} available, {required} required")]
    InsufficientHistory { available: usize, required: usize },

    #[error("no price has been recorded yet")]
    NoPriceRecorded,

    #[error("episode is finished; call reset before stepping again")]
    EpisodeFinished,
}

impl EngineError {
    pub(crate) fn unsupported(kind: &'static str, name: impl Into<String>) -> Self {
        Self::UnsupportedConfiguration {
            kind,
            name: name.into(),
        }
    }

    pub(crate) fn invalid_config(field: &'static str, reason: &'static str) -> Self {
        Self::InvalidConfig { field, reason }
    }
}
