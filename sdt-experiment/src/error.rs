use std::path::PathBuf;
use thiserror::Error;

/// Faults in configuration or materials. All of them are raised before the
/// first timed loop starts.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("participant {0:?} has no counterbalancing entry")]
    UnknownParticipant(String),

    #[error("malformed assignment for participant {participant:?}: {reason}")]
    MalformedAssignment { participant: String, reason: String },

    #[error("no {table} ordering with index {key:?}")]
    UnknownPermutation { table: &'static str, key: String },

    #[error("instruction {0:?} is missing")]
    MissingInstruction(String),

    #[error("word lists: {0}")]
    WordList(String),

    #[error("invalid ISI range [{lower}, {upper}] step {step}")]
    InvalidIsiRange { lower: u64, upper: u64, step: u64 },

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl ConfigError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.into(),
            source,
        }
    }
}

/// Why a run stopped before completing.
#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The participant or operator pressed the abort key. Nothing is written.
    #[error("run aborted by user")]
    Aborted,

    #[error(transparent)]
    Surface(#[from] anyhow::Error),

    #[error("failed to persist results: {0}")]
    Persist(#[source] std::io::Error),
}

impl RunError {
    pub fn is_abort(&self) -> bool {
        matches!(self, RunError::Aborted)
    }
}
