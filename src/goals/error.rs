use thiserror::Error;

use super::record::GoalId;

/// Failures of the goal store and engine. None of them are fatal: callers log them and carry
/// on with the in-memory state.
#[derive(Debug, Error)]
pub enum GoalError {
    /// The persisted blob couldn't be read back. Treated as an empty store.
    #[error("persisted goals are corrupted: {0}")]
    Decode(#[source] serde_json::Error),

    /// The in-memory goals couldn't be serialized. The previous blob stays authoritative.
    #[error("couldn't encode goals: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("goal not found: {0}")]
    NotFound(GoalId),

    #[error("duplicate goal id: {0}")]
    DuplicateId(GoalId),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    /// The engine task has stopped and no longer accepts commands.
    #[error("timer engine is not running")]
    EngineClosed,
}
