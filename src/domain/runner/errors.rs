//! Runner Context - Errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("invalid runner record {name}: {reason}")]
    InvalidRecord { name: String, reason: String },

    #[error("invalid runner command: {0}")]
    InvalidCommand(String),
}
