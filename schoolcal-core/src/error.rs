//! Error types for the school calendar pipeline.

use thiserror::Error;

/// Errors that can occur in schoolcal operations.
#[derive(Error, Debug)]
pub enum SchoolCalError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// A collaborator (extraction endpoint, git, remote copy) could not be reached.
    #[error("Transport error ({stage}): {message}")]
    Transport { stage: String, message: String },

    /// Extractor output was not a well-formed event list.
    /// `raw` holds the offending content, truncated for diagnostics.
    #[error("Parse error in {source_id}: {message}\n  response was: {raw}")]
    Parse {
        source_id: String,
        message: String,
        raw: String,
    },

    #[error("Snapshot failed validation:\n  - {}", .0.join("\n  - "))]
    Validation(Vec<String>),

    #[error("Consistency error: {0}")]
    Consistency(String),

    #[error("'{0}' not found in PATH")]
    ToolNotInstalled(String),

    #[error("{0} timed out after {1}s")]
    Timeout(String, u64),

    #[error("Another schoolcal run holds the lock at {0}")]
    Locked(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl SchoolCalError {
    pub fn transport(stage: &str, message: impl ToString) -> Self {
        SchoolCalError::Transport {
            stage: stage.to_string(),
            message: message.to_string(),
        }
    }

    /// True for failures worth retrying (network hiccups, slow collaborators).
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SchoolCalError::Transport { .. } | SchoolCalError::Timeout(..)
        )
    }
}

impl From<serde_json::Error> for SchoolCalError {
    fn from(e: serde_json::Error) -> Self {
        SchoolCalError::Serialization(e.to_string())
    }
}

/// Result type alias for schoolcal operations.
pub type SchoolCalResult<T> = Result<T, SchoolCalError>;
