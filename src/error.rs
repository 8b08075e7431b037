use crate::orchestrator::ControllerState;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConsoleError>;

#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("an execution is already active (controller is {state})")]
    Conflict { state: ControllerState },

    #[error("no execution is currently running")]
    NotRunning,

    #[error("{resource} {id} not found")]
    NotFound { resource: &'static str, id: u64 },

    #[error("no keywords given: enter at least one comma-separated keyword")]
    EmptyInput,

    #[error("status fetch failed: {0}")]
    TransientFetch(String),

    #[error("API error (status {status}): {message}")]
    Remote { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl ConsoleError {
    /// Wrap any failure observed during a poll tick as a transient one.
    pub fn transient(err: ConsoleError) -> Self {
        match err {
            ConsoleError::TransientFetch(_) => err,
            other => ConsoleError::TransientFetch(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for ConsoleError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ConsoleError::Parse(err.to_string())
        } else {
            ConsoleError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ConsoleError {
    fn from(err: serde_json::Error) -> Self {
        ConsoleError::Parse(err.to_string())
    }
}
