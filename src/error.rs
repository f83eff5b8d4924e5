//! Error types for hoprag.
//!
//! Each layer has its own error enum: [`AgentError`] for the generator and
//! orchestration layer, [`RetrievalError`] for the passage index, and
//! [`CommandError`] for the CLI. [`Error`] unifies them at the boundary.

use thiserror::Error;

/// Result alias using the crate-wide [`Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Top-level error type surfaced to the CLI and HTTP boundary.
#[derive(Debug, Error)]
pub enum Error {
    /// Generator or orchestration failure.
    #[error(transparent)]
    Agent(#[from] AgentError),

    /// Passage index failure.
    #[error(transparent)]
    Retrieval(#[from] RetrievalError),

    /// CLI command failure.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the generator, the agent loop and the answer pipeline.
#[derive(Debug, Error)]
pub enum AgentError {
    /// No API key was configured.
    #[error("API key missing: set OPENAI_API_KEY or HOPRAG_API_KEY")]
    ApiKeyMissing,

    /// The configured provider name is not known.
    #[error("unsupported provider: {name}")]
    UnsupportedProvider {
        /// Provider name that was requested.
        name: String,
    },

    /// The generator API call failed.
    #[error("generation request failed: {message}")]
    ApiRequest {
        /// Provider error message.
        message: String,
        /// HTTP status, when known.
        status: Option<u16>,
    },

    /// The generator call exceeded its wall-clock budget.
    #[error("generation request timed out after {secs}s")]
    Timeout {
        /// Budget that was exceeded.
        secs: u64,
    },

    /// Token streaming failed mid-response.
    #[error("streaming failed: {message}")]
    Stream {
        /// Provider error message.
        message: String,
    },

    /// The provider cannot stream tokens.
    #[error("provider '{provider}' does not support streaming")]
    StreamingUnsupported {
        /// Provider name.
        provider: String,
    },

    /// A retrieval call failed while answering.
    #[error("retrieval failed: {0}")]
    Retrieval(#[from] RetrievalError),

    /// The agent loop could not produce an answer.
    #[error("orchestration failed: {message}")]
    Orchestration {
        /// What went wrong.
        message: String,
    },

    /// The loop was driven with an event its current phase does not accept.
    #[error("invalid transition: {event} while {phase}")]
    InvalidTransition {
        /// Phase the loop was in.
        phase: String,
        /// Event that was applied.
        event: String,
    },

    /// The model requested an action with unusable arguments.
    #[error("invalid arguments for '{name}': {message}")]
    ToolArguments {
        /// Action name.
        name: String,
        /// Parse failure.
        message: String,
    },

    /// The request was rejected before any work started.
    #[error("invalid query: {message}")]
    InvalidQuery {
        /// Validation failure.
        message: String,
    },

    /// The progress consumer went away.
    #[error("request cancelled: progress consumer disconnected")]
    Cancelled,
}

/// Errors from the passage index.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// `SQLite` failure.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The index connection lock was poisoned by a panicking holder.
    #[error("index connection lock poisoned")]
    Poisoned,

    /// A blocking search task failed to join.
    #[error("search task failed: {message}")]
    Task {
        /// Join failure.
        message: String,
    },

    /// A passage record could not be decoded during import.
    #[error("invalid passage record on line {line}: {message}")]
    InvalidRecord {
        /// 1-based line number.
        line: usize,
        /// Decode failure.
        message: String,
    },

    /// Import file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from CLI command execution.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The command ran but failed.
    #[error("{0}")]
    ExecutionFailed(String),

    /// Output could not be rendered.
    #[error("output format error: {0}")]
    OutputFormat(String),

    /// User input was rejected.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_error_display() {
        let err = AgentError::Orchestration {
            message: "no assistant turn".to_string(),
        };
        assert_eq!(err.to_string(), "orchestration failed: no assistant turn");
    }

    #[test]
    fn test_retrieval_error_wraps_into_agent_error() {
        let err: AgentError = RetrievalError::Poisoned.into();
        assert!(matches!(err, AgentError::Retrieval(RetrievalError::Poisoned)));
        assert!(err.to_string().contains("lock poisoned"));
    }

    #[test]
    fn test_error_is_transparent() {
        let err: Error = AgentError::Cancelled.into();
        assert_eq!(err.to_string(), AgentError::Cancelled.to_string());
    }
}
