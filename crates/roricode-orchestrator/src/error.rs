// Error types for orchestration

use roricode_abstraction::ModelError;
use thiserror::Error;

use crate::bus::BusError;

/// Result type for orchestration operations
pub type Result<T> = std::result::Result<T, OrchestrationError>;

/// Errors that end a round.
///
/// Tool failures are not in here: they are recorded as tool results and the
/// conversation carries on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrchestrationError {
    /// No usable profile, so no completion client exists
    #[error("Completion API not available: configure an API key for the active profile")]
    NotConfigured,

    /// The per-message completion round limit was hit
    #[error("Maximum tool call recursion depth ({0}) reached")]
    RecursionLimit(u32),

    /// Completion API failure
    #[error("Completion API error: {0}")]
    Model(#[from] ModelError),

    /// Event bus rejected a send
    #[error("Event bus error: {0}")]
    Bus(#[from] BusError),

    /// The service was stopped
    #[error("Orchestration cancelled")]
    Cancelled,

    /// `start` was called twice; the event receiver is already taken
    #[error("Chat service already started")]
    AlreadyStarted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_error_converts() {
        let err: OrchestrationError = ModelError::RequestError("offline".into()).into();
        assert_eq!(err.to_string(), "Completion API error: Request Error: offline");
    }

    #[test]
    fn test_recursion_limit_message() {
        assert_eq!(
            OrchestrationError::RecursionLimit(5).to_string(),
            "Maximum tool call recursion depth (5) reached"
        );
    }
}
