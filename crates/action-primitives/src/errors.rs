//! Error types for action primitives

use thiserror::Error;

/// Error types for action primitive operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ActionError {
    /// Navigation did not finish before the call deadline
    #[error("Navigation timeout: {0}")]
    NavTimeout(String),

    /// Primitive did not finish before the call deadline
    #[error("Wait timeout: {0}")]
    WaitTimeout(String),

    /// Operation was cancelled or interrupted
    #[error("Operation interrupted: {0}")]
    Interrupted(String),

    /// No element matched the handle
    #[error("Anchor not found: {0}")]
    AnchorNotFound(String),

    /// Automation collaborator unreachable or returned a protocol error
    #[error("Transport error: {0}")]
    Transport(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ActionError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ActionError::NavTimeout(_) | ActionError::WaitTimeout(_) | ActionError::Transport(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(ActionError::Transport("reset".into()).is_retryable());
        assert!(ActionError::NavTimeout("slow".into()).is_retryable());
        assert!(!ActionError::AnchorNotFound("#x".into()).is_retryable());
        assert!(!ActionError::Interrupted("cancel".into()).is_retryable());
    }
}
