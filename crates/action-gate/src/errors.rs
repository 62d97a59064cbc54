//! Error types for verification gates

use action_primitives::ActionError;
use thiserror::Error;

/// Gate error enumeration
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GateError {
    /// No address label candidate resolved; the address is unknown
    #[error("Address unreadable: {0}")]
    AddressUnreadable(String),

    /// Navigation landed on a sign-in page
    #[error("Session expired: redirected to {url}")]
    SessionExpired { url: String },

    /// Navigation to a platform page failed
    #[error("Navigation failed: {0}")]
    Navigation(String),

    /// No locator table for the platform
    #[error("Unknown platform: {0}")]
    UnknownPlatform(String),

    /// Platform postal code pattern does not compile
    #[error("Invalid postal code pattern: {0}")]
    InvalidPattern(String),

    /// Primitive call failed
    #[error(transparent)]
    Action(#[from] ActionError),
}

impl GateError {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            GateError::AddressUnreadable(_) | GateError::Navigation(_) => true,
            GateError::Action(err) => err.is_retryable(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_follows_the_primitive_error() {
        assert!(GateError::AddressUnreadable("#label".into()).is_retryable());
        assert!(GateError::Action(ActionError::Transport("reset".into())).is_retryable());
        assert!(!GateError::Action(ActionError::Internal("bug".into())).is_retryable());
        assert!(!GateError::SessionExpired { url: "/ap/signin".into() }.is_retryable());
    }
}
