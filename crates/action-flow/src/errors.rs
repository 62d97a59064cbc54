//! Engine error types
//!
//! Per-attempt failures are recorded as `FailureReason` data on the outcome;
//! these errors only cover misuse of the engine API.

use thiserror::Error;

/// Engine errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FlowError {
    /// Orchestrator configuration is out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A request in the batch is malformed
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// No session registered under this id
    #[error("Unknown session: {0}")]
    UnknownSession(String),

    /// No locator table for the platform
    #[error("Unknown platform: {0}")]
    UnknownPlatform(String),

    /// Gate could not be set up
    #[error("Gate error: {0}")]
    GateError(String),

    /// Recovery strategy could not be constructed
    #[error("Recovery error: {0}")]
    Recovery(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<action_gate::GateError> for FlowError {
    fn from(err: action_gate::GateError) -> Self {
        match err {
            action_gate::GateError::UnknownPlatform(platform) => FlowError::UnknownPlatform(platform),
            other => FlowError::GateError(other.to_string()),
        }
    }
}

impl From<cartpilot_core_types::CoreError> for FlowError {
    fn from(err: cartpilot_core_types::CoreError) -> Self {
        match err {
            cartpilot_core_types::CoreError::InvalidRequest(reason) => {
                FlowError::InvalidRequest(reason)
            }
        }
    }
}
