//! Error types for locator tables
//!
//! Only table loading fails; `locate` reports "not found" as an empty list.

use thiserror::Error;

/// Locator error enumeration
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LocatorError {
    /// Table file or directory could not be read
    #[error("Failed to read locator table '{path}': {reason}")]
    Io { path: String, reason: String },

    /// Table document is not valid YAML for a platform table
    #[error("Failed to parse locator table '{source_name}': {reason}")]
    Parse { source_name: String, reason: String },

    /// Table parsed but violates a table rule
    #[error("Invalid locator table for '{platform}': {reason}")]
    InvalidTable { platform: String, reason: String },
}

impl LocatorError {
    pub(crate) fn invalid(platform: impl Into<String>, reason: impl Into<String>) -> Self {
        LocatorError::InvalidTable {
            platform: platform.into(),
            reason: reason.into(),
        }
    }
}
