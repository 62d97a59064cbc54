//! Capability interface supplied by the automation collaborator

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{errors::ActionError, types::AnchorDescriptor};

/// Where a navigation landed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageLocation {
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
}

impl PageLocation {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: None,
        }
    }
}

/// Browser control primitives for one session's document.
///
/// `read_text` returns `Ok(None)` when nothing matches; absence is data, not an error.
#[async_trait]
pub trait Automation: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<PageLocation, ActionError>;

    async fn click(&self, anchor: &AnchorDescriptor) -> Result<(), ActionError>;

    async fn read_text(&self, anchor: &AnchorDescriptor) -> Result<Option<String>, ActionError>;

    async fn type_text(&self, anchor: &AnchorDescriptor, text: &str) -> Result<(), ActionError>;

    /// Cooperative delay
    async fn wait(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
