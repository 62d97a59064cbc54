//! Action primitives implementation
//!
//! Five primitives the cart engine drives a session with:
//! 1. navigate - Navigate to URL and report where the document landed
//! 2. click - Click the element behind a handle
//! 3. type_text - Type text into an input
//! 4. read_text - Read an element's text, `None` when absent
//! 5. wait - Cooperative bounded delay

mod click;
mod navigate;
mod read_text;
mod type_text;
mod wait;

pub use click::*;
pub use navigate::*;
pub use read_text::*;
pub use type_text::*;
pub use wait::*;

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::{
    automation::Automation,
    errors::ActionError,
    types::{ActionReport, AnchorDescriptor, ExecCtx},
};

/// Action primitives trait
///
/// Each primitive is responsible for:
/// - Validating the execution context (cancellation, deadline)
/// - Executing the call through the automation collaborator
/// - Bounding the call by the context deadline
/// - Generating a report
#[async_trait]
pub trait ActionPrimitives: Send + Sync {
    /// Navigate to a URL
    async fn navigate(&self, ctx: &ExecCtx, url: &str) -> Result<ActionReport, ActionError>;

    /// Click an element
    async fn click(
        &self,
        ctx: &ExecCtx,
        anchor: &AnchorDescriptor,
    ) -> Result<ActionReport, ActionError>;

    /// Type text into an element
    async fn type_text(
        &self,
        ctx: &ExecCtx,
        anchor: &AnchorDescriptor,
        text: &str,
    ) -> Result<ActionReport, ActionError>;

    /// Read an element's text
    async fn read_text(
        &self,
        ctx: &ExecCtx,
        anchor: &AnchorDescriptor,
    ) -> Result<Option<String>, ActionError>;

    /// Wait for a fixed duration
    async fn wait(&self, ctx: &ExecCtx, duration: Duration) -> Result<ActionReport, ActionError>;
}

/// Default implementation of action primitives
pub struct DefaultActionPrimitives {
    /// Automation collaborator for the session
    automation: Arc<dyn Automation>,
}

impl DefaultActionPrimitives {
    /// Create a new primitives implementation
    pub fn new(automation: Arc<dyn Automation>) -> Self {
        Self { automation }
    }

    /// Get reference to the automation collaborator
    pub fn automation(&self) -> &Arc<dyn Automation> {
        &self.automation
    }

    /// Reject calls on cancelled or expired contexts
    pub(crate) fn check_ctx(ctx: &ExecCtx) -> Result<(), ActionError> {
        if ctx.is_cancelled() {
            return Err(ActionError::Interrupted("Context cancelled".to_string()));
        }
        if ctx.is_timeout() {
            return Err(ActionError::WaitTimeout(
                "Context deadline exceeded".to_string(),
            ));
        }
        Ok(())
    }

    /// Run a collaborator call bounded by the context deadline
    pub(crate) async fn bounded<T, F>(
        ctx: &ExecCtx,
        what: &str,
        call: F,
    ) -> Result<T, ActionError>
    where
        F: Future<Output = Result<T, ActionError>>,
    {
        tokio::select! {
            _ = ctx.cancel_token.cancelled() => {
                Err(ActionError::Interrupted(format!("{} cancelled", what)))
            }
            result = tokio::time::timeout(ctx.remaining_time(), call) => {
                match result {
                    Ok(inner) => inner,
                    Err(_) => Err(ActionError::WaitTimeout(format!(
                        "{} exceeded call deadline",
                        what
                    ))),
                }
            }
        }
    }
}

#[async_trait]
impl ActionPrimitives for DefaultActionPrimitives {
    async fn navigate(&self, ctx: &ExecCtx, url: &str) -> Result<ActionReport, ActionError> {
        navigate::execute_navigate(self, ctx, url).await
    }

    async fn click(
        &self,
        ctx: &ExecCtx,
        anchor: &AnchorDescriptor,
    ) -> Result<ActionReport, ActionError> {
        click::execute_click(self, ctx, anchor).await
    }

    async fn type_text(
        &self,
        ctx: &ExecCtx,
        anchor: &AnchorDescriptor,
        text: &str,
    ) -> Result<ActionReport, ActionError> {
        type_text::execute_type_text(self, ctx, anchor, text).await
    }

    async fn read_text(
        &self,
        ctx: &ExecCtx,
        anchor: &AnchorDescriptor,
    ) -> Result<Option<String>, ActionError> {
        read_text::execute_read_text(self, ctx, anchor).await
    }

    async fn wait(&self, ctx: &ExecCtx, duration: Duration) -> Result<ActionReport, ActionError> {
        wait::execute_wait(self, ctx, duration).await
    }
}
