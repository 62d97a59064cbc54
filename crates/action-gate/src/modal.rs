//! Modal interference detector
//!
//! A cart-mutating click can be accepted but queued behind an overlay. The
//! detector recognizes those overlays and releases them.

use action_locator::{InterferenceKind, ModalDefinition};
use action_primitives::{poll_until, ActionError};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::{context::GateContext, types::DismissOutcome};

/// Interference detector trait
#[async_trait]
pub trait InterferenceDetector: Send + Sync {
    /// Poll until an overlay shows or `timeout` elapses
    async fn poll_for_interference(&self, timeout: Duration) -> Option<InterferenceKind>;

    /// Release the overlay, decline actions first
    async fn dismiss(&self, kind: &InterferenceKind) -> DismissOutcome;
}

/// Default detector using the platform table's modal definitions
pub struct DefaultModalDetector {
    ctx: GateContext,
}

impl DefaultModalDetector {
    pub fn new(ctx: GateContext) -> Self {
        Self { ctx }
    }

    fn definition(&self, kind: &InterferenceKind) -> Option<&ModalDefinition> {
        self.ctx.table.modals.iter().find(|modal| &modal.kind == kind)
    }

    async fn is_showing(&self, modal: &ModalDefinition) -> Result<bool, ActionError> {
        self.ctx.resolver.any_present(&modal.detect).await
    }

    async fn detect_once(&self) -> Option<InterferenceKind> {
        for modal in &self.ctx.table.modals {
            match self.is_showing(modal).await {
                Ok(true) => return Some(modal.kind.clone()),
                Ok(false) => {}
                Err(err) => debug!(kind = %modal.kind, error = %err, "Modal lookup failed"),
            }
        }
        None
    }
}

#[async_trait]
impl InterferenceDetector for DefaultModalDetector {
    async fn poll_for_interference(&self, timeout: Duration) -> Option<InterferenceKind> {
        if self.ctx.table.modals.is_empty() {
            return None;
        }
        let found = poll_until(timeout, self.ctx.settings.poll_interval, move || {
            self.detect_once()
        }).await;
        match &found {
            Some(kind) => info!(platform = %self.ctx.platform, kind = %kind, "Interference detected"),
            None => debug!(platform = %self.ctx.platform, "No interference observed"),
        }
        found
    }

    async fn dismiss(&self, kind: &InterferenceKind) -> DismissOutcome {
        let failed = |reason: String| {
            warn!(kind = %kind, reason = %reason, "Dismissal failed");
            DismissOutcome::DismissFailed {
                kind: kind.clone(),
                reason,
            }
        };

        let Some(modal) = self.definition(kind) else {
            return failed(format!("no dismissal handles declared for {}", kind));
        };

        let mut clicked_any = false;
        for anchor in modal.dismissal_chain() {
            match self.ctx.resolver.click_anchor(anchor).await {
                Ok(true) => clicked_any = true,
                Ok(false) => continue,
                Err(err) => return failed(format!("click on {} failed: {}", anchor, err)),
            }

            if let Err(err) = self.ctx.resolver.pause(self.ctx.settings.dismiss_settle).await {
                return failed(format!("settle wait interrupted: {}", err));
            }

            match self.is_showing(modal).await {
                Ok(false) => {
                    info!(kind = %kind, via = %anchor, "Interference dismissed");
                    return DismissOutcome::Dismissed {
                        kind: kind.clone(),
                        via: anchor.to_selector(),
                    };
                }
                Ok(true) => debug!(kind = %kind, via = %anchor, "Overlay still present"),
                Err(err) => return failed(format!("presence re-check failed: {}", err)),
            }
        }

        if clicked_any {
            failed("overlay still present after dismissal".to_string())
        } else {
            failed("no dismissal handle resolved".to_string())
        }
    }
}
