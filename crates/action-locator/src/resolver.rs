//! Candidate resolution through the action primitives
//!
//! Walks a candidate list in priority order. "Not found" moves on to the next
//! candidate; transport errors and timeouts abort the chain.

use action_primitives::{ActionError, ActionPrimitives, AnchorDescriptor, ExecCtx};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::types::Candidate;

/// Candidate whose text was read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedText {
    pub candidate: Candidate,
    pub text: String,
}

/// Resolves candidate chains with a per-call deadline
#[derive(Clone)]
pub struct CandidateResolver {
    primitives: Arc<dyn ActionPrimitives>,
    call_timeout: Duration,
}

impl CandidateResolver {
    pub fn new(primitives: Arc<dyn ActionPrimitives>, call_timeout: Duration) -> Self {
        Self {
            primitives,
            call_timeout,
        }
    }

    pub fn primitives(&self) -> &Arc<dyn ActionPrimitives> {
        &self.primitives
    }

    /// Fresh context for one primitive call
    pub fn ctx(&self) -> ExecCtx {
        ExecCtx::with_timeout(self.call_timeout)
    }

    /// First candidate whose text is present and not blank
    pub async fn first_readable(
        &self,
        candidates: &[Candidate],
    ) -> Result<Option<ResolvedText>, ActionError> {
        for candidate in candidates {
            let text = self.primitives.read_text(&self.ctx(), &candidate.anchor).await?;
            match text {
                Some(text) if !text.trim().is_empty() => {
                    debug!(
                        target_name = %candidate.target,
                        anchor = %candidate.anchor,
                        strategy = candidate.strategy.name(),
                        "Resolved readable candidate"
                    );
                    return Ok(Some(ResolvedText {
                        candidate: candidate.clone(),
                        text: text.trim().to_string(),
                    }));
                }
                _ => debug!(anchor = %candidate.anchor, "Candidate not readable"),
            }
        }
        Ok(None)
    }

    /// First candidate that is present at all, blank text included
    pub async fn first_present(
        &self,
        candidates: &[Candidate],
    ) -> Result<Option<Candidate>, ActionError> {
        for candidate in candidates {
            if self
                .primitives
                .read_text(&self.ctx(), &candidate.anchor)
                .await?
                .is_some()
            {
                return Ok(Some(candidate.clone()));
            }
        }
        Ok(None)
    }

    /// Click the first candidate that resolves
    pub async fn click_first(
        &self,
        candidates: &[Candidate],
    ) -> Result<Option<Candidate>, ActionError> {
        for candidate in candidates {
            match self.primitives.click(&self.ctx(), &candidate.anchor).await {
                Ok(_) => {
                    info!(
                        target_name = %candidate.target,
                        anchor = %candidate.anchor,
                        priority = candidate.priority,
                        "Clicked candidate"
                    );
                    return Ok(Some(candidate.clone()));
                }
                Err(ActionError::AnchorNotFound(_)) => {
                    debug!(anchor = %candidate.anchor, "Candidate not found, trying next");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(None)
    }

    /// Type into the first candidate that resolves
    pub async fn type_first(
        &self,
        candidates: &[Candidate],
        text: &str,
    ) -> Result<Option<Candidate>, ActionError> {
        for candidate in candidates {
            match self
                .primitives
                .type_text(&self.ctx(), &candidate.anchor, text)
                .await
            {
                Ok(_) => return Ok(Some(candidate.clone())),
                Err(ActionError::AnchorNotFound(_)) => {
                    debug!(anchor = %candidate.anchor, "Candidate not found, trying next");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(None)
    }

    /// Whether any of the raw handles is present
    pub async fn any_present(&self, anchors: &[AnchorDescriptor]) -> Result<bool, ActionError> {
        for anchor in anchors {
            if self.primitives.read_text(&self.ctx(), anchor).await?.is_some() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Click a raw handle; `Ok(false)` when it does not resolve
    pub async fn click_anchor(&self, anchor: &AnchorDescriptor) -> Result<bool, ActionError> {
        match self.primitives.click(&self.ctx(), anchor).await {
            Ok(_) => Ok(true),
            Err(ActionError::AnchorNotFound(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Read text of an exact handle; `None` when absent
    pub async fn read(&self, candidate: &Candidate) -> Result<Option<String>, ActionError> {
        self.primitives.read_text(&self.ctx(), &candidate.anchor).await
    }

    /// Cooperative bounded delay
    pub async fn pause(&self, duration: Duration) -> Result<(), ActionError> {
        let ctx = ExecCtx::with_timeout(duration + self.call_timeout);
        self.primitives.wait(&ctx, duration).await.map(|_| ())
    }
}
