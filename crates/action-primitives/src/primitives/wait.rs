//! Wait primitive - cooperative bounded delay

use crate::{
    errors::ActionError,
    primitives::DefaultActionPrimitives,
    types::{ActionReport, ExecCtx},
};
use chrono::Utc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Execute wait primitive
///
/// The delay is clipped to the context deadline and ends early on cancellation.
pub async fn execute_wait(
    primitives: &DefaultActionPrimitives,
    ctx: &ExecCtx,
    duration: Duration,
) -> Result<ActionReport, ActionError> {
    let started_at = Utc::now();
    let start_instant = Instant::now();

    DefaultActionPrimitives::check_ctx(ctx)?;

    let bounded = duration.min(ctx.remaining_time());
    debug!(action_id = %ctx.action_id, wait_ms = bounded.as_millis() as u64, "Waiting");

    tokio::select! {
        _ = ctx.cancel_token.cancelled() => {
            return Err(ActionError::Interrupted("wait cancelled".to_string()));
        }
        _ = primitives.automation().wait(bounded) => {}
    }

    let latency_ms = start_instant.elapsed().as_millis() as u64;
    Ok(ActionReport::success(started_at, latency_ms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        automation::{Automation, PageLocation},
        primitives::ActionPrimitives,
        types::AnchorDescriptor,
    };
    use async_trait::async_trait;
    use std::sync::Arc;

    struct SlowAutomation;

    #[async_trait]
    impl Automation for SlowAutomation {
        async fn navigate(&self, url: &str) -> Result<PageLocation, ActionError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(PageLocation::new(url))
        }

        async fn click(&self, _anchor: &AnchorDescriptor) -> Result<(), ActionError> {
            Err(ActionError::AnchorNotFound("#missing".to_string()))
        }

        async fn read_text(
            &self,
            _anchor: &AnchorDescriptor,
        ) -> Result<Option<String>, ActionError> {
            Err(ActionError::AnchorNotFound("#missing".to_string()))
        }

        async fn type_text(
            &self,
            _anchor: &AnchorDescriptor,
            _text: &str,
        ) -> Result<(), ActionError> {
            Ok(())
        }
    }

    fn primitives() -> DefaultActionPrimitives {
        DefaultActionPrimitives::new(Arc::new(SlowAutomation))
    }

    #[tokio::test]
    async fn navigate_is_bounded_by_deadline() {
        let ctx = ExecCtx::with_timeout(Duration::from_millis(20));
        let err = primitives()
            .navigate(&ctx, "https://shop.test/dp/1")
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::NavTimeout(_)));
    }

    #[tokio::test]
    async fn read_text_folds_not_found_into_none() {
        let ctx = ExecCtx::with_timeout(Duration::from_secs(1));
        let text = primitives()
            .read_text(&ctx, &AnchorDescriptor::css("#missing"))
            .await
            .unwrap();
        assert!(text.is_none());
    }

    #[tokio::test]
    async fn click_surfaces_not_found() {
        let ctx = ExecCtx::with_timeout(Duration::from_secs(1));
        let err = primitives()
            .click(&ctx, &AnchorDescriptor::css("#missing"))
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::AnchorNotFound(_)));
    }

    #[tokio::test]
    async fn cancelled_context_is_rejected() {
        let ctx = ExecCtx::with_timeout(Duration::from_secs(1));
        ctx.cancel_token.cancel();
        let err = primitives()
            .wait(&ctx, Duration::from_millis(5))
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::Interrupted(_)));
    }

    #[tokio::test]
    async fn wait_completes() {
        let ctx = ExecCtx::with_timeout(Duration::from_secs(1));
        let report = primitives()
            .wait(&ctx, Duration::from_millis(5))
            .await
            .unwrap();
        assert!(report.ok);
    }
}
