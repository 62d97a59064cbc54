//! Click primitive

use crate::{
    errors::ActionError,
    primitives::DefaultActionPrimitives,
    types::{ActionReport, AnchorDescriptor, ExecCtx},
};
use chrono::Utc;
use std::time::Instant;
use tracing::{debug, info};

/// Execute click primitive
///
/// A successful click only means the collaborator accepted it. Platforms may
/// queue the effect behind an overlay, so callers verify state separately.
pub async fn execute_click(
    primitives: &DefaultActionPrimitives,
    ctx: &ExecCtx,
    anchor: &AnchorDescriptor,
) -> Result<ActionReport, ActionError> {
    let started_at = Utc::now();
    let start_instant = Instant::now();

    info!(action_id = %ctx.action_id, anchor = %anchor, "Executing click primitive");

    DefaultActionPrimitives::check_ctx(ctx)?;

    debug!("Issuing click for {}", anchor.to_selector());
    DefaultActionPrimitives::bounded(ctx, "click", primitives.automation().click(anchor)).await?;

    let latency_ms = start_instant.elapsed().as_millis() as u64;
    info!(
        action_id = %ctx.action_id,
        latency_ms = latency_ms,
        "Click completed successfully"
    );

    Ok(ActionReport::success(started_at, latency_ms))
}
