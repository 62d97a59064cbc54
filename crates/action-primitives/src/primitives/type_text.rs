//! Type text primitive

use crate::{
    errors::ActionError,
    primitives::DefaultActionPrimitives,
    types::{ActionReport, AnchorDescriptor, ExecCtx},
};
use chrono::Utc;
use std::time::Instant;
use tracing::info;

/// Execute type text primitive
pub async fn execute_type_text(
    primitives: &DefaultActionPrimitives,
    ctx: &ExecCtx,
    anchor: &AnchorDescriptor,
    text: &str,
) -> Result<ActionReport, ActionError> {
    let started_at = Utc::now();
    let start_instant = Instant::now();

    info!(
        action_id = %ctx.action_id,
        anchor = %anchor,
        text_len = text.len(),
        "Executing type_text primitive"
    );

    DefaultActionPrimitives::check_ctx(ctx)?;

    DefaultActionPrimitives::bounded(
        ctx,
        "type_text",
        primitives.automation().type_text(anchor, text),
    )
    .await?;

    let latency_ms = start_instant.elapsed().as_millis() as u64;
    Ok(ActionReport::success(started_at, latency_ms))
}
