//! Read text primitive

use crate::{
    errors::ActionError,
    primitives::DefaultActionPrimitives,
    types::{AnchorDescriptor, ExecCtx},
};
use tracing::debug;

/// Execute read text primitive
///
/// Returns `Ok(None)` when the element is absent. An `AnchorNotFound` from the
/// collaborator is folded into `None` as well.
pub async fn execute_read_text(
    primitives: &DefaultActionPrimitives,
    ctx: &ExecCtx,
    anchor: &AnchorDescriptor,
) -> Result<Option<String>, ActionError> {
    DefaultActionPrimitives::check_ctx(ctx)?;

    let result = DefaultActionPrimitives::bounded(
        ctx,
        "read_text",
        primitives.automation().read_text(anchor),
    )
    .await;

    match result {
        Ok(text) => {
            debug!(
                action_id = %ctx.action_id,
                anchor = %anchor,
                found = text.is_some(),
                "read_text completed"
            );
            Ok(text)
        }
        Err(ActionError::AnchorNotFound(_)) => Ok(None),
        Err(err) => Err(err),
    }
}
