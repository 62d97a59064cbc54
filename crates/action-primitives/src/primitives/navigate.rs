//! Navigate primitive - Navigate to URL and report the landed location

use crate::{
    errors::ActionError,
    primitives::DefaultActionPrimitives,
    types::{ActionReport, ExecCtx},
};
use chrono::Utc;
use std::time::Instant;
use tracing::{debug, info};

/// Execute navigate primitive
///
/// Steps:
/// 1. Validate URL format
/// 2. Check execution context (not cancelled, not timeout)
/// 3. Issue the navigate call bounded by the context deadline
/// 4. Generate action report with the landed URL
pub async fn execute_navigate(
    primitives: &DefaultActionPrimitives,
    ctx: &ExecCtx,
    url: &str,
) -> Result<ActionReport, ActionError> {
    let started_at = Utc::now();
    let start_instant = Instant::now();

    info!(action_id = %ctx.action_id, url = %url, "Executing navigate primitive");

    if !validate_url(url) {
        return Err(ActionError::Internal(format!("Invalid URL: '{}'", url)));
    }

    DefaultActionPrimitives::check_ctx(ctx).map_err(|err| match err {
        ActionError::WaitTimeout(msg) => ActionError::NavTimeout(msg),
        other => other,
    })?;

    debug!("Issuing navigate call");
    let location = DefaultActionPrimitives::bounded(
        ctx,
        "navigate",
        primitives.automation().navigate(url),
    )
    .await
    .map_err(|err| match err {
        ActionError::WaitTimeout(msg) => ActionError::NavTimeout(msg),
        other => other,
    })?;

    let latency_ms = start_instant.elapsed().as_millis() as u64;
    info!(
        action_id = %ctx.action_id,
        latency_ms = latency_ms,
        url_after = %location.url,
        "Navigate completed successfully"
    );

    Ok(ActionReport::success(started_at, latency_ms).with_location(location.url, location.title))
}

fn validate_url(url: &str) -> bool {
    !url.is_empty()
        && (url.starts_with("http://") || url.starts_with("https://") || url.starts_with("file://"))
}

#[cfg(test)]
mod tests {
    use super::validate_url;

    #[test]
    fn test_url_validation() {
        assert!(validate_url("https://example.com"));
        assert!(validate_url("http://localhost:8080"));
        assert!(validate_url("file:///path/to/file.html"));

        assert!(!validate_url(""));
        assert!(!validate_url("example.com"));
        assert!(!validate_url("ftp://example.com"));
    }
}
