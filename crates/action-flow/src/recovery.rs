//! Recovery strategy port
//!
//! Invoked at most once per item after deterministic retries are exhausted.
//! The strategy's reasoning is opaque; only its boolean-shaped verdict is used.

use action_gate::AddressSnapshot;
use async_trait::async_trait;
use cartpilot_core_types::{CartItemRequest, Platform, SessionId};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

use crate::{
    errors::FlowError,
    types::{AttemptRecord, RecoveryVerdict},
};

/// What the strategy is told about the item
#[derive(Debug, Clone, Serialize)]
pub struct RecoveryContext {
    pub session_id: SessionId,
    pub platform: Platform,
    pub request: CartItemRequest,
    pub product_url: String,
    pub cart_url: String,
    /// Last address read during the run, if any
    pub last_address: Option<AddressSnapshot>,
}

/// Recovery strategy trait
#[async_trait]
pub trait RecoveryStrategy: Send + Sync {
    /// Name recorded on the outcome
    fn name(&self) -> &str;

    async fn attempt_recovery(
        &self,
        context: &RecoveryContext,
        failure_history: &[AttemptRecord],
    ) -> RecoveryVerdict;
}

/// Settings for [`RemoteRecoveryStrategy`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteRecoveryConfig {
    pub url: String,
    pub timeout_ms: u64,
}

impl Default for RemoteRecoveryConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8000/agent/recover-cart".to_string(),
            timeout_ms: 120_000,
        }
    }
}

#[derive(Serialize)]
struct RecoveryRequest<'a> {
    context: &'a RecoveryContext,
    failure_history: &'a [AttemptRecord],
}

#[derive(Deserialize)]
struct RecoveryResponse {
    #[serde(default)]
    success: bool,
}

/// Delegates recovery to an HTTP service answering `{ "success": bool }`
pub struct RemoteRecoveryStrategy {
    client: Client,
    config: RemoteRecoveryConfig,
}

impl RemoteRecoveryStrategy {
    pub fn new(config: RemoteRecoveryConfig) -> Result<Self, FlowError> {
        if config.url.trim().is_empty() {
            return Err(FlowError::Recovery("recovery url is empty".to_string()));
        }
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|err| FlowError::Recovery(format!("failed to build HTTP client: {err}")))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl RecoveryStrategy for RemoteRecoveryStrategy {
    fn name(&self) -> &str {
        "remote"
    }

    async fn attempt_recovery(
        &self,
        context: &RecoveryContext,
        failure_history: &[AttemptRecord],
    ) -> RecoveryVerdict {
        let body = RecoveryRequest {
            context,
            failure_history,
        };
        info!(
            url = %self.config.url,
            product_id = %context.request.product_id,
            attempts = failure_history.len(),
            "Invoking remote recovery"
        );

        let response = match self.client.post(&self.config.url).json(&body).send().await {
            Ok(response) => response,
            Err(err) => {
                warn!(error = %err, "Recovery request failed");
                return RecoveryVerdict::StillFailed;
            }
        };
        if !response.status().is_success() {
            warn!(status = %response.status(), "Recovery service rejected request");
            return RecoveryVerdict::StillFailed;
        }
        match response.json::<RecoveryResponse>().await {
            Ok(RecoveryResponse { success: true }) => RecoveryVerdict::Success,
            Ok(_) => RecoveryVerdict::StillFailed,
            Err(err) => {
                warn!(error = %err, "Recovery response was malformed");
                RecoveryVerdict::StillFailed
            }
        }
    }
}
