//! HTTP transport to the UI-agent automation service

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::{
    automation::{Automation, PageLocation},
    errors::ActionError,
    types::AnchorDescriptor,
};

/// Default address of the UI-agent service
pub const DEFAULT_AGENT_URL: &str = "http://localhost:8000";

const NOT_FOUND_REASON: &str = "not_found";

/// Connection settings for [`UiAgentClient`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiAgentConfig {
    pub url: String,
    pub request_timeout_ms: u64,
    /// Load state the agent waits for after navigation
    pub wait_until: String,
}

impl Default for UiAgentConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_AGENT_URL.to_string(),
            request_timeout_ms: 30_000,
            wait_until: "domcontentloaded".to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct NavigateBody<'a> {
    url: &'a str,
    wait_until: &'a str,
}

#[derive(Debug, Serialize)]
struct SelectorBody<'a> {
    selector: &'a str,
}

#[derive(Debug, Serialize)]
struct FillBody<'a> {
    selector: &'a str,
    value: &'a str,
}

/// Envelope every UI-agent endpoint answers with
#[derive(Debug, Default, Deserialize)]
struct AgentResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

/// `Automation` implementation speaking JSON to the UI-agent service
pub struct UiAgentClient {
    client: Client,
    config: UiAgentConfig,
}

impl UiAgentClient {
    pub fn new(config: UiAgentConfig) -> Result<Self, ActionError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|err| ActionError::Internal(format!("failed to build HTTP client: {err}")))?;
        Ok(Self { client, config })
    }

    pub fn base_url(&self) -> &str {
        self.config.url.trim_end_matches('/')
    }

    /// Probe `GET /health`
    pub async fn health(&self) -> Result<(), ActionError> {
        let url = format!("{}/health", self.base_url());
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|err| ActionError::Transport(format!("health check failed: {err}")))?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(ActionError::Transport(format!(
                "health check returned {}",
                response.status()
            )))
        }
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<AgentResponse, ActionError> {
        let url = format!("{}{}", self.base_url(), path);
        debug!(target: "ui-agent", url = %url, "POST");
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|err| ActionError::Transport(format!("{path} request failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "<response unavailable>".to_string());
            warn!(target: "ui-agent", path, status = %status, body = %text, "agent call rejected");
            return Err(ActionError::Transport(format!("{path} returned {status}")));
        }

        response
            .json::<AgentResponse>()
            .await
            .map_err(|err| ActionError::Transport(format!("{path} returned malformed body: {err}")))
    }

    fn check(path: &str, selector: &str, response: &AgentResponse) -> Result<(), ActionError> {
        if response.success {
            return Ok(());
        }
        if response.reason.as_deref() == Some(NOT_FOUND_REASON) {
            return Err(ActionError::AnchorNotFound(selector.to_string()));
        }
        let detail = response
            .error
            .clone()
            .or_else(|| response.reason.clone())
            .unwrap_or_else(|| "unspecified failure".to_string());
        Err(ActionError::Transport(format!("{path}: {detail}")))
    }
}

#[async_trait]
impl Automation for UiAgentClient {
    async fn navigate(&self, url: &str) -> Result<PageLocation, ActionError> {
        let body = NavigateBody {
            url,
            wait_until: &self.config.wait_until,
        };
        let response = self.post("/browser/navigate", &body).await?;
        Self::check("/browser/navigate", url, &response)?;
        Ok(PageLocation {
            url: response.url.unwrap_or_else(|| url.to_string()),
            title: response.title,
        })
    }

    async fn click(&self, anchor: &AnchorDescriptor) -> Result<(), ActionError> {
        let selector = anchor.to_selector();
        let response = self
            .post("/browser/click", &SelectorBody { selector: &selector })
            .await?;
        Self::check("/browser/click", &selector, &response)
    }

    async fn read_text(&self, anchor: &AnchorDescriptor) -> Result<Option<String>, ActionError> {
        let selector = anchor.to_selector();
        let response = self
            .post("/browser/text", &SelectorBody { selector: &selector })
            .await?;
        match Self::check("/browser/text", &selector, &response) {
            Ok(()) => Ok(response.text),
            Err(ActionError::AnchorNotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn type_text(&self, anchor: &AnchorDescriptor, text: &str) -> Result<(), ActionError> {
        let selector = anchor.to_selector();
        let body = FillBody {
            selector: &selector,
            value: text,
        };
        let response = self.post("/browser/fill", &body).await?;
        Self::check("/browser/fill", &selector, &response)
    }
}
