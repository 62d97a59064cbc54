//! Core types for cart orchestration

use action_gate::{AddressSnapshot, CartDelta, GateSettings};
use action_locator::InterferenceKind;
use cartpilot_core_types::CartItemRequest;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::errors::FlowError;

/// Delay growth between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffMode {
    /// Same delay before every retry
    Fixed,
    /// Delay doubles per retry, capped at `max_backoff_ms`
    Exponential,
}

/// Orchestrator knobs, all waits in milliseconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Attempts per item, at least 1
    pub max_attempts_per_item: u32,

    /// Delay between attempts
    pub attempt_backoff_ms: u64,

    pub backoff_mode: BackoffMode,

    pub max_backoff_ms: u64,

    /// Consecutive failures with one reason that end deterministic retries;
    /// unset means the attempt budget
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_same_reason_failures: Option<u32>,

    /// How long to poll for an overlay after the cart-mutating click
    pub modal_poll_timeout_ms: u64,

    pub modal_poll_interval_ms: u64,

    /// Wait after a dismissal click before re-checking the overlay
    pub dismiss_settle_ms: u64,

    /// Wait after selecting an address before re-reading it
    pub address_propagation_wait_ms: u64,

    pub address_surface_timeout_ms: u64,

    /// Deadline for one primitive call
    pub action_timeout_ms: u64,

    pub enable_recovery_strategy: bool,

    /// Identifier fragments shorter than this never count as a match
    pub min_match_fragment_length: usize,

    pub max_address_options: usize,

    pub max_cart_rows: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_attempts_per_item: 3,
            attempt_backoff_ms: 2_000,
            backoff_mode: BackoffMode::Fixed,
            max_backoff_ms: 30_000,
            max_same_reason_failures: None,
            modal_poll_timeout_ms: 3_000,
            modal_poll_interval_ms: 250,
            dismiss_settle_ms: 750,
            address_propagation_wait_ms: 2_000,
            address_surface_timeout_ms: 5_000,
            action_timeout_ms: 15_000,
            enable_recovery_strategy: false,
            min_match_fragment_length: 6,
            max_address_options: 10,
            max_cart_rows: 50,
        }
    }
}

impl OrchestratorConfig {
    pub fn validate(&self) -> Result<(), FlowError> {
        let fail = |msg: &str| Err(FlowError::InvalidConfig(msg.to_string()));
        if self.max_attempts_per_item == 0 {
            return fail("max_attempts_per_item must be at least 1");
        }
        if self.max_same_reason_failures == Some(0) {
            return fail("max_same_reason_failures must be at least 1");
        }
        if self.modal_poll_interval_ms == 0 {
            return fail("modal_poll_interval_ms must be positive");
        }
        if self.action_timeout_ms == 0 {
            return fail("action_timeout_ms must be positive");
        }
        if self.max_backoff_ms < self.attempt_backoff_ms {
            return fail("max_backoff_ms must not be below attempt_backoff_ms");
        }
        if self.min_match_fragment_length == 0 {
            return fail("min_match_fragment_length must be at least 1");
        }
        if self.max_address_options == 0 || self.max_cart_rows == 0 {
            return fail("max_address_options and max_cart_rows must be positive");
        }
        Ok(())
    }

    /// Consecutive same-reason cap, never above the attempt budget
    pub fn same_reason_cap(&self) -> u32 {
        self.max_same_reason_failures
            .unwrap_or(self.max_attempts_per_item)
            .min(self.max_attempts_per_item)
    }

    pub fn modal_poll_timeout(&self) -> Duration {
        Duration::from_millis(self.modal_poll_timeout_ms)
    }

    pub fn gate_settings(&self) -> GateSettings {
        GateSettings {
            action_timeout: Duration::from_millis(self.action_timeout_ms),
            address_surface_timeout: Duration::from_millis(self.address_surface_timeout_ms),
            address_propagation_wait: Duration::from_millis(self.address_propagation_wait_ms),
            poll_interval: Duration::from_millis(self.modal_poll_interval_ms),
            dismiss_settle: Duration::from_millis(self.dismiss_settle_ms),
            max_address_options: self.max_address_options,
            max_cart_rows: self.max_cart_rows,
            min_match_fragment_length: self.min_match_fragment_length,
        }
    }
}

/// Why an attempt failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureReason {
    CorrectionFailed,
    NavigationFailed,
    ElementNotFound,
    ModalStuck,
    /// Delta unchanged or ambiguous despite an accepted click
    SilentFailure,
    /// Item added but the displayed address no longer matches
    AddressDrift,
    SessionExpired,
    /// Automation transport failed mid-attempt
    ExecutorError,
    /// The cart grew by fewer units than requested
    QuantityShortfall,
}

impl FailureReason {
    pub fn code(&self) -> &'static str {
        match self {
            FailureReason::CorrectionFailed => "correction-failed",
            FailureReason::NavigationFailed => "navigation-failed",
            FailureReason::ElementNotFound => "element-not-found",
            FailureReason::ModalStuck => "modal-stuck",
            FailureReason::SilentFailure => "silent-failure",
            FailureReason::AddressDrift => "address-drift",
            FailureReason::SessionExpired => "session-expired",
            FailureReason::ExecutorError => "executor-error",
            FailureReason::QuantityShortfall => "quantity-shortfall",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Terminal verdict for one request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Verdict {
    Succeeded,
    /// The platform merged the add into a line the cart already had
    AlreadyPresent,
    FailedAfterRetries,
    NeedsManualReview,
    SessionInvalid,
    SessionExpired,
    Cancelled,
}

impl Verdict {
    pub fn code(&self) -> &'static str {
        match self {
            Verdict::Succeeded => "succeeded",
            Verdict::AlreadyPresent => "already-present",
            Verdict::FailedAfterRetries => "failed-after-retries",
            Verdict::NeedsManualReview => "needs-manual-review",
            Verdict::SessionInvalid => "session-invalid",
            Verdict::SessionExpired => "session-expired",
            Verdict::Cancelled => "cancelled",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Verdict::Succeeded | Verdict::AlreadyPresent)
    }

    /// Verdicts that stop the rest of the session's batch
    pub fn halts_batch(&self) -> bool {
        matches!(self, Verdict::SessionInvalid | Verdict::SessionExpired)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Sub-steps an attempt executed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptSteps {
    pub address_verified: bool,
    pub address_corrected: bool,
    pub navigated: bool,
    pub acted: bool,
    pub modal_encountered: bool,
    pub modal_dismissed: bool,
    pub delta_confirmed: bool,
}

/// One try at the cart-mutating action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// 1-based attempt number
    pub attempt: u32,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub steps: AttemptSteps,
    pub succeeded: bool,
    pub failure_reason: Option<FailureReason>,
    pub detail: Option<String>,
    pub delta: Option<CartDelta>,
    pub interference: Option<InterferenceKind>,
}

impl AttemptRecord {
    pub fn new(attempt: u32) -> Self {
        Self {
            attempt,
            started_at: Utc::now(),
            duration_ms: 0,
            steps: AttemptSteps::default(),
            succeeded: false,
            failure_reason: None,
            detail: None,
            delta: None,
            interference: None,
        }
    }

    pub(crate) fn succeed(mut self, duration: Duration) -> Self {
        self.succeeded = true;
        self.duration_ms = duration.as_millis() as u64;
        self
    }

    pub(crate) fn fail(mut self, reason: FailureReason, detail: String, duration: Duration) -> Self {
        self.succeeded = false;
        self.failure_reason = Some(reason);
        self.detail = Some(detail);
        self.duration_ms = duration.as_millis() as u64;
        self
    }
}

/// Boolean-shaped answer of a recovery strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecoveryVerdict {
    Success,
    StillFailed,
}

/// What happened when the recovery port was invoked
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryRecord {
    pub strategy: String,
    pub verdict: RecoveryVerdict,
    /// Delta and address re-checks confirmed the strategy's claim
    pub reverified: bool,
    pub detail: Option<String>,
}

/// Sealed result for one request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationOutcome {
    request: CartItemRequest,
    verdict: Verdict,
    attempts: Vec<AttemptRecord>,
    recovery: Option<RecoveryRecord>,
    final_address: Option<AddressSnapshot>,
    detail: Option<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    started_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    finished_at: DateTime<Utc>,
}

impl OperationOutcome {
    pub fn request(&self) -> &CartItemRequest {
        &self.request
    }

    pub fn verdict(&self) -> Verdict {
        self.verdict
    }

    pub fn attempts(&self) -> &[AttemptRecord] {
        &self.attempts
    }

    pub fn recovery(&self) -> Option<&RecoveryRecord> {
        self.recovery.as_ref()
    }

    pub fn final_address(&self) -> Option<&AddressSnapshot> {
        self.final_address.as_ref()
    }

    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> DateTime<Utc> {
        self.finished_at
    }

    /// Wall time from the first attempt to the sealed verdict
    pub fn elapsed_ms(&self) -> u64 {
        (self.finished_at - self.started_at).num_milliseconds().max(0) as u64
    }

    pub fn is_success(&self) -> bool {
        self.verdict.is_success()
    }

    /// Whether any attempt hit an overlay
    pub fn modal_encountered(&self) -> bool {
        self.attempts.iter().any(|a| a.steps.modal_encountered)
    }
}

/// Accumulates attempts for one request until sealed
#[derive(Debug)]
pub(crate) struct OutcomeBuilder {
    request: CartItemRequest,
    attempts: Vec<AttemptRecord>,
    recovery: Option<RecoveryRecord>,
    final_address: Option<AddressSnapshot>,
    started_at: DateTime<Utc>,
}

impl OutcomeBuilder {
    pub(crate) fn new(request: CartItemRequest) -> Self {
        Self {
            request,
            attempts: Vec::new(),
            recovery: None,
            final_address: None,
            started_at: Utc::now(),
        }
    }

    pub(crate) fn attempts(&self) -> &[AttemptRecord] {
        &self.attempts
    }

    pub(crate) fn next_attempt(&self) -> u32 {
        self.attempts.len() as u32 + 1
    }

    pub(crate) fn push(&mut self, record: AttemptRecord) {
        self.attempts.push(record);
    }

    pub(crate) fn with_recovery(mut self, record: RecoveryRecord) -> Self {
        self.recovery = Some(record);
        self
    }

    pub(crate) fn with_final_address(mut self, snapshot: AddressSnapshot) -> Self {
        self.final_address = Some(snapshot);
        self
    }

    pub(crate) fn seal(self, verdict: Verdict, detail: Option<String>) -> OperationOutcome {
        OperationOutcome {
            request: self.request,
            verdict,
            attempts: self.attempts,
            recovery: self.recovery,
            final_address: self.final_address,
            detail,
            started_at: self.started_at,
            finished_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cartpilot_core_types::{ExpectedAddress, PostalCode};

    #[test]
    fn default_config_is_valid() {
        let config = OrchestratorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.same_reason_cap(), config.max_attempts_per_item);
    }

    #[test]
    fn zero_attempts_is_rejected() {
        let config = OrchestratorConfig {
            max_attempts_per_item: 0,
            ..OrchestratorConfig::default()
        };
        assert!(matches!(config.validate(), Err(FlowError::InvalidConfig(_))));
    }

    #[test]
    fn same_reason_cap_follows_attempt_budget() {
        let config = OrchestratorConfig {
            max_attempts_per_item: 5,
            ..OrchestratorConfig::default()
        };
        assert_eq!(config.same_reason_cap(), 5);

        let config = OrchestratorConfig {
            max_attempts_per_item: 1,
            max_same_reason_failures: Some(4),
            ..OrchestratorConfig::default()
        };
        assert_eq!(config.same_reason_cap(), 1);

        let config = OrchestratorConfig {
            max_same_reason_failures: Some(0),
            ..OrchestratorConfig::default()
        };
        assert!(matches!(config.validate(), Err(FlowError::InvalidConfig(_))));
    }

    #[test]
    fn config_deserializes_partial_yaml_shape() {
        let config: OrchestratorConfig = serde_json::from_str(
            r#"{"max_attempts_per_item": 5, "backoff_mode": "exponential"}"#,
        )
        .unwrap();
        assert_eq!(config.max_attempts_per_item, 5);
        assert_eq!(config.backoff_mode, BackoffMode::Exponential);
        assert_eq!(config.modal_poll_timeout_ms, 3_000);
    }

    #[test]
    fn verdict_codes() {
        assert_eq!(Verdict::NeedsManualReview.to_string(), "needs-manual-review");
        assert!(Verdict::AlreadyPresent.is_success());
        assert!(Verdict::SessionExpired.halts_batch());
        assert!(!Verdict::FailedAfterRetries.halts_batch());
        assert_eq!(
            serde_json::to_string(&FailureReason::SilentFailure).unwrap(),
            "\"silent-failure\""
        );
    }

    #[test]
    fn sealed_outcome_keeps_history() {
        let request = CartItemRequest::new(
            "B0KETTLE01",
            ExpectedAddress::new(PostalCode::normalize("560043").unwrap(), ""),
        );
        let mut builder = OutcomeBuilder::new(request);
        builder.push(AttemptRecord::new(1).fail(
            FailureReason::ModalStuck,
            "overlay still present".into(),
            Duration::from_millis(10),
        ));
        let outcome = builder.seal(Verdict::NeedsManualReview, None);
        assert_eq!(outcome.attempts().len(), 1);
        assert_eq!(outcome.attempts()[0].failure_reason, Some(FailureReason::ModalStuck));
        assert!(!outcome.is_success());
    }
}
