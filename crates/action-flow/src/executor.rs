//! Operation orchestrator - the per-item state machine
//!
//! `AddressCheck -> Navigate -> Act -> ModalCheck -> (ModalDismiss) -> DeltaVerify`
//! followed by a final address read. A click is never taken as proof: success
//! needs a positive cart delta after any overlay is cleared, under the
//! expected address.

use action_gate::{
    AddressCheck, AddressSnapshot, AddressVerifier, CartDelta, CartSnapshot, CartVerifier,
    DefaultAddressVerifier, DefaultCartVerifier, DefaultModalDetector, DismissOutcome,
    GateContext, GateError, InterferenceDetector,
};
use action_locator::{CandidateResolver, InterferenceKind, Locator, PlatformTable, SemanticTarget};
use action_primitives::{ActionError, ActionPrimitives};
use cartpilot_core_types::{CartItemRequest, Platform, SessionId};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    errors::FlowError,
    metrics,
    recovery::{RecoveryContext, RecoveryStrategy},
    strategies::{DefaultRetryPolicy, RetryDecision, RetryPolicy},
    types::*,
};

/// States of one attempt
#[derive(Debug, Clone, PartialEq, Eq)]
enum FlowState {
    AddressCheck,
    Navigate,
    Act,
    ModalCheck,
    ModalDismiss(InterferenceKind),
    DeltaVerify,
    /// Delta is positive; confirm the address before sealing
    FinalAddress(Verdict),
}

/// How an attempt ended
#[derive(Debug)]
enum AttemptEnd {
    Success {
        verdict: Verdict,
        address: AddressSnapshot,
    },
    Failed {
        reason: FailureReason,
        detail: String,
        /// Another attempt could only repeat or compound the failure
        retryable: bool,
    },
    /// Session-level failure; stop the item and the rest of the batch
    Halt {
        verdict: Verdict,
        reason: FailureReason,
        detail: String,
    },
}

impl AttemptEnd {
    fn failed(reason: FailureReason, detail: impl Into<String>) -> Self {
        AttemptEnd::Failed {
            reason,
            detail: detail.into(),
            retryable: true,
        }
    }

    fn fatal(reason: FailureReason, detail: impl Into<String>) -> Self {
        AttemptEnd::Failed {
            reason,
            detail: detail.into(),
            retryable: false,
        }
    }

    fn executor(err: &ActionError) -> Self {
        AttemptEnd::Failed {
            reason: FailureReason::ExecutorError,
            detail: err.to_string(),
            retryable: err.is_retryable(),
        }
    }

    fn gate(err: &GateError) -> Self {
        AttemptEnd::Failed {
            reason: FailureReason::ExecutorError,
            detail: err.to_string(),
            retryable: err.is_retryable(),
        }
    }

    fn expired(detail: impl Into<String>) -> Self {
        AttemptEnd::Halt {
            verdict: Verdict::SessionExpired,
            reason: FailureReason::SessionExpired,
            detail: detail.into(),
        }
    }
}

/// Batch-scoped session state
#[derive(Debug, Default)]
pub struct BatchState {
    /// Address corrections that failed in this batch
    pub address_failures: u32,
}

/// Per-item working state across attempts
#[derive(Default)]
struct ItemState {
    /// Pre-action cart snapshot, taken once per item
    baseline: Option<CartSnapshot>,
    /// Delta was positive but the address drifted; re-verify without acting
    pending_reverify: bool,
    last_address: Option<AddressSnapshot>,
}

/// Drives cart requests for one session
pub struct CartOrchestrator {
    session_id: SessionId,
    platform: Platform,
    table: Arc<PlatformTable>,
    config: OrchestratorConfig,
    policy: Arc<dyn RetryPolicy>,
    resolver: CandidateResolver,
    locator: Arc<dyn Locator>,
    address: Arc<dyn AddressVerifier>,
    modal: Arc<dyn InterferenceDetector>,
    cart: Arc<dyn CartVerifier>,
    recovery: Option<Arc<dyn RecoveryStrategy>>,
}

impl CartOrchestrator {
    /// Create an orchestrator with the default gates for `platform`
    pub fn new(
        session_id: SessionId,
        primitives: Arc<dyn ActionPrimitives>,
        locator: Arc<dyn Locator>,
        platform: Platform,
        config: OrchestratorConfig,
    ) -> Result<Self, FlowError> {
        config.validate()?;
        let gate = GateContext::new(
            primitives,
            locator.clone(),
            platform.clone(),
            config.gate_settings(),
        )?;
        Ok(Self {
            session_id,
            platform,
            table: gate.table.clone(),
            policy: Arc::new(DefaultRetryPolicy::new(&config)),
            resolver: gate.resolver.clone(),
            locator,
            address: Arc::new(DefaultAddressVerifier::new(gate.clone())),
            modal: Arc::new(DefaultModalDetector::new(gate.clone())),
            cart: Arc::new(DefaultCartVerifier::new(gate)),
            recovery: None,
            config,
        })
    }

    /// Attach a recovery strategy; used only when the config enables it
    pub fn with_recovery(mut self, strategy: Option<Arc<dyn RecoveryStrategy>>) -> Self {
        self.recovery = strategy;
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Run requests strictly in order, one outcome per request.
    ///
    /// Cancellation is honoured between items only. A session-level halt
    /// seals every remaining item with the same verdict.
    pub async fn run_batch(
        &self,
        requests: &[CartItemRequest],
        cancel: &CancellationToken,
    ) -> Vec<OperationOutcome> {
        let mut batch = BatchState::default();
        let mut halted: Option<(Verdict, String)> = None;
        let mut outcomes = Vec::with_capacity(requests.len());

        info!(
            session = %self.session_id,
            platform = %self.platform,
            items = requests.len(),
            "Starting cart batch"
        );

        for request in requests {
            let outcome = if let Some((verdict, detail)) = &halted {
                OutcomeBuilder::new(request.clone()).seal(*verdict, Some(detail.clone()))
            } else if cancel.is_cancelled() {
                OutcomeBuilder::new(request.clone())
                    .seal(Verdict::Cancelled, Some("batch cancelled".to_string()))
            } else {
                let started = Instant::now();
                let outcome = self.run_item(request, &mut batch).await;
                metrics::record_item_duration(
                    self.platform.as_str(),
                    outcome.verdict(),
                    started.elapsed(),
                );
                if outcome.verdict().halts_batch() {
                    warn!(
                        session = %self.session_id,
                        verdict = %outcome.verdict(),
                        "Session halted, sealing remaining items"
                    );
                    halted = Some((
                        outcome.verdict(),
                        format!("batch halted after {}", outcome.request().product_id),
                    ));
                }
                outcome
            };
            metrics::record_outcome(self.platform.as_str(), outcome.verdict());
            outcomes.push(outcome);
        }

        info!(
            session = %self.session_id,
            succeeded = outcomes.iter().filter(|o| o.is_success()).count(),
            total = outcomes.len(),
            "Cart batch finished"
        );
        outcomes
    }

    /// Run the state machine for one request until a verdict is sealed
    pub async fn run_item(
        &self,
        request: &CartItemRequest,
        batch: &mut BatchState,
    ) -> OperationOutcome {
        let mut builder = OutcomeBuilder::new(request.clone());
        let mut item = ItemState::default();

        loop {
            let attempt = builder.next_attempt();
            let started = Instant::now();
            let mut record = AttemptRecord::new(attempt);
            metrics::record_attempt(self.platform.as_str());
            info!(
                session = %self.session_id,
                product_id = %request.product_id,
                attempt,
                "Starting attempt"
            );

            let end = self.run_attempt(request, &mut record, &mut item, batch).await;
            let elapsed = started.elapsed();

            match end {
                AttemptEnd::Success { verdict, address } => {
                    metrics::record_attempt_success(self.platform.as_str(), elapsed);
                    builder.push(record.succeed(elapsed));
                    info!(
                        session = %self.session_id,
                        product_id = %request.product_id,
                        attempt,
                        verdict = %verdict,
                        "Item confirmed in cart"
                    );
                    return builder.with_final_address(address).seal(verdict, None);
                }
                AttemptEnd::Halt {
                    verdict,
                    reason,
                    detail,
                } => {
                    metrics::record_attempt_failure(self.platform.as_str(), reason, elapsed);
                    warn!(
                        session = %self.session_id,
                        product_id = %request.product_id,
                        attempt,
                        reason = %reason,
                        detail = %detail,
                        "Session-level failure"
                    );
                    builder.push(record.fail(reason, detail.clone(), elapsed));
                    return builder.seal(verdict, Some(detail));
                }
                AttemptEnd::Failed {
                    reason,
                    detail,
                    retryable,
                } => {
                    metrics::record_attempt_failure(self.platform.as_str(), reason, elapsed);
                    warn!(
                        session = %self.session_id,
                        product_id = %request.product_id,
                        attempt,
                        reason = %reason,
                        detail = %detail,
                        retryable,
                        "Attempt failed"
                    );
                    builder.push(record.fail(reason, detail.clone(), elapsed));
                    if !retryable {
                        let detail = format!("{} is not retryable: {}", reason, detail);
                        return self
                            .exhaust(request, builder, &item, Verdict::NeedsManualReview, detail)
                            .await;
                    }
                }
            }

            match self.policy.decide(builder.attempts()) {
                RetryDecision::Retry { backoff, .. } => {
                    tokio::time::sleep(backoff).await;
                }
                RetryDecision::SameReasonExhausted { reason, count } => {
                    let detail = format!("{} repeated {} times", reason, count);
                    return self
                        .exhaust(request, builder, &item, Verdict::NeedsManualReview, detail)
                        .await;
                }
                RetryDecision::BudgetExhausted { attempts } => {
                    let detail = format!("{} attempts failed", attempts);
                    return self
                        .exhaust(request, builder, &item, Verdict::FailedAfterRetries, detail)
                        .await;
                }
            }
        }
    }

    async fn run_attempt(
        &self,
        request: &CartItemRequest,
        record: &mut AttemptRecord,
        item: &mut ItemState,
        batch: &mut BatchState,
    ) -> AttemptEnd {
        let fragment = request.match_fragment();
        let mut state = FlowState::AddressCheck;

        loop {
            debug!(product_id = %request.product_id, state = ?state, "Entering state");
            state = match state {
                FlowState::AddressCheck => {
                    match self.address_check(request, record, item, batch).await {
                        Ok(()) => {}
                        Err(end) => return end,
                    }
                    if item.baseline.is_none() {
                        match self.cart.snapshot().await {
                            Ok(snapshot) => item.baseline = Some(snapshot),
                            Err(err) => return Self::snapshot_failure(err),
                        }
                    }
                    if std::mem::take(&mut item.pending_reverify) {
                        info!(product_id = %request.product_id, "Re-verifying earlier add");
                        FlowState::DeltaVerify
                    } else {
                        FlowState::Navigate
                    }
                }

                FlowState::Navigate => {
                    let url = self.table.product_url_for(&request.product_id);
                    let report = match self
                        .resolver
                        .primitives()
                        .navigate(&self.resolver.ctx(), &url)
                        .await
                    {
                        Ok(report) => report,
                        Err(err) => {
                            return AttemptEnd::failed(FailureReason::NavigationFailed, err.to_string())
                        }
                    };
                    if let Some(landed) = report.url_after.as_deref() {
                        if self.table.is_sign_in_url(landed) {
                            return AttemptEnd::expired(format!("sign-in redirect to {}", landed));
                        }
                    }
                    record.steps.navigated = true;
                    FlowState::Act
                }

                FlowState::Act => {
                    if let Err(end) = self.act(request).await {
                        return end;
                    }
                    record.steps.acted = true;
                    FlowState::ModalCheck
                }

                FlowState::ModalCheck => {
                    match self
                        .modal
                        .poll_for_interference(self.config.modal_poll_timeout())
                        .await
                    {
                        Some(kind) => {
                            record.steps.modal_encountered = true;
                            record.interference = Some(kind.clone());
                            metrics::record_modal(self.platform.as_str(), kind.name());
                            FlowState::ModalDismiss(kind)
                        }
                        None => FlowState::DeltaVerify,
                    }
                }

                FlowState::ModalDismiss(kind) => match self.modal.dismiss(&kind).await {
                    DismissOutcome::Dismissed { .. } => {
                        record.steps.modal_dismissed = true;
                        FlowState::DeltaVerify
                    }
                    DismissOutcome::DismissFailed { reason, .. } => {
                        return AttemptEnd::failed(FailureReason::ModalStuck, reason)
                    }
                },

                FlowState::DeltaVerify => {
                    let after = match self.cart.snapshot().await {
                        Ok(snapshot) => snapshot,
                        Err(err) => return Self::snapshot_failure(err),
                    };
                    let empty = CartSnapshot::empty();
                    let baseline = item.baseline.as_ref().unwrap_or(&empty);
                    let delta = self.cart.diff(baseline, &after, fragment, request.quantity);
                    record.delta = Some(delta);
                    info!(product_id = %request.product_id, delta = ?delta, "Cart delta");

                    match delta {
                        CartDelta::Added => {
                            record.steps.delta_confirmed = true;
                            FlowState::FinalAddress(Verdict::Succeeded)
                        }
                        CartDelta::Unchanged
                            if self.table.dedups_cart_items && baseline.contains(fragment) =>
                        {
                            record.steps.delta_confirmed = true;
                            FlowState::FinalAddress(Verdict::AlreadyPresent)
                        }
                        CartDelta::Unchanged => {
                            return AttemptEnd::failed(
                                FailureReason::SilentFailure,
                                "cart unchanged after accepted click",
                            )
                        }
                        CartDelta::Ambiguous => {
                            return AttemptEnd::failed(
                                FailureReason::SilentFailure,
                                format!("match fragment '{}' too short to confirm", fragment),
                            )
                        }
                        CartDelta::Removed => {
                            return AttemptEnd::failed(
                                FailureReason::SilentFailure,
                                "item count dropped after click",
                            )
                        }
                        // Part of the request landed; clicking again would overshoot
                        CartDelta::Shortfall { expected, added } => {
                            return AttemptEnd::fatal(
                                FailureReason::QuantityShortfall,
                                format!("requested {} units, cart grew by {}", expected, added),
                            )
                        }
                    }
                }

                FlowState::FinalAddress(verdict) => {
                    return match self.address.read_current_address().await {
                        Ok(address) if address.matches(&request.expected_address) => {
                            item.last_address = Some(address.clone());
                            AttemptEnd::Success { verdict, address }
                        }
                        Ok(address) => {
                            item.pending_reverify = true;
                            let shown = address
                                .postal_code
                                .as_ref()
                                .map(|code| code.to_string())
                                .unwrap_or_else(|| address.raw_text.clone());
                            item.last_address = Some(address);
                            AttemptEnd::failed(
                                FailureReason::AddressDrift,
                                format!("address changed to {} after add", shown),
                            )
                        }
                        Err(err) => {
                            item.pending_reverify = true;
                            AttemptEnd::failed(FailureReason::AddressDrift, err.to_string())
                        }
                    };
                }
            };
        }
    }

    /// `ensure_address` with the batch-level escalation rule
    async fn address_check(
        &self,
        request: &CartItemRequest,
        record: &mut AttemptRecord,
        item: &mut ItemState,
        batch: &mut BatchState,
    ) -> Result<(), AttemptEnd> {
        match self.address.ensure_address(&request.expected_address).await {
            Ok(AddressCheck::Verified(snapshot)) => {
                record.steps.address_verified = true;
                item.last_address = Some(snapshot);
                Ok(())
            }
            Ok(AddressCheck::Corrected { after, .. }) => {
                record.steps.address_verified = true;
                record.steps.address_corrected = true;
                metrics::record_address_corrected(self.platform.as_str());
                item.last_address = Some(after);
                Ok(())
            }
            Ok(AddressCheck::CorrectionFailed { reason, observed }) => {
                if observed.is_some() {
                    item.last_address = observed;
                }
                batch.address_failures += 1;
                if batch.address_failures > 1 {
                    Err(AttemptEnd::Halt {
                        verdict: Verdict::SessionInvalid,
                        reason: FailureReason::CorrectionFailed,
                        detail: format!(
                            "address correction failed {} times in batch: {}",
                            batch.address_failures, reason
                        ),
                    })
                } else {
                    Err(AttemptEnd::failed(FailureReason::CorrectionFailed, reason))
                }
            }
            Err(GateError::SessionExpired { url }) => {
                Err(AttemptEnd::expired(format!("sign-in redirect to {}", url)))
            }
            Err(err) => Err(AttemptEnd::gate(&err)),
        }
    }

    /// Set the quantity when needed, then click add-to-cart
    async fn act(&self, request: &CartItemRequest) -> Result<(), AttemptEnd> {
        let executor_error = |err: ActionError| AttemptEnd::executor(&err);

        if request.quantity > 1 {
            let input = self.candidates(SemanticTarget::QuantityInput);
            let typed = self
                .resolver
                .type_first(&input, &request.quantity.to_string())
                .await
                .map_err(executor_error)?;
            if typed.is_none() {
                return Err(AttemptEnd::failed(
                    FailureReason::ElementNotFound,
                    format!("no {} for quantity {}", SemanticTarget::QuantityInput, request.quantity),
                ));
            }
        }

        let buttons = self.candidates(SemanticTarget::AddToCartButton);
        match self.resolver.click_first(&buttons).await {
            Ok(Some(_)) => Ok(()),
            Ok(None) => Err(AttemptEnd::failed(
                FailureReason::ElementNotFound,
                format!(
                    "no {} among {} candidates",
                    SemanticTarget::AddToCartButton,
                    buttons.len()
                ),
            )),
            Err(err) => Err(executor_error(err)),
        }
    }

    fn candidates(&self, target: SemanticTarget) -> Vec<action_locator::Candidate> {
        self.locator.locate(target, &self.platform)
    }

    fn snapshot_failure(err: GateError) -> AttemptEnd {
        match err {
            GateError::SessionExpired { url } => {
                AttemptEnd::expired(format!("sign-in redirect to {}", url))
            }
            GateError::Navigation(detail) => {
                AttemptEnd::failed(FailureReason::NavigationFailed, detail)
            }
            other => AttemptEnd::gate(&other),
        }
    }

    /// Deterministic retries are over: delegate once to recovery or seal
    async fn exhaust(
        &self,
        request: &CartItemRequest,
        builder: OutcomeBuilder,
        item: &ItemState,
        fallback: Verdict,
        detail: String,
    ) -> OperationOutcome {
        let strategy = match (&self.recovery, self.config.enable_recovery_strategy) {
            (Some(strategy), true) => strategy.clone(),
            _ => return builder.seal(fallback, Some(detail)),
        };

        let context = RecoveryContext {
            session_id: self.session_id.clone(),
            platform: self.platform.clone(),
            request: request.clone(),
            product_url: self.table.product_url_for(&request.product_id),
            cart_url: self.table.cart_url.clone(),
            last_address: item.last_address.clone(),
        };
        info!(
            session = %self.session_id,
            product_id = %request.product_id,
            strategy = strategy.name(),
            "Delegating to recovery strategy"
        );
        let verdict = strategy.attempt_recovery(&context, builder.attempts()).await;

        let mut record = RecoveryRecord {
            strategy: strategy.name().to_string(),
            verdict,
            reverified: false,
            detail: None,
        };
        if verdict == RecoveryVerdict::StillFailed {
            record.detail = Some("recovery strategy reported failure".to_string());
            return builder
                .with_recovery(record)
                .seal(Verdict::NeedsManualReview, Some(detail));
        }

        match self.reverify(request, item).await {
            Ok(address) => {
                record.reverified = true;
                info!(product_id = %request.product_id, "Recovery confirmed by cart delta");
                builder
                    .with_recovery(record)
                    .with_final_address(address)
                    .seal(Verdict::Succeeded, None)
            }
            Err(reason) => {
                warn!(product_id = %request.product_id, reason = %reason, "Recovery claim not confirmed");
                record.detail = Some(reason);
                builder
                    .with_recovery(record)
                    .seal(Verdict::NeedsManualReview, Some(detail))
            }
        }
    }

    /// Confirm a recovery claim with a fresh delta and address read
    async fn reverify(
        &self,
        request: &CartItemRequest,
        item: &ItemState,
    ) -> Result<AddressSnapshot, String> {
        let baseline = item
            .baseline
            .as_ref()
            .ok_or_else(|| "no pre-action cart snapshot to compare against".to_string())?;
        let after = self.cart.snapshot().await.map_err(|err| err.to_string())?;
        let delta = self
            .cart
            .diff(baseline, &after, request.match_fragment(), request.quantity);
        if delta != CartDelta::Added {
            return Err(format!("cart delta after recovery was {:?}", delta));
        }
        let address = self
            .address
            .read_current_address()
            .await
            .map_err(|err| err.to_string())?;
        if !address.matches(&request.expected_address) {
            return Err(format!(
                "address after recovery shows {}",
                address.raw_text
            ));
        }
        Ok(address)
    }
}
