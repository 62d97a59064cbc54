//! Address verifier - read and correct the session-selected delivery address

use action_locator::SemanticTarget;
use action_primitives::poll_until;
use async_trait::async_trait;
use cartpilot_core_types::ExpectedAddress;
use tracing::{debug, info, warn};

use crate::{
    context::GateContext,
    errors::GateError,
    matching::{best_option, extract_postal_code},
    types::{AddressCheck, AddressSnapshot},
};

/// Address verifier trait
#[async_trait]
pub trait AddressVerifier: Send + Sync {
    /// Read the displayed delivery address.
    ///
    /// `AddressUnreadable` when no address label resolves.
    async fn read_current_address(&self) -> Result<AddressSnapshot, GateError>;

    /// Make the session show `expected`, correcting it when needed.
    ///
    /// A failed correction is reported, never retried here.
    async fn ensure_address(&self, expected: &ExpectedAddress) -> Result<AddressCheck, GateError>;
}

/// Default address verifier driving the platform's change-address flow
pub struct DefaultAddressVerifier {
    ctx: GateContext,
}

impl DefaultAddressVerifier {
    pub fn new(ctx: GateContext) -> Self {
        Self { ctx }
    }

    async fn wait_for_surface(&self) -> bool {
        let candidates = self.ctx.candidates(SemanticTarget::AddressSelectionSurface);
        if candidates.is_empty() {
            return false;
        }
        let resolver = &self.ctx.resolver;
        let candidates = &candidates;
        poll_until(
            self.ctx.settings.address_surface_timeout,
            self.ctx.settings.poll_interval,
            move || async move {
                match resolver.first_present(candidates).await {
                    Ok(found) => found,
                    Err(err) => {
                        debug!(error = %err, "Selection surface lookup failed");
                        None
                    }
                }
            },
        )
        .await
        .is_some()
    }

    /// Read option texts 1..=max until the first absent one
    async fn read_options(&self) -> Result<Vec<(usize, String)>, GateError> {
        let mut options = Vec::new();
        for index in 1..=self.ctx.settings.max_address_options {
            let candidates = self.ctx.nth_candidates(SemanticTarget::AddressOption, index);
            match self.ctx.resolver.first_readable(&candidates).await? {
                Some(found) => options.push((index, found.text)),
                None => break,
            }
        }
        Ok(options)
    }

    /// Select the best option, or type the postal code when none qualifies.
    ///
    /// Returns `Err(reason)` when neither path is available.
    async fn select_address(&self, expected: &ExpectedAddress) -> Result<Result<(), String>, GateError> {
        let options = self.read_options().await?;
        let chosen = best_option(
            self.ctx.postal_pattern(),
            options.iter().map(|(_, text)| text.as_str()),
            expected,
        );

        if let Some(position) = chosen {
            let (index, text) = &options[position];
            info!(option = *index, text = %text, "Selecting address option");
            let candidates = self.ctx.nth_candidates(SemanticTarget::AddressOption, *index);
            return Ok(match self.ctx.resolver.click_first(&candidates).await? {
                Some(_) => Ok(()),
                None => Err(format!("address option {} vanished before click", index)),
            });
        }

        if !self.ctx.table.declares(SemanticTarget::PostalCodeInput) {
            return Ok(Err(format!(
                "none of {} address options matches {}",
                options.len(),
                expected.postal_code
            )));
        }

        info!(postal_code = %expected.postal_code, "No saved address matches, entering postal code");
        let input = self.ctx.candidates(SemanticTarget::PostalCodeInput);
        if self
            .ctx
            .resolver
            .type_first(&input, expected.postal_code.as_str())
            .await?
            .is_none()
        {
            return Ok(Err("postal code input not found".to_string()));
        }
        let apply = self.ctx.candidates(SemanticTarget::PostalCodeApply);
        Ok(match self.ctx.resolver.click_first(&apply).await? {
            Some(_) => Ok(()),
            None => Err("postal code apply control not found".to_string()),
        })
    }

    fn failed(reason: impl Into<String>, observed: Option<AddressSnapshot>) -> AddressCheck {
        let reason = reason.into();
        warn!(reason = %reason, "Address correction failed");
        AddressCheck::CorrectionFailed { reason, observed }
    }
}

#[async_trait]
impl AddressVerifier for DefaultAddressVerifier {
    async fn read_current_address(&self) -> Result<AddressSnapshot, GateError> {
        let candidates = self.ctx.candidates(SemanticTarget::AddressLabel);
        let found = self.ctx.resolver.first_readable(&candidates).await?;
        match found {
            Some(found) => {
                let postal_code = extract_postal_code(self.ctx.postal_pattern(), &found.text);
                debug!(text = %found.text, postal_code = ?postal_code, "Read delivery address");
                Ok(AddressSnapshot::new(found.text, postal_code))
            }
            None => Err(GateError::AddressUnreadable(format!(
                "no address label among {} candidates",
                candidates.len()
            ))),
        }
    }

    async fn ensure_address(&self, expected: &ExpectedAddress) -> Result<AddressCheck, GateError> {
        let before = match self.read_current_address().await {
            Ok(snapshot) if snapshot.matches(expected) => {
                debug!(postal_code = %expected.postal_code, "Address verified");
                return Ok(AddressCheck::Verified(snapshot));
            }
            Ok(snapshot) => Some(snapshot),
            Err(GateError::AddressUnreadable(reason)) => {
                debug!(reason = %reason, "Address unknown, correcting");
                None
            }
            Err(err) => return Err(err),
        };

        info!(
            expected = %expected.postal_code,
            observed = ?before.as_ref().and_then(|s| s.postal_code.as_ref()),
            "Delivery address mismatch, starting correction"
        );

        let entry = self.ctx.candidates(SemanticTarget::AddressChangeEntry);
        if self.ctx.resolver.click_first(&entry).await?.is_none() {
            return Ok(Self::failed("address change entry not found", before));
        }

        if !self.wait_for_surface().await {
            return Ok(Self::failed("address selection surface did not appear", before));
        }

        if let Err(reason) = self.select_address(expected).await? {
            return Ok(Self::failed(reason, before));
        }

        self.ctx
            .resolver
            .pause(self.ctx.settings.address_propagation_wait)
            .await?;

        match self.read_current_address().await {
            Ok(after) if after.matches(expected) => {
                info!(postal_code = %expected.postal_code, "Delivery address corrected");
                Ok(AddressCheck::Corrected { before, after })
            }
            Ok(after) => {
                let shown = after
                    .postal_code
                    .as_ref()
                    .map(|code| code.to_string())
                    .unwrap_or_else(|| after.raw_text.clone());
                Ok(Self::failed(
                    format!("address still shows {} after correction", shown),
                    Some(after),
                ))
            }
            Err(GateError::AddressUnreadable(_)) => {
                Ok(Self::failed("address unreadable after correction", before))
            }
            Err(err) => Err(err),
        }
    }
}
