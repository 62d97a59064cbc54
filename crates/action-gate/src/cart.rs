//! Cart delta verifier - snapshot the cart view and diff before/after

use action_locator::SemanticTarget;
use action_primitives::ActionError;
use async_trait::async_trait;
use std::collections::HashSet;
use tracing::{debug, info};

use crate::{
    context::GateContext,
    errors::GateError,
    matching::parse_count,
    types::{CartDelta, CartEntry, CartSnapshot},
};

/// Cart verifier trait
#[async_trait]
pub trait CartVerifier: Send + Sync {
    /// Navigate to the cart view and read its lines
    async fn snapshot(&self) -> Result<CartSnapshot, GateError>;

    /// Compare two snapshots for the item identified by `fragment`, expecting
    /// `quantity` more units than `before` held
    fn diff(
        &self,
        before: &CartSnapshot,
        after: &CartSnapshot,
        fragment: &str,
        quantity: u32,
    ) -> CartDelta;
}

/// Compute the delta for `fragment` between two snapshots.
///
/// Fragments shorter than `min_fragment_len` characters are `Ambiguous`.
/// Growth of fewer units than `quantity` is `Shortfall`.
pub fn diff_snapshots(
    before: &CartSnapshot,
    after: &CartSnapshot,
    fragment: &str,
    quantity: u32,
    min_fragment_len: usize,
) -> CartDelta {
    let fragment = fragment.trim();
    if fragment.chars().count() < min_fragment_len {
        return CartDelta::Ambiguous;
    }

    let before_count = before.matching(fragment).count();
    let after_count = after.matching(fragment).count();
    let before_qty = before.quantity_of(fragment);
    let after_qty = after.quantity_of(fragment);

    let known: HashSet<String> = before
        .matching(fragment)
        .map(|entry| entry.fragment.to_lowercase())
        .collect();
    let new_fragments = after
        .matching(fragment)
        .filter(|entry| !known.contains(&entry.fragment.to_lowercase()))
        .count();

    if after_count > before_count || after_qty > before_qty || new_fragments > 0 {
        let expected = quantity.max(1);
        let grown = after_qty.saturating_sub(before_qty);
        // A replaced line with no unit growth still counts for a single unit
        if grown >= expected || (grown == 0 && expected == 1) {
            CartDelta::Added
        } else {
            CartDelta::Shortfall {
                expected,
                added: grown,
            }
        }
    } else if after_count < before_count || after_qty < before_qty {
        CartDelta::Removed
    } else {
        CartDelta::Unchanged
    }
}

/// Default cart verifier reading the platform's cart page
pub struct DefaultCartVerifier {
    ctx: GateContext,
}

impl DefaultCartVerifier {
    pub fn new(ctx: GateContext) -> Self {
        Self { ctx }
    }

    async fn read_entry(&self, index: usize) -> Result<Option<CartEntry>, ActionError> {
        let resolver = &self.ctx.resolver;
        let row = resolver
            .first_readable(&self.ctx.nth_candidates(SemanticTarget::CartItemRow, index))
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };

        let fragment = resolver
            .first_readable(&self.ctx.nth_candidates(SemanticTarget::CartItemIdentifier, index))
            .await?
            .map(|found| found.text)
            .unwrap_or_else(|| row.text.clone());
        let quantity = resolver
            .first_readable(&self.ctx.nth_candidates(SemanticTarget::CartItemQuantity, index))
            .await?
            .and_then(|found| parse_count(&found.text))
            .unwrap_or(1);

        Ok(Some(CartEntry {
            fragment,
            display_text: row.text,
            quantity,
        }))
    }
}

#[async_trait]
impl CartVerifier for DefaultCartVerifier {
    async fn snapshot(&self) -> Result<CartSnapshot, GateError> {
        let table = &self.ctx.table;
        let resolver = &self.ctx.resolver;

        let report = resolver
            .primitives()
            .navigate(&resolver.ctx(), &table.cart_url)
            .await
            .map_err(|err| match err {
                ActionError::Interrupted(_) => GateError::Action(err),
                other => GateError::Navigation(other.to_string()),
            })?;
        if let Some(landed) = report.url_after.as_deref() {
            if table.is_sign_in_url(landed) {
                return Err(GateError::SessionExpired {
                    url: landed.to_string(),
                });
            }
        }

        let mut entries = Vec::new();
        for index in 1..=self.ctx.settings.max_cart_rows {
            match self.read_entry(index).await? {
                Some(entry) => entries.push(entry),
                None => break,
            }
        }

        let badge_count = resolver
            .first_readable(&self.ctx.candidates(SemanticTarget::CartCount))
            .await?
            .and_then(|found| parse_count(&found.text));

        info!(
            platform = %self.ctx.platform,
            lines = entries.len(),
            badge = ?badge_count,
            "Captured cart snapshot"
        );
        for entry in &entries {
            debug!(fragment = %entry.fragment, quantity = entry.quantity, "Cart line");
        }
        Ok(CartSnapshot::new(entries, badge_count))
    }

    fn diff(
        &self,
        before: &CartSnapshot,
        after: &CartSnapshot,
        fragment: &str,
        quantity: u32,
    ) -> CartDelta {
        diff_snapshots(
            before,
            after,
            fragment,
            quantity,
            self.ctx.settings.min_match_fragment_length,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(fragment: &str, quantity: u32) -> CartEntry {
        CartEntry {
            fragment: fragment.to_string(),
            display_text: fragment.to_string(),
            quantity,
        }
    }

    fn snapshot(entries: Vec<CartEntry>) -> CartSnapshot {
        CartSnapshot::new(entries, None)
    }

    #[test]
    fn new_line_is_added() {
        let before = snapshot(vec![entry("Tea Kettle", 1)]);
        let after = snapshot(vec![entry("Tea Kettle", 1), entry("Steel Bottle 1L", 1)]);
        assert_eq!(diff_snapshots(&before, &after, "Steel Bottle", 1, 6), CartDelta::Added);
    }

    #[test]
    fn quantity_growth_is_added() {
        let before = snapshot(vec![entry("Steel Bottle 1L", 1)]);
        let after = snapshot(vec![entry("Steel Bottle 1L", 2)]);
        assert_eq!(diff_snapshots(&before, &after, "steel bottle", 1, 6), CartDelta::Added);
    }

    #[test]
    fn growth_below_requested_quantity_is_shortfall() {
        let before = snapshot(vec![entry("Steel Bottle 1L", 1)]);
        let after = snapshot(vec![entry("Steel Bottle 1L", 2)]);
        assert_eq!(
            diff_snapshots(&before, &after, "Steel Bottle", 3, 6),
            CartDelta::Shortfall {
                expected: 3,
                added: 1
            }
        );

        let after = snapshot(vec![entry("Steel Bottle 1L", 4)]);
        assert_eq!(diff_snapshots(&before, &after, "Steel Bottle", 3, 6), CartDelta::Added);

        let fresh = snapshot(vec![entry("Steel Bottle 1L", 1)]);
        assert_eq!(
            diff_snapshots(&snapshot(vec![]), &fresh, "Steel Bottle", 2, 6),
            CartDelta::Shortfall {
                expected: 2,
                added: 1
            }
        );
    }

    #[test]
    fn identical_carts_are_unchanged() {
        let before = snapshot(vec![entry("Steel Bottle 1L", 1)]);
        assert_eq!(
            diff_snapshots(&before, &before.clone(), "Steel Bottle", 1, 6),
            CartDelta::Unchanged
        );
    }

    #[test]
    fn missing_line_is_removed() {
        let before = snapshot(vec![entry("Steel Bottle 1L", 1)]);
        let after = snapshot(vec![]);
        assert_eq!(diff_snapshots(&before, &after, "Steel Bottle", 1, 6), CartDelta::Removed);
    }

    #[test]
    fn short_fragment_is_ambiguous() {
        let before = snapshot(vec![]);
        let after = snapshot(vec![entry("Pen", 1)]);
        assert_eq!(diff_snapshots(&before, &after, "Pen", 1, 6), CartDelta::Ambiguous);
        assert_eq!(diff_snapshots(&before, &after, "  Pen  ", 1, 4), CartDelta::Ambiguous);
    }
}
