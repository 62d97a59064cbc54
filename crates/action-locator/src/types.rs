//! Core types for locator tables

use action_primitives::{AnchorDescriptor, INDEX_PLACEHOLDER};
use cartpilot_core_types::{Platform, ProductId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::errors::LocatorError;

/// Placeholder substituted with the product id in `product_url`
pub const PRODUCT_PLACEHOLDER: &str = "{product_id}";

/// Locator strategy a candidate handle uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocatorStrategy {
    /// CSS selector strategy
    Css,

    /// ARIA/AX attributes strategy
    AriaAx,

    /// Text content strategy
    Text,
}

impl LocatorStrategy {
    /// Get strategy name as string
    pub fn name(&self) -> &'static str {
        match self {
            LocatorStrategy::Css => "css",
            LocatorStrategy::AriaAx => "aria-ax",
            LocatorStrategy::Text => "text",
        }
    }

    pub fn of(anchor: &AnchorDescriptor) -> Self {
        match anchor {
            AnchorDescriptor::Css(_) => LocatorStrategy::Css,
            AnchorDescriptor::Aria { .. } => LocatorStrategy::AriaAx,
            AnchorDescriptor::Text { .. } => LocatorStrategy::Text,
        }
    }
}

/// Semantic element the engine asks a platform table for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SemanticTarget {
    AddToCartButton,
    QuantityInput,
    CartCount,
    CartItemRow,
    CartItemIdentifier,
    CartItemQuantity,
    AddressLabel,
    AddressChangeEntry,
    AddressSelectionSurface,
    AddressOption,
    PostalCodeInput,
    PostalCodeApply,
}

impl SemanticTarget {
    pub const ALL: [SemanticTarget; 12] = [
        SemanticTarget::AddToCartButton,
        SemanticTarget::QuantityInput,
        SemanticTarget::CartCount,
        SemanticTarget::CartItemRow,
        SemanticTarget::CartItemIdentifier,
        SemanticTarget::CartItemQuantity,
        SemanticTarget::AddressLabel,
        SemanticTarget::AddressChangeEntry,
        SemanticTarget::AddressSelectionSurface,
        SemanticTarget::AddressOption,
        SemanticTarget::PostalCodeInput,
        SemanticTarget::PostalCodeApply,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SemanticTarget::AddToCartButton => "add-to-cart-button",
            SemanticTarget::QuantityInput => "quantity-input",
            SemanticTarget::CartCount => "cart-count",
            SemanticTarget::CartItemRow => "cart-item-row",
            SemanticTarget::CartItemIdentifier => "cart-item-identifier",
            SemanticTarget::CartItemQuantity => "cart-item-quantity",
            SemanticTarget::AddressLabel => "address-label",
            SemanticTarget::AddressChangeEntry => "address-change-entry",
            SemanticTarget::AddressSelectionSurface => "address-selection-surface",
            SemanticTarget::AddressOption => "address-option",
            SemanticTarget::PostalCodeInput => "postal-code-input",
            SemanticTarget::PostalCodeApply => "postal-code-apply",
        }
    }

    /// Indexed targets carry a `{n}` placeholder filled per row or option
    pub fn is_indexed(&self) -> bool {
        matches!(
            self,
            SemanticTarget::CartItemRow
                | SemanticTarget::CartItemIdentifier
                | SemanticTarget::CartItemQuantity
                | SemanticTarget::AddressOption
        )
    }
}

impl fmt::Display for SemanticTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Candidate handle for a semantic target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub target: SemanticTarget,

    /// Handle passed to the action primitives
    pub anchor: AnchorDescriptor,

    /// Position in the table, 0 is most preferred
    pub priority: usize,

    pub strategy: LocatorStrategy,
}

impl Candidate {
    pub fn new(target: SemanticTarget, anchor: AnchorDescriptor, priority: usize) -> Self {
        Self {
            target,
            strategy: LocatorStrategy::of(&anchor),
            anchor,
            priority,
        }
    }

    /// Candidate for the 1-based row or option `index`
    pub fn nth(&self, index: usize) -> Candidate {
        Candidate {
            anchor: self.anchor.with_index(index),
            ..self.clone()
        }
    }
}

/// Interstitial overlay kinds. The set is open; unknown names become `Custom`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum InterferenceKind {
    /// Warranty or protection-plan upsell shown after add-to-cart
    WarrantyUpsell,
    Custom(String),
}

impl InterferenceKind {
    pub fn name(&self) -> &str {
        match self {
            InterferenceKind::WarrantyUpsell => "warranty-upsell",
            InterferenceKind::Custom(name) => name,
        }
    }
}

impl From<String> for InterferenceKind {
    fn from(value: String) -> Self {
        match value.trim() {
            "warranty-upsell" => InterferenceKind::WarrantyUpsell,
            other => InterferenceKind::Custom(other.to_string()),
        }
    }
}

impl From<InterferenceKind> for String {
    fn from(value: InterferenceKind) -> Self {
        value.name().to_string()
    }
}

impl fmt::Display for InterferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How one interstitial kind is recognized and released
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModalDefinition {
    pub kind: InterferenceKind,

    /// Any present handle means the overlay is showing
    pub detect: Vec<AnchorDescriptor>,

    /// Explicit decline actions, tried before `close`
    #[serde(default)]
    pub decline: Vec<AnchorDescriptor>,

    /// Generic close actions
    #[serde(default)]
    pub close: Vec<AnchorDescriptor>,
}

impl ModalDefinition {
    /// Dismissal handles in the order they are tried
    pub fn dismissal_chain(&self) -> impl Iterator<Item = &AnchorDescriptor> {
        self.decline.iter().chain(self.close.iter())
    }
}

/// Everything the engine knows about one platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformTable {
    pub platform: Platform,

    /// Canonical product page, `{product_id}` is substituted
    pub product_url: String,

    pub cart_url: String,

    /// URL substrings that mean the session landed on a sign-in page
    #[serde(default)]
    pub sign_in_markers: Vec<String>,

    /// Regex extracting a postal code from displayed address text
    pub postal_code_pattern: String,

    /// Whether the platform merges a repeated add into the existing cart line
    #[serde(default)]
    pub dedups_cart_items: bool,

    #[serde(default)]
    pub targets: BTreeMap<SemanticTarget, Vec<AnchorDescriptor>>,

    #[serde(default)]
    pub modals: Vec<ModalDefinition>,
}

impl PlatformTable {
    pub fn product_url_for(&self, product_id: &ProductId) -> String {
        self.product_url
            .replace(PRODUCT_PLACEHOLDER, product_id.as_str().trim())
    }

    pub fn is_sign_in_url(&self, url: &str) -> bool {
        self.sign_in_markers
            .iter()
            .any(|marker| !marker.is_empty() && url.contains(marker.as_str()))
    }

    pub fn anchors(&self, target: SemanticTarget) -> &[AnchorDescriptor] {
        self.targets.get(&target).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn declares(&self, target: SemanticTarget) -> bool {
        !self.anchors(target).is_empty()
    }

    /// Check the table rules that `locate` relies on
    pub fn validate(&self) -> Result<(), LocatorError> {
        let name = self.platform.as_str();
        if name.is_empty() {
            return Err(LocatorError::invalid("<unnamed>", "platform name is empty"));
        }
        if !self.product_url.contains(PRODUCT_PLACEHOLDER) {
            return Err(LocatorError::invalid(
                name,
                format!("product_url must contain {}", PRODUCT_PLACEHOLDER),
            ));
        }
        if self.cart_url.trim().is_empty() {
            return Err(LocatorError::invalid(name, "cart_url is empty"));
        }
        regex::Regex::new(&self.postal_code_pattern).map_err(|err| {
            LocatorError::invalid(name, format!("postal_code_pattern: {}", err))
        })?;
        for (target, anchors) in &self.targets {
            if target.is_indexed() {
                if let Some(anchor) = anchors.iter().find(|anchor| !anchor.is_indexed()) {
                    return Err(LocatorError::invalid(
                        name,
                        format!("{} anchor {} lacks {}", target, anchor, INDEX_PLACEHOLDER),
                    ));
                }
            }
        }
        for modal in &self.modals {
            if modal.detect.is_empty() {
                return Err(LocatorError::invalid(
                    name,
                    format!("modal '{}' has no detect anchors", modal.kind),
                ));
            }
        }
        Ok(())
    }
}
