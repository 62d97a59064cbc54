//! Core types for verification gates

use action_locator::InterferenceKind;
use cartpilot_core_types::{ExpectedAddress, PostalCode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Bounds for every wait and scan the gates perform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateSettings {
    /// Deadline for one primitive call
    pub action_timeout: Duration,

    /// How long the address selection surface may take to appear
    pub address_surface_timeout: Duration,

    /// Delay after selecting an address before re-reading it
    pub address_propagation_wait: Duration,

    /// Interval between modal and surface checks
    pub poll_interval: Duration,

    /// Delay after a dismissal click before re-checking presence
    pub dismiss_settle: Duration,

    pub max_address_options: usize,

    pub max_cart_rows: usize,

    /// Fragments shorter than this make a diff `Ambiguous`
    pub min_match_fragment_length: usize,
}

impl Default for GateSettings {
    fn default() -> Self {
        Self {
            action_timeout: Duration::from_millis(15_000),
            address_surface_timeout: Duration::from_millis(5_000),
            address_propagation_wait: Duration::from_millis(2_000),
            poll_interval: Duration::from_millis(250),
            dismiss_settle: Duration::from_millis(750),
            max_address_options: 10,
            max_cart_rows: 50,
            min_match_fragment_length: 6,
        }
    }
}

/// Delivery address displayed for the session at a point in time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressSnapshot {
    pub raw_text: String,
    pub postal_code: Option<PostalCode>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub captured_at: DateTime<Utc>,
}

impl AddressSnapshot {
    pub fn new(raw_text: impl Into<String>, postal_code: Option<PostalCode>) -> Self {
        Self {
            raw_text: raw_text.into(),
            postal_code,
            captured_at: Utc::now(),
        }
    }

    /// Equivalent iff both carry the same normalized postal code
    pub fn equivalent(&self, other: &AddressSnapshot) -> bool {
        match (&self.postal_code, &other.postal_code) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    pub fn matches(&self, expected: &ExpectedAddress) -> bool {
        self.postal_code.as_ref() == Some(&expected.postal_code)
    }
}

/// Result of `ensure_address`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressCheck {
    /// Already showing the expected address
    Verified(AddressSnapshot),

    /// Correction ran and the re-read matches
    Corrected {
        before: Option<AddressSnapshot>,
        after: AddressSnapshot,
    },

    /// Correction could not establish the expected address
    CorrectionFailed {
        reason: String,
        observed: Option<AddressSnapshot>,
    },
}

impl AddressCheck {
    pub fn is_ok(&self) -> bool {
        !matches!(self, AddressCheck::CorrectionFailed { .. })
    }
}

/// Result of a dismissal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DismissOutcome {
    Dismissed {
        kind: InterferenceKind,
        /// Selector of the handle that released the overlay
        via: String,
    },
    DismissFailed {
        kind: InterferenceKind,
        reason: String,
    },
}

impl DismissOutcome {
    pub fn is_dismissed(&self) -> bool {
        matches!(self, DismissOutcome::Dismissed { .. })
    }
}

/// One cart line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartEntry {
    /// Identifier fragment used for matching
    pub fragment: String,
    pub display_text: String,
    pub quantity: u32,
}

/// Cart contents read at a point in time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartSnapshot {
    pub entries: Vec<CartEntry>,
    /// Header badge count when the platform shows one
    pub badge_count: Option<u32>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub captured_at: DateTime<Utc>,
}

impl CartSnapshot {
    pub fn new(entries: Vec<CartEntry>, badge_count: Option<u32>) -> Self {
        Self {
            entries,
            badge_count,
            captured_at: Utc::now(),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), None)
    }

    /// Entries whose identifier contains `fragment`, case-insensitively
    pub fn matching<'a>(&'a self, fragment: &str) -> impl Iterator<Item = &'a CartEntry> + 'a {
        let needle = fragment.trim().to_lowercase();
        self.entries
            .iter()
            .filter(move |entry| !needle.is_empty() && entry.fragment.to_lowercase().contains(&needle))
    }

    pub fn contains(&self, fragment: &str) -> bool {
        self.matching(fragment).next().is_some()
    }

    pub fn quantity_of(&self, fragment: &str) -> u32 {
        self.matching(fragment).map(|entry| entry.quantity).sum()
    }
}

/// Before/after comparison for one item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CartDelta {
    Added,
    Unchanged,
    Removed,
    /// Fragment too short to match with confidence
    Ambiguous,
    /// The item grew by fewer units than requested
    Shortfall { expected: u32, added: u32 },
}
