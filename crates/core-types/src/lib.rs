use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Validation errors for engine inputs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("invalid cart item request: {0}")]
    InvalidRequest(String),
}

#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Platform key used to select locator tables. Always lower-case.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Platform(String);

impl Platform {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(name.as_ref().trim().to_ascii_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Platform {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<Platform> for String {
    fn from(value: Platform) -> Self {
        value.0
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Platform-scoped stable product identifier (e.g. an ASIN).
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ProductId(pub String);

impl ProductId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ProductId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Normalized postal code: no whitespace or dashes, upper-case.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PostalCode(String);

impl PostalCode {
    /// Returns `None` when nothing is left after normalization.
    pub fn normalize(raw: &str) -> Option<Self> {
        let normalized: String = raw
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-')
            .map(|c| c.to_ascii_uppercase())
            .collect();
        if normalized.is_empty() {
            None
        } else {
            Some(Self(normalized))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for PostalCode {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        PostalCode::normalize(&value)
            .ok_or_else(|| CoreError::InvalidRequest("postal code is empty".to_string()))
    }
}

impl From<PostalCode> for String {
    fn from(value: PostalCode) -> Self {
        value.0
    }
}

impl fmt::Display for PostalCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The delivery address an item must be carted under.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ExpectedAddress {
    pub postal_code: PostalCode,
    #[serde(default)]
    pub locality: String,
}

impl ExpectedAddress {
    pub fn new(postal_code: PostalCode, locality: impl Into<String>) -> Self {
        Self {
            postal_code,
            locality: locality.into(),
        }
    }

    /// Case-insensitive substring match on locality. An empty locality never matches.
    pub fn locality_matches(&self, text: &str) -> bool {
        let locality = self.locality.trim();
        if locality.is_empty() {
            return false;
        }
        text.to_lowercase().contains(&locality.to_lowercase())
    }
}

fn default_quantity() -> u32 {
    1
}

/// One "add item to cart" request. Immutable once submitted.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct CartItemRequest {
    pub product_id: ProductId,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    pub expected_address: ExpectedAddress,
    /// Text fragment used to find the item in the cart view; defaults to the product id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl CartItemRequest {
    pub fn new(product_id: impl Into<String>, expected_address: ExpectedAddress) -> Self {
        Self {
            product_id: ProductId(product_id.into()),
            quantity: 1,
            expected_address,
            match_text: None,
            label: None,
        }
    }

    pub fn with_quantity(mut self, quantity: u32) -> Self {
        self.quantity = quantity;
        self
    }

    pub fn with_match_text(mut self, text: impl Into<String>) -> Self {
        self.match_text = Some(text.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn match_fragment(&self) -> &str {
        match self.match_text.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => text,
            _ => self.product_id.as_str().trim(),
        }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.product_id.as_str().trim().is_empty() {
            return Err(CoreError::InvalidRequest(
                "product id cannot be empty".to_string(),
            ));
        }
        if self.quantity == 0 {
            return Err(CoreError::InvalidRequest(format!(
                "quantity for {} must be at least 1",
                self.product_id
            )));
        }
        Ok(())
    }
}
