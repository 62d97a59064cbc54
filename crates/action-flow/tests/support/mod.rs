//! Simulated storefront driven through the `Automation` capability.
//!
//! Selectors follow the builtin amazon table. State lives behind one mutex so
//! every call observes a consistent page.

#![allow(dead_code)]

use action_flow::{CartEngine, OrchestratorConfig};
use action_locator::LocatorTables;
use action_primitives::{ActionError, AnchorDescriptor, Automation, DefaultActionPrimitives, PageLocation};
use async_trait::async_trait;
use cartpilot_core_types::{CartItemRequest, ExpectedAddress, Platform, PostalCode, SessionId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

pub const CART_URL: &str = "https://www.amazon.in/gp/cart/view.html";
pub const SIGN_IN_URL: &str = "https://www.amazon.in/ap/signin?openid.return_to=cart";

const LABEL: &str = "#glow-ingress-line2";
const CHANGE: &str = "#nav-global-location-popover-link";
const SURFACE: &str = "#GLUXAddressList";
const OPTION_PREFIX: &str = "#GLUXAddressList li:nth-child(";
const ADD: &str = "#add-to-cart-button";
const QUANTITY: &str = "#quantity";
const BADGE: &str = "#nav-cart-count";
const ROW_PREFIX: &str = "#sc-active-cart .sc-list-item:nth-child(";
const WARRANTY_PANE: &str = "#attach-warranty-pane";
const WARRANTY_DECLINE: &str = "#attachSiNoCov498-announce";

/// A saved delivery address
#[derive(Debug, Clone)]
pub struct SavedAddress {
    pub locality: String,
    pub postal: String,
}

impl SavedAddress {
    pub fn new(locality: &str, postal: &str) -> Self {
        Self {
            locality: locality.to_string(),
            postal: postal.to_string(),
        }
    }

    fn label(&self) -> String {
        format!("Deliver to Asha - {} {}", self.locality, self.postal)
    }
}

/// How the page reacts to one product
#[derive(Debug, Clone, Default)]
pub struct ProductBehavior {
    pub title: String,
    /// Clicking add opens the warranty overlay and queues the add
    pub warranty_modal: bool,
    /// The overlay ignores its dismissal handles
    pub modal_stuck: bool,
    /// Add click is accepted but the cart never changes
    pub silent: bool,
    /// Delivery address switches to this saved entry right after the add lands
    pub drift_to: Option<usize>,
    /// Navigating to the product page lands on sign-in instead
    pub expires_session: bool,
    /// The quantity field is ignored; every add lands one unit
    pub ignores_quantity: bool,
    /// Clicking add fails with this error
    pub click_error: Option<ActionError>,
}

impl ProductBehavior {
    pub fn titled(title: &str) -> Self {
        Self {
            title: title.to_string(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct CartLine {
    pub title: String,
    pub quantity: u32,
}

#[derive(Default)]
struct PageState {
    url: String,
    current: Option<SavedAddress>,
    saved: Vec<SavedAddress>,
    /// Saved-address selection has no effect
    sticky_address: bool,
    surface_open: bool,
    modal_open: bool,
    queued_add: Option<(String, u32)>,
    typed_quantity: u32,
    cart: Vec<CartLine>,
    /// Adding an existing title leaves the cart unchanged
    dedups: bool,
    products: HashMap<String, ProductBehavior>,
    navigations: Vec<String>,
    add_clicks: Vec<String>,
    cancel_on_add: Option<CancellationToken>,
}

/// Simulated storefront
pub struct Storefront {
    state: Mutex<PageState>,
}

impl Storefront {
    pub fn new(current: SavedAddress) -> Self {
        let state = PageState {
            url: "about:blank".to_string(),
            saved: vec![current.clone()],
            current: Some(current),
            typed_quantity: 1,
            ..Default::default()
        };
        Self {
            state: Mutex::new(state),
        }
    }

    pub fn with_saved(self, address: SavedAddress) -> Self {
        self.state.lock().unwrap().saved.push(address);
        self
    }

    pub fn with_product(self, id: &str, behavior: ProductBehavior) -> Self {
        self.state
            .lock()
            .unwrap()
            .products
            .insert(id.to_string(), behavior);
        self
    }

    pub fn with_cart_line(self, title: &str, quantity: u32) -> Self {
        self.state.lock().unwrap().cart.push(CartLine {
            title: title.to_string(),
            quantity,
        });
        self
    }

    pub fn sticky_address(self) -> Self {
        self.state.lock().unwrap().sticky_address = true;
        self
    }

    pub fn unreadable_address(self) -> Self {
        self.state.lock().unwrap().current = None;
        self
    }

    pub fn dedups(self) -> Self {
        self.state.lock().unwrap().dedups = true;
        self
    }

    pub fn cancel_on_add(self, token: CancellationToken) -> Self {
        self.state.lock().unwrap().cancel_on_add = Some(token);
        self
    }

    pub fn navigations(&self) -> Vec<String> {
        self.state.lock().unwrap().navigations.clone()
    }

    pub fn product_navigations(&self) -> Vec<String> {
        self.navigations()
            .into_iter()
            .filter(|url| url.contains("/dp/"))
            .collect()
    }

    pub fn add_clicks(&self) -> Vec<String> {
        self.state.lock().unwrap().add_clicks.clone()
    }

    pub fn cart(&self) -> Vec<CartLine> {
        self.state.lock().unwrap().cart.clone()
    }

    pub fn current_postal(&self) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .current
            .as_ref()
            .map(|address| address.postal.clone())
    }

    /// Put an item in the cart out of band
    pub fn force_add(&self, title: &str) {
        let mut state = self.state.lock().unwrap();
        add_line(&mut state, title, 1);
    }
}

fn add_line(state: &mut PageState, title: &str, quantity: u32) {
    if let Some(line) = state.cart.iter_mut().find(|line| line.title == title) {
        if !state.dedups {
            line.quantity += quantity;
        }
        return;
    }
    state.cart.push(CartLine {
        title: title.to_string(),
        quantity,
    });
}

fn indexed(selector: &str, prefix: &str) -> Option<(usize, String)> {
    let rest = selector.strip_prefix(prefix)?;
    let close = rest.find(')')?;
    let index = rest[..close].parse().ok()?;
    Some((index, rest[close + 1..].to_string()))
}

impl PageState {
    fn product_on_page(&self) -> Option<String> {
        self.url
            .split("/dp/")
            .nth(1)
            .map(|id| id.to_string())
            .filter(|id| self.products.contains_key(id))
    }

    fn text_of(&self, selector: &str) -> Option<String> {
        match selector {
            LABEL => return self.current.as_ref().map(SavedAddress::label),
            CHANGE => return Some("Update location".to_string()),
            SURFACE if self.surface_open => return Some(String::new()),
            BADGE => {
                let total: u32 = self.cart.iter().map(|line| line.quantity).sum();
                return Some(total.to_string());
            }
            ADD | QUANTITY if self.product_on_page().is_some() => {
                return Some("Add to Cart".to_string())
            }
            WARRANTY_PANE | WARRANTY_DECLINE if self.modal_open => {
                return Some("No Thanks".to_string())
            }
            _ => {}
        }

        if self.surface_open {
            if let Some((index, _)) = indexed(selector, OPTION_PREFIX) {
                return self.saved.get(index.checked_sub(1)?).map(|a| a.label());
            }
        }

        if self.url == CART_URL {
            if let Some((index, suffix)) = indexed(selector, ROW_PREFIX) {
                let line = self.cart.get(index.checked_sub(1)?)?;
                return match suffix.as_str() {
                    "" | " .sc-product-title" => Some(line.title.clone()),
                    " .a-dropdown-prompt" => Some(format!("Qty: {}", line.quantity)),
                    _ => None,
                };
            }
        }
        None
    }

    fn add_to_cart(&mut self) {
        let Some(id) = self.product_on_page() else {
            return;
        };
        self.add_clicks.push(id.clone());
        if let Some(token) = &self.cancel_on_add {
            token.cancel();
        }
        let behavior = self.products[&id].clone();
        let typed = std::mem::replace(&mut self.typed_quantity, 1);
        let quantity = if behavior.ignores_quantity { 1 } else { typed };
        if behavior.silent {
            return;
        }
        if behavior.warranty_modal {
            self.modal_open = true;
            self.queued_add = Some((id, quantity));
            return;
        }
        self.land_add(&id, quantity);
    }

    fn land_add(&mut self, id: &str, quantity: u32) {
        let behavior = self.products[id].clone();
        add_line(self, &behavior.title, quantity);
        if let Some(index) = behavior.drift_to {
            self.current = self.saved.get(index).cloned();
        }
    }
}

#[async_trait]
impl Automation for Storefront {
    async fn navigate(&self, url: &str) -> Result<PageLocation, ActionError> {
        let mut state = self.state.lock().unwrap();
        state.navigations.push(url.to_string());
        state.surface_open = false;
        state.modal_open = false;
        state.queued_add = None;
        let expires = url
            .split("/dp/")
            .nth(1)
            .and_then(|id| state.products.get(id))
            .map(|behavior| behavior.expires_session)
            .unwrap_or(false);
        state.url = if expires {
            SIGN_IN_URL.to_string()
        } else {
            url.to_string()
        };
        Ok(PageLocation::new(state.url.clone()))
    }

    async fn click(&self, anchor: &AnchorDescriptor) -> Result<(), ActionError> {
        let selector = anchor.to_selector();
        let mut state = self.state.lock().unwrap();
        if state.text_of(&selector).is_none() {
            return Err(ActionError::AnchorNotFound(selector));
        }
        match selector.as_str() {
            ADD => {
                let failure = state
                    .product_on_page()
                    .and_then(|id| state.products[&id].click_error.clone());
                if let Some(err) = failure {
                    let id = state.product_on_page().unwrap_or_default();
                    state.add_clicks.push(id);
                    return Err(err);
                }
                state.add_to_cart()
            }
            CHANGE => state.surface_open = true,
            WARRANTY_DECLINE => {
                let stuck = state
                    .queued_add
                    .as_ref()
                    .map(|(id, _)| state.products[id].modal_stuck)
                    .unwrap_or(false);
                if !stuck {
                    state.modal_open = false;
                    if let Some((id, quantity)) = state.queued_add.take() {
                        state.land_add(&id, quantity);
                    }
                }
            }
            _ => {
                if let Some((index, _)) = indexed(&selector, OPTION_PREFIX) {
                    if !state.sticky_address {
                        state.current = state.saved.get(index - 1).cloned();
                    }
                    state.surface_open = false;
                }
            }
        }
        Ok(())
    }

    async fn read_text(&self, anchor: &AnchorDescriptor) -> Result<Option<String>, ActionError> {
        Ok(self.state.lock().unwrap().text_of(&anchor.to_selector()))
    }

    async fn type_text(&self, anchor: &AnchorDescriptor, text: &str) -> Result<(), ActionError> {
        let selector = anchor.to_selector();
        let mut state = self.state.lock().unwrap();
        if state.text_of(&selector).is_none() {
            return Err(ActionError::AnchorNotFound(selector));
        }
        if selector == QUANTITY {
            state.typed_quantity = text.parse().unwrap_or(1);
        }
        Ok(())
    }
}

pub fn bengaluru() -> SavedAddress {
    SavedAddress::new("Bengaluru", "560043")
}

pub fn nashik() -> SavedAddress {
    SavedAddress::new("Nashik", "403710")
}

pub fn expected_bengaluru() -> ExpectedAddress {
    ExpectedAddress::new(PostalCode::normalize("560043").unwrap(), "Bengaluru")
}

pub fn request(id: &str, title: &str) -> CartItemRequest {
    CartItemRequest::new(id, expected_bengaluru()).with_match_text(title)
}

pub fn amazon() -> Platform {
    Platform::new("amazon")
}

/// Fast, deterministic settings for paused-clock tests
pub fn config() -> OrchestratorConfig {
    OrchestratorConfig {
        attempt_backoff_ms: 100,
        max_backoff_ms: 1_000,
        ..OrchestratorConfig::default()
    }
}

pub fn locator(dedups: bool) -> Arc<LocatorTables> {
    let mut tables = LocatorTables::builtin().unwrap();
    if dedups {
        let mut table = tables.tables().next().unwrap().as_ref().clone();
        table.dedups_cart_items = true;
        tables.insert(table);
    }
    Arc::new(tables)
}

/// Engine with one amazon session bound to `store`
pub fn engine_for(store: Arc<Storefront>, dedups: bool) -> (CartEngine, SessionId) {
    let engine = CartEngine::new(locator(dedups));
    let session = SessionId::from("session-1");
    let primitives = Arc::new(DefaultActionPrimitives::new(store));
    engine
        .register_session(session.clone(), amazon(), primitives)
        .unwrap();
    (engine, session)
}
