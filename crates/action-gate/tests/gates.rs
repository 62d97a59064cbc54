use action_gate::{
    AddressCheck, AddressVerifier, CartDelta, CartVerifier, DefaultAddressVerifier,
    DefaultCartVerifier, DefaultModalDetector, DismissOutcome, GateContext, GateError,
    GateSettings, InterferenceDetector,
};
use action_locator::{InterferenceKind, LocatorTables};
use action_primitives::{
    ActionError, AnchorDescriptor, Automation, DefaultActionPrimitives, PageLocation,
};
use async_trait::async_trait;
use cartpilot_core_types::{ExpectedAddress, Platform, PostalCode};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Edit = (&'static str, Option<&'static str>);

/// Selector -> text page with click-triggered edits
#[derive(Default)]
struct ScriptedPage {
    texts: Mutex<HashMap<String, String>>,
    on_click: HashMap<String, Vec<Edit>>,
    redirect: Option<String>,
    clicks: Mutex<Vec<String>>,
    typed: Mutex<Vec<(String, String)>>,
}

impl ScriptedPage {
    fn with_text(self, selector: &str, text: &str) -> Self {
        self.texts
            .lock()
            .unwrap()
            .insert(selector.to_string(), text.to_string());
        self
    }

    fn on_click(mut self, selector: &str, edits: Vec<Edit>) -> Self {
        self.on_click.insert(selector.to_string(), edits);
        self
    }
}

#[async_trait]
impl Automation for ScriptedPage {
    async fn navigate(&self, url: &str) -> Result<PageLocation, ActionError> {
        Ok(PageLocation::new(self.redirect.clone().unwrap_or_else(|| url.to_string())))
    }

    async fn click(&self, anchor: &AnchorDescriptor) -> Result<(), ActionError> {
        let selector = anchor.to_selector();
        let mut texts = self.texts.lock().unwrap();
        if !texts.contains_key(&selector) {
            return Err(ActionError::AnchorNotFound(selector));
        }
        self.clicks.lock().unwrap().push(selector.clone());
        for (target, value) in self.on_click.get(&selector).cloned().unwrap_or_default() {
            match value {
                Some(text) => texts.insert(target.to_string(), text.to_string()),
                None => texts.remove(target),
            };
        }
        Ok(())
    }

    async fn read_text(&self, anchor: &AnchorDescriptor) -> Result<Option<String>, ActionError> {
        Ok(self.texts.lock().unwrap().get(&anchor.to_selector()).cloned())
    }

    async fn type_text(&self, anchor: &AnchorDescriptor, text: &str) -> Result<(), ActionError> {
        let selector = anchor.to_selector();
        if !self.texts.lock().unwrap().contains_key(&selector) {
            return Err(ActionError::AnchorNotFound(selector));
        }
        self.typed.lock().unwrap().push((selector, text.to_string()));
        Ok(())
    }
}

const LABEL: &str = "#glow-ingress-line2";
const CHANGE: &str = "#nav-global-location-popover-link";
const SURFACE: &str = "#GLUXAddressList";

fn context(page: Arc<ScriptedPage>) -> GateContext {
    let primitives = Arc::new(DefaultActionPrimitives::new(page));
    let locator = Arc::new(LocatorTables::builtin().unwrap());
    GateContext::new(
        primitives,
        locator,
        Platform::new("amazon"),
        GateSettings::default(),
    )
    .unwrap()
}

fn bengaluru() -> ExpectedAddress {
    ExpectedAddress::new(PostalCode::normalize("560043").unwrap(), "Bengaluru")
}

#[tokio::test(start_paused = true)]
async fn matching_address_is_verified_without_clicks() {
    let page = Arc::new(ScriptedPage::default().with_text(LABEL, "Bengaluru 560043"));
    let verifier = DefaultAddressVerifier::new(context(page.clone()));

    let check = verifier.ensure_address(&bengaluru()).await.unwrap();
    assert!(matches!(check, AddressCheck::Verified(_)));
    assert!(page.clicks.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn mismatched_address_is_corrected_via_best_option() {
    let page = ScriptedPage::default()
        .with_text(LABEL, "Deliver to Asha Nashik 403710")
        .with_text(CHANGE, "Update location")
        .on_click(
            CHANGE,
            vec![
                (SURFACE, Some("")),
                ("#GLUXAddressList li:nth-child(1)", Some("Asha, Nashik 403710")),
                ("#GLUXAddressList li:nth-child(2)", Some("Asha, Bengaluru 560043")),
            ],
        )
        .on_click(
            "#GLUXAddressList li:nth-child(2)",
            vec![(LABEL, Some("Deliver to Asha Bengaluru 560043"))],
        );
    let page = Arc::new(page);
    let verifier = DefaultAddressVerifier::new(context(page.clone()));

    let check = verifier.ensure_address(&bengaluru()).await.unwrap();
    match check {
        AddressCheck::Corrected { before, after } => {
            assert_eq!(before.unwrap().postal_code.unwrap().as_str(), "403710");
            assert_eq!(after.postal_code.unwrap().as_str(), "560043");
        }
        other => panic!("expected correction, got {:?}", other),
    }
    assert_eq!(
        *page.clicks.lock().unwrap(),
        vec![CHANGE.to_string(), "#GLUXAddressList li:nth-child(2)".to_string()]
    );
}

#[tokio::test(start_paused = true)]
async fn unmatched_options_fall_back_to_postal_code_entry() {
    let page = ScriptedPage::default()
        .with_text(LABEL, "Nashik 403710")
        .with_text(CHANGE, "Update location")
        .on_click(
            CHANGE,
            vec![
                (SURFACE, Some("")),
                ("#GLUXZipUpdateInput", Some("")),
                ("#GLUXZipUpdate", Some("Apply")),
                ("#GLUXAddressList li:nth-child(1)", Some("Nashik 403710")),
            ],
        )
        .on_click("#GLUXZipUpdate", vec![(LABEL, Some("Bengaluru 560043"))]);
    let page = Arc::new(page);
    let verifier = DefaultAddressVerifier::new(context(page.clone()));

    let check = verifier.ensure_address(&bengaluru()).await.unwrap();
    assert!(matches!(check, AddressCheck::Corrected { .. }));
    assert_eq!(
        *page.typed.lock().unwrap(),
        vec![("#GLUXZipUpdateInput".to_string(), "560043".to_string())]
    );
}

#[tokio::test(start_paused = true)]
async fn sticky_address_reports_correction_failed() {
    let page = ScriptedPage::default()
        .with_text(LABEL, "Nashik 403710")
        .with_text(CHANGE, "Update location")
        .on_click(
            CHANGE,
            vec![
                (SURFACE, Some("")),
                ("#GLUXAddressList li:nth-child(1)", Some("Bengaluru 560043")),
            ],
        );
    let verifier = DefaultAddressVerifier::new(context(Arc::new(page)));

    match verifier.ensure_address(&bengaluru()).await.unwrap() {
        AddressCheck::CorrectionFailed { reason, observed } => {
            assert!(reason.contains("403710"));
            assert_eq!(observed.unwrap().postal_code.unwrap().as_str(), "403710");
        }
        other => panic!("expected failure, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn missing_surface_is_bounded() {
    let page = ScriptedPage::default()
        .with_text(LABEL, "Nashik 403710")
        .with_text(CHANGE, "Update location");
    let verifier = DefaultAddressVerifier::new(context(Arc::new(page)));

    let started = tokio::time::Instant::now();
    let check = verifier.ensure_address(&bengaluru()).await.unwrap();
    assert!(!check.is_ok());
    assert!(started.elapsed() <= Duration::from_secs(6));
}

#[tokio::test(start_paused = true)]
async fn unreadable_address_is_an_error() {
    let verifier = DefaultAddressVerifier::new(context(Arc::new(ScriptedPage::default())));
    let err = verifier.read_current_address().await.unwrap_err();
    assert!(matches!(err, GateError::AddressUnreadable(_)));
}

#[tokio::test(start_paused = true)]
async fn warranty_modal_is_declined() {
    let page = ScriptedPage::default()
        .with_text("#attach-warranty-pane", "Add a protection plan")
        .with_text("text=\"No Thanks\"", "No Thanks")
        .on_click(
            "text=\"No Thanks\"",
            vec![("#attach-warranty-pane", None), ("text=\"No Thanks\"", None)],
        );
    let page = Arc::new(page);
    let detector = DefaultModalDetector::new(context(page.clone()));

    let kind = detector
        .poll_for_interference(Duration::from_secs(2))
        .await
        .unwrap();
    assert_eq!(kind, InterferenceKind::WarrantyUpsell);

    let outcome = detector.dismiss(&kind).await;
    assert!(outcome.is_dismissed());
    assert!(detector
        .poll_for_interference(Duration::from_millis(500))
        .await
        .is_none());
}

#[tokio::test(start_paused = true)]
async fn stuck_modal_fails_dismissal() {
    let page = ScriptedPage::default()
        .with_text("#attach-warranty-pane", "Add a protection plan")
        .with_text(".a-button-close", "");
    let detector = DefaultModalDetector::new(context(Arc::new(page)));

    let outcome = detector.dismiss(&InterferenceKind::WarrantyUpsell).await;
    assert!(matches!(outcome, DismissOutcome::DismissFailed { reason, .. } if reason.contains("still present")));
}

#[tokio::test(start_paused = true)]
async fn cart_snapshot_reads_rows_and_badge() {
    let page = ScriptedPage::default()
        .with_text("#nav-cart-count", "3")
        .with_text("#sc-active-cart .sc-list-item:nth-child(1)", "Acme Kettle 1.5L")
        .with_text(
            "#sc-active-cart .sc-list-item:nth-child(1) .a-dropdown-prompt",
            "2",
        )
        .with_text("#sc-active-cart .sc-list-item:nth-child(2)", "Steel Bottle 1L")
        .with_text(
            "#sc-active-cart .sc-list-item:nth-child(2) .sc-product-title",
            "Steel Bottle 1L (Blue)",
        );
    let verifier = DefaultCartVerifier::new(context(Arc::new(page)));

    let snapshot = verifier.snapshot().await.unwrap();
    assert_eq!(snapshot.badge_count, Some(3));
    assert_eq!(snapshot.entries.len(), 2);
    assert_eq!(snapshot.entries[0].quantity, 2);
    assert_eq!(snapshot.entries[1].fragment, "Steel Bottle 1L (Blue)");
    assert_eq!(
        verifier.diff(&snapshot, &snapshot, "Steel Bottle", 1),
        CartDelta::Unchanged
    );
}

#[tokio::test(start_paused = true)]
async fn sign_in_redirect_expires_session() {
    let page = ScriptedPage {
        redirect: Some("https://www.amazon.in/ap/signin?return=cart".to_string()),
        ..ScriptedPage::default()
    };
    let verifier = DefaultCartVerifier::new(context(Arc::new(page)));
    let err = verifier.snapshot().await.unwrap_err();
    assert!(matches!(err, GateError::SessionExpired { .. }));
}

#[test]
fn unknown_platform_is_rejected() {
    let primitives = Arc::new(DefaultActionPrimitives::new(Arc::new(ScriptedPage::default())));
    let err = GateContext::new(
        primitives,
        Arc::new(LocatorTables::builtin().unwrap()),
        Platform::new("flipkart"),
        GateSettings::default(),
    )
    .err()
    .unwrap();
    assert_eq!(err, GateError::UnknownPlatform("flipkart".to_string()));
}
