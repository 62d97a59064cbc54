use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use lazy_static::lazy_static;
use prometheus::{core::Collector, histogram_opts, HistogramVec, IntCounterVec, Registry};
use tracing::error;

use crate::types::{FailureReason, Verdict};

#[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
pub struct CartMetricsSnapshot {
    pub attempts: u64,
    pub attempt_success: u64,
    pub attempt_failures: u64,
    pub modal_encountered: u64,
    pub address_corrected: u64,
    pub outcomes: u64,
    pub attempt_latency_total_ms: u64,
}

static ATTEMPTS: AtomicU64 = AtomicU64::new(0);
static ATTEMPT_SUCCESS: AtomicU64 = AtomicU64::new(0);
static ATTEMPT_FAILURES: AtomicU64 = AtomicU64::new(0);
static MODAL_ENCOUNTERED: AtomicU64 = AtomicU64::new(0);
static ADDRESS_CORRECTED: AtomicU64 = AtomicU64::new(0);
static OUTCOMES: AtomicU64 = AtomicU64::new(0);
static ATTEMPT_LATENCY_TOTAL_MS: AtomicU64 = AtomicU64::new(0);

lazy_static! {
    static ref CART_ATTEMPTS_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new("cart_attempts_total", "Total cart-mutating attempts started"),
        &["platform"]
    )
    .unwrap();
    static ref CART_ATTEMPT_SUCCESS_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new(
            "cart_attempt_success_total",
            "Attempts confirmed by cart delta and address"
        ),
        &["platform"]
    )
    .unwrap();
    static ref CART_ATTEMPT_FAILURES_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new("cart_attempt_failures_total", "Failed attempts by reason"),
        &["platform", "reason"]
    )
    .unwrap();
    static ref CART_ATTEMPT_DURATION: HistogramVec = HistogramVec::new(
        histogram_opts!(
            "cart_attempt_duration_seconds",
            "Wall time of one attempt",
            vec![0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 40.0, 80.0]
        ),
        &["platform"]
    )
    .unwrap();
    static ref CART_MODAL_ENCOUNTERED_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new(
            "cart_modal_encountered_total",
            "Interstitial overlays seen after a cart-mutating click"
        ),
        &["platform", "kind"]
    )
    .unwrap();
    static ref CART_ADDRESS_CORRECTED_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new(
            "cart_address_corrected_total",
            "Delivery address corrections that re-verified"
        ),
        &["platform"]
    )
    .unwrap();
    static ref CART_ITEM_DURATION: HistogramVec = HistogramVec::new(
        histogram_opts!(
            "cart_item_duration_seconds",
            "Wall time of one item from first attempt to verdict",
            vec![1.0, 2.5, 5.0, 10.0, 20.0, 40.0, 80.0, 160.0, 320.0]
        ),
        &["platform", "verdict"]
    )
    .unwrap();
    static ref CART_OUTCOMES_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new("cart_outcomes_total", "Sealed outcomes by verdict"),
        &["platform", "verdict"]
    )
    .unwrap();
}

fn register<C>(registry: &Registry, collector: C)
where
    C: Collector + Clone + Send + Sync + 'static,
{
    if let Err(err) = registry.register(Box::new(collector.clone())) {
        if !matches!(err, prometheus::Error::AlreadyReg) {
            error!(?err, "failed to register cart metric");
        }
    }
}

pub fn register_metrics(registry: &Registry) {
    register(registry, CART_ATTEMPTS_TOTAL.clone());
    register(registry, CART_ATTEMPT_SUCCESS_TOTAL.clone());
    register(registry, CART_ATTEMPT_FAILURES_TOTAL.clone());
    register(registry, CART_ATTEMPT_DURATION.clone());
    register(registry, CART_MODAL_ENCOUNTERED_TOTAL.clone());
    register(registry, CART_ADDRESS_CORRECTED_TOTAL.clone());
    register(registry, CART_OUTCOMES_TOTAL.clone());
    register(registry, CART_ITEM_DURATION.clone());
}

pub fn record_attempt(platform: &str) {
    ATTEMPTS.fetch_add(1, Ordering::Relaxed);
    CART_ATTEMPTS_TOTAL.with_label_values(&[platform]).inc();
}

fn observe_duration(platform: &str, duration: Duration) {
    let millis = duration.as_millis().min(u64::MAX as u128) as u64;
    ATTEMPT_LATENCY_TOTAL_MS.fetch_add(millis, Ordering::Relaxed);
    CART_ATTEMPT_DURATION
        .with_label_values(&[platform])
        .observe(duration.as_secs_f64());
}

pub fn record_attempt_success(platform: &str, duration: Duration) {
    ATTEMPT_SUCCESS.fetch_add(1, Ordering::Relaxed);
    CART_ATTEMPT_SUCCESS_TOTAL.with_label_values(&[platform]).inc();
    observe_duration(platform, duration);
}

pub fn record_attempt_failure(platform: &str, reason: FailureReason, duration: Duration) {
    ATTEMPT_FAILURES.fetch_add(1, Ordering::Relaxed);
    CART_ATTEMPT_FAILURES_TOTAL
        .with_label_values(&[platform, reason.code()])
        .inc();
    observe_duration(platform, duration);
}

pub fn record_modal(platform: &str, kind: &str) {
    MODAL_ENCOUNTERED.fetch_add(1, Ordering::Relaxed);
    CART_MODAL_ENCOUNTERED_TOTAL
        .with_label_values(&[platform, kind])
        .inc();
}

pub fn record_address_corrected(platform: &str) {
    ADDRESS_CORRECTED.fetch_add(1, Ordering::Relaxed);
    CART_ADDRESS_CORRECTED_TOTAL
        .with_label_values(&[platform])
        .inc();
}

pub fn record_outcome(platform: &str, verdict: Verdict) {
    OUTCOMES.fetch_add(1, Ordering::Relaxed);
    CART_OUTCOMES_TOTAL
        .with_label_values(&[platform, verdict.code()])
        .inc();
}

/// Items sealed without running an attempt (halted, cancelled) are not observed
pub fn record_item_duration(platform: &str, verdict: Verdict, duration: Duration) {
    CART_ITEM_DURATION
        .with_label_values(&[platform, verdict.code()])
        .observe(duration.as_secs_f64());
}

pub fn snapshot() -> CartMetricsSnapshot {
    CartMetricsSnapshot {
        attempts: ATTEMPTS.load(Ordering::Relaxed),
        attempt_success: ATTEMPT_SUCCESS.load(Ordering::Relaxed),
        attempt_failures: ATTEMPT_FAILURES.load(Ordering::Relaxed),
        modal_encountered: MODAL_ENCOUNTERED.load(Ordering::Relaxed),
        address_corrected: ADDRESS_CORRECTED.load(Ordering::Relaxed),
        outcomes: OUTCOMES.load(Ordering::Relaxed),
        attempt_latency_total_ms: ATTEMPT_LATENCY_TOTAL_MS.load(Ordering::Relaxed),
    }
}
