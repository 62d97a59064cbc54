//! Batch report - success rate, item timing, common issues, failed products

use cartpilot_core_types::ProductId;
use serde::Serialize;
use std::collections::HashMap;

use crate::types::{FailureReason, OperationOutcome, Verdict};

/// Wall time of items that ran at least one attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ItemTiming {
    pub count: usize,
    pub avg_ms: u64,
    pub min_ms: u64,
    pub max_ms: u64,
}

/// How often one failure reason was recorded across all attempts
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssueCount {
    pub reason: FailureReason,
    pub count: u32,
}

/// An item that was not confirmed in the cart
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedProduct {
    pub product_id: ProductId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub verdict: Verdict,
    pub attempts: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_reason: Option<FailureReason>,
}

/// Summary of one batch run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    pub total: usize,
    pub confirmed: usize,
    pub cancelled: usize,
    /// Percentage of non-cancelled items confirmed
    pub success_rate: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timing: Option<ItemTiming>,
    /// Items where an overlay appeared after the add click
    pub overlays: usize,
    /// Items whose delivery address had to be corrected
    pub address_corrections: usize,
    pub common_issues: Vec<IssueCount>,
    pub failed_products: Vec<FailedProduct>,
}

impl BatchReport {
    pub fn from_outcomes(outcomes: &[OperationOutcome]) -> Self {
        let confirmed = outcomes.iter().filter(|o| o.is_success()).count();
        let cancelled = outcomes
            .iter()
            .filter(|o| o.verdict() == Verdict::Cancelled)
            .count();
        let decided = outcomes.len() - cancelled;
        let success_rate = if decided == 0 {
            0.0
        } else {
            confirmed as f64 * 100.0 / decided as f64
        };

        let durations: Vec<u64> = outcomes
            .iter()
            .filter(|o| !o.attempts().is_empty())
            .map(|o| o.elapsed_ms())
            .collect();
        let timing = match (durations.iter().min(), durations.iter().max()) {
            (Some(&min_ms), Some(&max_ms)) => Some(ItemTiming {
                count: durations.len(),
                avg_ms: durations.iter().sum::<u64>() / durations.len() as u64,
                min_ms,
                max_ms,
            }),
            _ => None,
        };

        let mut counts: HashMap<FailureReason, u32> = HashMap::new();
        for reason in outcomes
            .iter()
            .flat_map(|o| o.attempts())
            .filter_map(|attempt| attempt.failure_reason)
        {
            *counts.entry(reason).or_default() += 1;
        }
        let mut common_issues: Vec<IssueCount> = counts
            .into_iter()
            .map(|(reason, count)| IssueCount { reason, count })
            .collect();
        common_issues.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| a.reason.code().cmp(b.reason.code()))
        });

        let failed_products = outcomes
            .iter()
            .filter(|o| !o.is_success() && o.verdict() != Verdict::Cancelled)
            .map(|o| FailedProduct {
                product_id: o.request().product_id.clone(),
                label: o.request().label.clone(),
                verdict: o.verdict(),
                attempts: o.attempts().len(),
                last_reason: o.attempts().last().and_then(|a| a.failure_reason),
            })
            .collect();

        Self {
            total: outcomes.len(),
            confirmed,
            cancelled,
            success_rate,
            timing,
            overlays: outcomes.iter().filter(|o| o.modal_encountered()).count(),
            address_corrections: outcomes
                .iter()
                .filter(|o| o.attempts().iter().any(|a| a.steps.address_corrected))
                .count(),
            common_issues,
            failed_products,
        }
    }
}
